//! Status command implementation
//!
//! Shows a live status snapshot for each GPU.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, DeviceStatus};
use crate::commands::{target_indices, Target};
use crate::cuda::ComputeRuntime;
use crate::error::Result;
use crate::nvml::GpuManager;
use crate::platform::GpuInspector;

/// Execute the status command
pub fn run_status<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    format: OutputFormat,
    target: &Target,
) -> Result<()> {
    let snapshots = snapshot(inspector, target)?;
    print_output(&snapshots, format)?;
    Ok(())
}

fn snapshot<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    target: &Target,
) -> Result<Vec<DeviceStatus>> {
    target_indices(inspector, target)?
        .into_iter()
        .map(|index| {
            Ok(DeviceStatus {
                index,
                status: inspector.status(index)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::mock::{pascal_properties, MockManager, MockRuntime};
    use crate::platform::SystemInspector;

    #[test]
    fn test_snapshot_all() {
        let inspector = GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 2]),
            MockManager::new(2),
        );
        let snapshots = snapshot(&inspector, &Target::All).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].index, 1);
    }

    #[test]
    fn test_snapshot_without_drivers() {
        let inspector = SystemInspector::unavailable();
        assert!(matches!(
            snapshot(&inspector, &Target::Index(0)),
            Err(AppError::ManagementUnavailable)
        ));
    }
}
