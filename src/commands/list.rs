//! List command implementation
//!
//! Lists all detected NVIDIA GPUs.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, DeviceList, DeviceListEntry};
use crate::cuda::ComputeRuntime;
use crate::error::Result;
use crate::nvml::GpuManager;
use crate::platform::GpuInspector;

/// Execute the list command
pub fn run_list<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    format: OutputFormat,
) -> Result<()> {
    let list = build_list(inspector)?;
    print_output(&list, format)?;
    Ok(())
}

fn build_list<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
) -> Result<DeviceList> {
    let gpus = inspector
        .devices()?
        .iter()
        .map(DeviceListEntry::from)
        .collect();

    Ok(DeviceList {
        cuda_version: inspector.cuda_version().ok(),
        driver_version: inspector.driver_version().ok(),
        gpus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::mock::{pascal_properties, MockManager, MockRuntime};
    use crate::platform::SystemInspector;

    #[test]
    fn test_build_list() {
        let inspector = GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 2]),
            MockManager::new(2),
        );
        let list = build_list(&inspector).unwrap();

        assert_eq!(list.cuda_version.as_deref(), Some("12.4"));
        assert_eq!(list.gpus.len(), 2);
        assert_eq!(list.gpus[1].name, "Mock GPU 1");
        assert_eq!(list.gpus[1].arch.as_deref(), Some("6.1"));
    }

    #[test]
    fn test_list_without_drivers() {
        let inspector = SystemInspector::unavailable();
        assert!(matches!(
            build_list(&inspector),
            Err(AppError::ComputeUnavailable)
        ));
    }
}
