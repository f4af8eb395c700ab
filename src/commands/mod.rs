//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command
//! against a [`GpuInspector`].

pub mod info;
pub mod list;
pub mod status;
pub mod topology;
pub mod version;

pub use info::run_info;
pub use list::run_list;
pub use status::run_status;
pub use topology::run_topology;
pub use version::run_version;

use crate::config::GpuConfig;
use crate::cuda::ComputeRuntime;
use crate::domain::Device;
use crate::error::{AppError, Result};
use crate::nvml::GpuManager;
use crate::platform::GpuInspector;

/// Which GPUs a command applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Index(u32),
    BusId(String),
}

impl Target {
    /// Target selected by the merged configuration
    pub fn from_config(gpu: &GpuConfig) -> Self {
        match (&gpu.bus_id, gpu.index) {
            (Some(bus_id), _) => Self::BusId(bus_id.clone()),
            (None, Some(index)) => Self::Index(index),
            (None, None) => Self::All,
        }
    }
}

/// Describe the targeted devices
pub(crate) fn target_devices<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    target: &Target,
) -> Result<Vec<Device>> {
    match target {
        Target::All => inspector.devices(),
        Target::Index(index) => {
            check_index(inspector, *index)?;
            Ok(vec![inspector.device(*index)?])
        }
        Target::BusId(bus_id) => Ok(vec![inspector.device_by_bus_id(bus_id)?]),
    }
}

/// NVML indices of the targeted devices
pub(crate) fn target_indices<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    target: &Target,
) -> Result<Vec<u32>> {
    match target {
        Target::All => Ok((0..inspector.device_count()?).collect()),
        Target::Index(index) => {
            check_index(inspector, *index)?;
            Ok(vec![*index])
        }
        Target::BusId(bus_id) => Ok(vec![inspector.index_of_bus_id(bus_id)?]),
    }
}

/// Reject an index beyond the device count when either library knows it
fn check_index<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    index: u32,
) -> Result<()> {
    let count = inspector
        .device_count()
        .or_else(|_| inspector.compute_device_count());
    match count {
        Ok(count) if index >= count => Err(AppError::DeviceNotFound(format!(
            "index {} (found {} GPUs)",
            index, count
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{pascal_properties, MockManager, MockRuntime};

    #[test]
    fn test_target_from_config() {
        let mut gpu = GpuConfig::default();
        assert_eq!(Target::from_config(&gpu), Target::All);

        gpu.index = Some(2);
        assert_eq!(Target::from_config(&gpu), Target::Index(2));

        gpu.bus_id = Some("00000000:01:00.0".into());
        assert_eq!(
            Target::from_config(&gpu),
            Target::BusId("00000000:01:00.0".into())
        );
    }

    #[test]
    fn test_target_indices() {
        let inspector = GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 3]),
            MockManager::new(3),
        );
        assert_eq!(target_indices(&inspector, &Target::All).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            target_indices(&inspector, &Target::BusId("00000000:03:00.0".into())).unwrap(),
            vec![2]
        );
        assert_eq!(target_devices(&inspector, &Target::Index(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_index_out_of_range() {
        let inspector = GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 2]),
            MockManager::new(2),
        );
        assert!(matches!(
            target_indices(&inspector, &Target::Index(5)),
            Err(AppError::DeviceNotFound(_))
        ));
    }
}
