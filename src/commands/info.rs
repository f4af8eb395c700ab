//! Info command implementation
//!
//! Shows the merged compute and management record of each GPU.

use crate::cli::args::{InfoArgs, OutputFormat};
use crate::cli::output::print_output;
use crate::commands::{target_devices, Target};
use crate::cuda::ComputeRuntime;
use crate::domain::Device;
use crate::error::Result;
use crate::nvml::GpuManager;
use crate::platform::GpuInspector;

/// Execute the info command
pub fn run_info<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    args: &InfoArgs,
    format: OutputFormat,
    target: &Target,
) -> Result<()> {
    let devices = describe(inspector, target, !args.no_topology)?;
    print_output(&devices, format)?;
    Ok(())
}

fn describe<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    target: &Target,
    with_topology: bool,
) -> Result<Vec<Device>> {
    let mut devices = target_devices(inspector, target)?;

    if with_topology {
        for device in devices.iter_mut().filter(|d| d.management().is_some()) {
            device.topology = inspector.topology(device.index)?;
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::topology::TOPOLOGY_NODE;
    use crate::domain::P2PLinkType;
    use crate::mock::{pascal_properties, MockDevice, MockManager, MockRuntime};
    use crate::platform::ComputeBackend;

    fn inspector() -> GpuInspector<MockRuntime, MockManager> {
        GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 2]),
            MockManager::with_devices(vec![
                MockDevice::new(0).with_topology(1, TOPOLOGY_NODE),
                MockDevice::new(1).with_topology(0, TOPOLOGY_NODE),
            ]),
        )
    }

    #[test]
    fn test_describe_with_topology() {
        let devices = describe(&inspector(), &Target::Index(0), true).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].topology.len(), 1);
        assert_eq!(devices[0].topology[0].link, P2PLinkType::SameCpu);
    }

    #[test]
    fn test_describe_without_topology() {
        let devices = describe(&inspector(), &Target::All, false).unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.topology.is_empty()));
    }

    #[test]
    fn test_describe_by_bus_id() {
        let devices = describe(&inspector(), &Target::BusId("00000000:02:00.0".into()), true).unwrap();
        assert_eq!(devices[0].index, 1);
        assert_eq!(devices[0].topology[0].peer_bus_id, "00000000:01:00.0");
    }

    #[test]
    fn test_management_only_devices() {
        let inspector = GpuInspector::new(ComputeBackend::Unavailable, MockManager::new(1));
        let devices = describe(&inspector, &Target::All, true).unwrap();
        assert!(devices[0].compute().is_none());
        assert!(devices[0].topology.is_empty());
    }
}
