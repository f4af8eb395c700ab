//! Topology command implementation
//!
//! Shows the link type between every pair of GPUs.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, TopologyEntry, TopologyMatrix};
use crate::cuda::ComputeRuntime;
use crate::error::Result;
use crate::nvml::GpuManager;
use crate::platform::GpuInspector;

/// Execute the topology command
pub fn run_topology<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    format: OutputFormat,
) -> Result<()> {
    let matrix = build_matrix(inspector)?;
    print_output(&matrix, format)?;
    Ok(())
}

fn build_matrix<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
) -> Result<TopologyMatrix> {
    let count = inspector.device_count()?;
    let bus_ids = (0..count)
        .map(|index| inspector.bus_id(index))
        .collect::<Result<Vec<_>>>()?;

    let mut links = Vec::new();
    for index in 0..count {
        for peer in (0..count).filter(|&p| p != index) {
            links.push(TopologyEntry {
                index,
                peer,
                link: inspector.p2p_link(index, peer)?,
                peer_access: peer_access(inspector, index, peer)?,
            });
        }
    }

    Ok(TopologyMatrix { bus_ids, links })
}

/// Peer access flag, or `None` when the CUDA driver is not installed
fn peer_access<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    index: u32,
    peer: u32,
) -> Result<Option<bool>> {
    match inspector.can_access_peer(index, peer) {
        Ok(access) => Ok(Some(access)),
        Err(e) if e.is_unavailable() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::topology::{TOPOLOGY_MULTIPLE, TOPOLOGY_SYSTEM};
    use crate::domain::P2PLinkType;
    use crate::error::{AppError, CudaError};
    use crate::mock::{pascal_properties, MockDevice, MockManager, MockRuntime};
    use crate::platform::ComputeBackend;

    fn manager() -> MockManager {
        MockManager::with_devices(vec![
            MockDevice::new(0)
                .with_topology(1, TOPOLOGY_MULTIPLE)
                .with_topology(2, TOPOLOGY_SYSTEM),
            MockDevice::new(1)
                .with_topology(0, TOPOLOGY_MULTIPLE)
                .with_topology(2, TOPOLOGY_SYSTEM),
            MockDevice::new(2)
                .with_topology(0, TOPOLOGY_SYSTEM)
                .with_topology(1, TOPOLOGY_SYSTEM),
        ])
    }

    #[test]
    fn test_build_matrix() {
        let inspector = GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 3]).with_peer_access(0, 1),
            manager(),
        );
        let matrix = build_matrix(&inspector).unwrap();

        assert_eq!(matrix.bus_ids.len(), 3);
        assert_eq!(matrix.links.len(), 6);
        assert_eq!(matrix.links[0].link, P2PLinkType::MultiSwitch);
        assert_eq!(matrix.links[0].peer_access, Some(true));
        assert_eq!(matrix.links[1].link, P2PLinkType::CrossCpu);
        assert_eq!(matrix.links[1].peer_access, Some(false));
    }

    #[test]
    fn test_matrix_without_cuda() {
        let inspector = GpuInspector::new(ComputeBackend::Unavailable, manager());
        let matrix = build_matrix(&inspector).unwrap();
        assert!(matrix.links.iter().all(|l| l.peer_access.is_none()));
    }

    #[test]
    fn test_matrix_surfaces_peer_access_failure() {
        let inspector = GpuInspector::new(
            MockRuntime::with_devices(vec![pascal_properties(); 3])
                .with_peer_failure(CudaError::Call("peer access is not supported".into())),
            manager(),
        );
        let result = build_matrix(&inspector);
        assert!(matches!(
            result,
            Err(AppError::VendorCallFailed(msg)) if msg == "peer access is not supported"
        ));
    }
}
