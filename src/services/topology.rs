//! Topology classifier
//!
//! Classifies the peer-to-peer link between two GPUs from their nearest
//! common ancestor in the PCIe hierarchy.

use crate::domain::{P2PLink, P2PLinkType};
use crate::error::{NvmlError, ServiceError};
use crate::nvml::{GpuDevice, GpuManager};

/// Classify the link between two devices
///
/// Drivers that do not export the topology query yield
/// [`P2PLinkType::Unknown`]. Any other failure is an error.
pub fn classify_link<D: GpuDevice>(a: &D, b: &D) -> Result<P2PLinkType, ServiceError> {
    match a.topology_common_ancestor(b) {
        Ok(level) => Ok(P2PLinkType::from_topology_level(level)?),
        Err(NvmlError::FunctionNotFound(msg)) => {
            log::warn!("Topology query unavailable, link type unknown: {}", msg);
            Ok(P2PLinkType::Unknown)
        }
        Err(e) => Err(e.into()),
    }
}

/// Links from the device at `index` to every other device
pub fn device_topology<M: GpuManager>(
    manager: &M,
    index: u32,
) -> Result<Vec<P2PLink>, ServiceError> {
    let device = manager.device_by_index(index)?;
    let bus_id = device.pci_bus_id()?;
    let count = manager.device_count()?;

    let mut links = Vec::new();
    for peer_index in (0..count).filter(|&i| i != index) {
        let peer = manager.device_by_index(peer_index)?;
        let link = classify_link(&device, &peer)?;
        links.push(P2PLink::new(bus_id.clone(), peer.pci_bus_id()?, link));
    }

    Ok(links)
}
