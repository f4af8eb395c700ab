//! Management identity domain types
//!
//! Static identity of a GPU as reported by NVML: model, UUID, device node,
//! power limit, PCI location and the maximum clocks and PCIe link.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-lane PCIe bandwidth in MB/s, by generation
const PCIE_LANE_BANDWIDTH_MBPS: &[(u32, u64)] = &[
    (1, 250),
    (2, 500),
    (3, 985),
    (4, 1969),
    (5, 3938),
    (6, 7877),
];

/// Clock pair in MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockInfo {
    /// SM clock (MHz)
    pub core: u32,
    /// Memory clock (MHz)
    pub memory: u32,
}

/// Maximum PCIe link the device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcieLink {
    pub generation: u32,
    pub width: u32,
}

impl PcieLink {
    /// Create a new link description
    pub fn new(generation: u32, width: u32) -> Self {
        Self { generation, width }
    }

    /// Theoretical bandwidth in GB/s
    pub fn bandwidth_gbps(&self) -> u64 {
        pcie_bandwidth_gbps(self.generation, self.width)
    }
}

impl fmt::Display for PcieLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen{} x{}", self.generation, self.width)
    }
}

/// PCI location and aperture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciInfo {
    pub bus_id: String,
    /// BAR1 aperture size in MiB
    pub bar1_mib: u64,
    /// Theoretical PCIe bandwidth in GB/s at the maximum link
    pub bandwidth_gbps: u64,
    pub link: PcieLink,
}

/// Normalized management identity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementIdentity {
    pub model: String,
    pub uuid: String,
    /// Device node, e.g. `/dev/nvidia0`
    pub path: String,
    /// Power management limit in watts
    pub power_watts: u32,
    pub pci: PciInfo,
    /// Maximum clocks
    pub clocks: ClockInfo,
}

impl fmt::Display for ManagementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.model, self.uuid, self.pci.bus_id)
    }
}

/// Theoretical PCIe bandwidth in GB/s
///
/// `lane_bandwidth[generation] * width / 1000` with integer truncation.
/// Unknown generations have no bandwidth.
pub fn pcie_bandwidth_gbps(generation: u32, width: u32) -> u64 {
    PCIE_LANE_BANDWIDTH_MBPS
        .iter()
        .find(|(gen, _)| *gen == generation)
        .map(|(_, per_lane)| per_lane * u64::from(width) / 1000)
        .unwrap_or(0)
}

/// Device node path for an NVML minor number
pub fn device_path(minor: u32) -> String {
    format!("/dev/nvidia{}", minor)
}
