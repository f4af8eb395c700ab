//! P2P topology domain types
//!
//! Classifies the nearest common ancestor of two GPUs in the interconnect
//! hierarchy into a link-quality category.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

// nvmlGpuTopologyLevel_t values
pub const TOPOLOGY_INTERNAL: u32 = 0;
pub const TOPOLOGY_SINGLE: u32 = 10;
pub const TOPOLOGY_MULTIPLE: u32 = 20;
pub const TOPOLOGY_HOSTBRIDGE: u32 = 30;
pub const TOPOLOGY_NODE: u32 = 40;
pub const TOPOLOGY_SYSTEM: u32 = 50;

/// Link quality between two GPUs, worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum P2PLinkType {
    /// Topology query not available on this driver
    Unknown,
    /// Path crosses CPU sockets (SMP interconnect)
    CrossCpu,
    /// Path goes through the same CPU socket
    SameCpu,
    /// Path goes through a host PCI bridge
    HostBridge,
    /// Path crosses several PCIe switches
    MultiSwitch,
    /// Path crosses a single PCIe switch
    SingleSwitch,
    /// Both GPUs sit on the same board
    SameBoard,
}

impl P2PLinkType {
    /// Map a raw NVML topology level to a link category
    ///
    /// Values outside the six known levels are rejected.
    pub fn from_topology_level(level: u32) -> Result<Self, DomainError> {
        match level {
            TOPOLOGY_INTERNAL => Ok(Self::SameBoard),
            TOPOLOGY_SINGLE => Ok(Self::SingleSwitch),
            TOPOLOGY_MULTIPLE => Ok(Self::MultiSwitch),
            TOPOLOGY_HOSTBRIDGE => Ok(Self::HostBridge),
            TOPOLOGY_NODE => Ok(Self::SameCpu),
            TOPOLOGY_SYSTEM => Ok(Self::CrossCpu),
            other => Err(DomainError::UnsupportedLinkType(other)),
        }
    }

    /// Short label in nvidia-smi topo style
    pub fn short_label(&self) -> &'static str {
        match self {
            Self::Unknown => "?",
            Self::CrossCpu => "SYS",
            Self::SameCpu => "NODE",
            Self::HostBridge => "PHB",
            Self::MultiSwitch => "PXB",
            Self::SingleSwitch => "PIX",
            Self::SameBoard => "BRD",
        }
    }
}

impl fmt::Display for P2PLinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::CrossCpu => write!(f, "Cross CPU socket"),
            Self::SameCpu => write!(f, "Same CPU socket"),
            Self::HostBridge => write!(f, "Host PCI bridge"),
            Self::MultiSwitch => write!(f, "Multiple PCI switches"),
            Self::SingleSwitch => write!(f, "Single PCI switch"),
            Self::SameBoard => write!(f, "Same board"),
        }
    }
}

/// Link between two GPUs identified by PCI bus id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2PLink {
    pub bus_id: String,
    pub peer_bus_id: String,
    pub link: P2PLinkType,
}

impl P2PLink {
    /// Create a new link record
    pub fn new(bus_id: impl Into<String>, peer_bus_id: impl Into<String>, link: P2PLinkType) -> Self {
        Self {
            bus_id: bus_id.into(),
            peer_bus_id: peer_bus_id.into(),
            link,
        }
    }
}

impl fmt::Display for P2PLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}: {}", self.bus_id, self.peer_bus_id, self.link)
    }
}
