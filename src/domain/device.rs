//! Merged device record
//!
//! Binds a compute capability record and a management identity record for
//! the same physical GPU under one index.

use crate::domain::compute::ComputeCapability;
use crate::domain::identity::ManagementIdentity;
use crate::domain::topology::P2PLink;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A GPU described by CUDA and/or NVML
///
/// At least one of `compute` and `management` is always present, also
/// when a record is read back from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeviceRecord")]
pub struct Device {
    pub index: u32,
    compute: Option<ComputeCapability>,
    management: Option<ManagementIdentity>,
    /// Links to every other GPU, filled in on request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology: Vec<P2PLink>,
}

/// Unchecked wire form of [`Device`]
#[derive(Deserialize)]
struct DeviceRecord {
    index: u32,
    #[serde(default)]
    compute: Option<ComputeCapability>,
    #[serde(default)]
    management: Option<ManagementIdentity>,
    #[serde(default)]
    topology: Vec<P2PLink>,
}

impl TryFrom<DeviceRecord> for Device {
    type Error = String;

    fn try_from(record: DeviceRecord) -> Result<Self, Self::Error> {
        if record.compute.is_none() && record.management.is_none() {
            return Err(format!(
                "GPU {} has neither a compute nor a management record",
                record.index
            ));
        }
        Ok(Self {
            index: record.index,
            compute: record.compute,
            management: record.management,
            topology: record.topology,
        })
    }
}

impl Device {
    /// Device with both sub-records
    pub fn new(index: u32, compute: ComputeCapability, management: ManagementIdentity) -> Self {
        Self {
            index,
            compute: Some(compute),
            management: Some(management),
            topology: Vec::new(),
        }
    }

    /// Device known only to the CUDA driver
    pub fn compute_only(index: u32, compute: ComputeCapability) -> Self {
        Self {
            index,
            compute: Some(compute),
            management: None,
            topology: Vec::new(),
        }
    }

    /// Device known only to NVML
    pub fn management_only(index: u32, management: ManagementIdentity) -> Self {
        Self {
            index,
            compute: None,
            management: Some(management),
            topology: Vec::new(),
        }
    }

    /// Compute capability record, if the CUDA side succeeded
    pub fn compute(&self) -> Option<&ComputeCapability> {
        self.compute.as_ref()
    }

    /// Management identity record, if the NVML side succeeded
    pub fn management(&self) -> Option<&ManagementIdentity> {
        self.management.as_ref()
    }

    /// PCI bus id, known only through NVML
    pub fn bus_id(&self) -> Option<&str> {
        self.management.as_ref().map(|m| m.pci.bus_id.as_str())
    }

    /// Best display name available
    pub fn display_name(&self) -> String {
        match (&self.management, &self.compute) {
            (Some(m), _) => m.model.clone(),
            (None, Some(c)) => format!("{} GPU (sm_{})", c.family, c.arch.replace('.', "")),
            (None, None) => format!("GPU {}", self.index),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.display_name())
    }
}
