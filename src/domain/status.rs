//! Live status snapshot types
//!
//! A `StatusSnapshot` is assembled fresh on every query and never cached.

use crate::domain::identity::ClockInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Utilization rates in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UtilizationInfo {
    pub gpu: u32,
    pub memory: u32,
    pub encoder: u32,
    pub decoder: u32,
}

/// Uncorrected volatile ECC error counts
///
/// Zero on boards without ECC counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EccErrors {
    pub l1_cache: u64,
    pub l2_cache: u64,
    pub global: u64,
}

impl EccErrors {
    /// Sum of all counters
    pub fn total(&self) -> u64 {
        self.l1_cache + self.l2_cache + self.global
    }
}

/// Device memory usage in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub used: u64,
    pub free: u64,
    pub total: u64,
    pub ecc_errors: EccErrors,
}

/// PCIe throughput in KB/s
///
/// Zero on boards older than Maxwell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PciThroughput {
    pub rx: u32,
    pub tx: u32,
}

/// PCIe side of the status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PciStatus {
    /// BAR1 in use, MiB
    pub bar1_used_mib: u64,
    pub throughput: PciThroughput,
}

/// A compute process running on the GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.pid)
    }
}

/// Point-in-time status of a GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Power draw in watts
    pub power_watts: u32,
    /// GPU temperature in Celsius
    pub temperature: u32,
    pub utilization: UtilizationInfo,
    pub memory: MemoryStatus,
    /// Current clocks
    pub clocks: ClockInfo,
    pub pci: PciStatus,
    pub processes: Vec<ProcessInfo>,
}

impl StatusSnapshot {
    /// Empty snapshot stamped with the given time
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            power_watts: 0,
            temperature: 0,
            utilization: UtilizationInfo::default(),
            memory: MemoryStatus::default(),
            clocks: ClockInfo::default(),
            pci: PciStatus::default(),
            processes: Vec::new(),
        }
    }

    /// Memory used as a percentage of total
    pub fn memory_used_percent(&self) -> f64 {
        if self.memory.total == 0 {
            return 0.0;
        }
        self.memory.used as f64 / self.memory.total as f64 * 100.0
    }
}
