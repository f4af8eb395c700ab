//! Compute capability domain types
//!
//! Normalized description of a CUDA device built from the raw properties
//! reported by the driver.

use crate::domain::arch::{self, ComputeVersion};
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MIB: u64 = 1024 * 1024;
const KIB: u64 = 1024;

/// Raw device properties as reported by the CUDA driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDeviceProperties {
    pub major: u32,
    pub minor: u32,
    pub multiprocessor_count: u32,
    /// Bytes
    pub total_global_mem: u64,
    /// Bytes
    pub shared_mem_per_multiprocessor: u64,
    /// Bytes
    pub total_const_mem: u64,
    /// Bytes
    pub l2_cache_size: u64,
    /// Peak memory clock in kHz
    pub memory_clock_rate: u32,
    /// Global memory bus width in bits
    pub memory_bus_width: u32,
    pub ecc_enabled: bool,
}

impl RawDeviceProperties {
    /// Compute capability version of the device
    pub fn version(&self) -> ComputeVersion {
        ComputeVersion::new(self.major, self.minor)
    }
}

/// Memory geometry of a CUDA device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryGeometry {
    /// ECC enabled on device memory
    pub ecc: bool,
    /// Global memory in MiB
    pub global_mib: u64,
    /// Shared memory per SM in KiB (includes L1 cache)
    pub shared_kib: u64,
    /// Constant memory in KiB
    pub constant_kib: u64,
    /// L2 cache in KiB
    pub l2_cache_kib: u64,
    /// Theoretical memory bandwidth in GB/s
    pub bandwidth_gbps: u64,
}

/// Normalized compute capability record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeCapability {
    /// Architecture family (e.g. "Pascal")
    pub family: String,
    /// Compute capability "major.minor"
    pub arch: String,
    /// Total CUDA cores
    pub cores: u64,
    /// Hyper-Q depth
    pub hyper_q: u32,
    pub memory: MemoryGeometry,
}

impl ComputeCapability {
    /// Build a capability record from raw driver properties
    ///
    /// Fails with `UnsupportedArchitecture` when the compute capability is
    /// absent from the capability tables.
    pub fn from_properties(props: &RawDeviceProperties) -> Result<Self, DomainError> {
        let arch = props.version().key();
        let spec = arch::arch_spec(&arch)?;
        let family = arch::family(&arch)?;

        Ok(Self {
            family: family.to_string(),
            cores: total_cores(spec.cores_per_sm, props.multiprocessor_count),
            hyper_q: spec.hyper_q,
            memory: MemoryGeometry {
                ecc: props.ecc_enabled,
                global_mib: props.total_global_mem / MIB,
                shared_kib: props.shared_mem_per_multiprocessor / KIB,
                constant_kib: props.total_const_mem / KIB,
                l2_cache_kib: props.l2_cache_size / KIB,
                bandwidth_gbps: memory_bandwidth_gbps(
                    props.memory_clock_rate,
                    props.memory_bus_width,
                ),
            },
            arch,
        })
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (sm_{}), {} cores, {} MiB",
            self.family,
            self.arch.replace('.', ""),
            self.cores,
            self.memory.global_mib
        )
    }
}

/// Total CUDA cores for a generation and SM count
pub fn total_cores(cores_per_sm: u32, multiprocessor_count: u32) -> u64 {
    u64::from(cores_per_sm) * u64::from(multiprocessor_count)
}

/// Theoretical memory bandwidth in GB/s
///
/// `2 * (clock_khz / 1000) * (bus_width_bits / 8) / 1000`, doubled for DDR.
/// Each division truncates in this exact order.
pub fn memory_bandwidth_gbps(memory_clock_khz: u32, memory_bus_width_bits: u32) -> u64 {
    let clock_mhz = u64::from(memory_clock_khz) / 1000;
    let bus_bytes = u64::from(memory_bus_width_bits) / 8;
    2 * (clock_mhz * bus_bytes) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pascal_props() -> RawDeviceProperties {
        RawDeviceProperties {
            major: 6,
            minor: 1,
            multiprocessor_count: 20,
            total_global_mem: 8 * 1024 * MIB,
            shared_mem_per_multiprocessor: 96 * KIB,
            total_const_mem: 64 * KIB,
            l2_cache_size: 2048 * KIB,
            memory_clock_rate: 5_005_000,
            memory_bus_width: 256,
            ecc_enabled: false,
        }
    }

    #[test]
    fn test_from_properties() {
        let cap = ComputeCapability::from_properties(&pascal_props()).unwrap();
        assert_eq!(cap.family, "Pascal");
        assert_eq!(cap.arch, "6.1");
        assert_eq!(cap.cores, 2560);
        assert_eq!(cap.hyper_q, 32);
        assert_eq!(cap.memory.global_mib, 8192);
        assert_eq!(cap.memory.shared_kib, 96);
        assert_eq!(cap.memory.constant_kib, 64);
        assert_eq!(cap.memory.l2_cache_kib, 2048);
        assert_eq!(cap.memory.bandwidth_gbps, 320);
        assert!(!cap.memory.ecc);
    }

    #[test]
    fn test_cores_for_every_known_generation() {
        for arch in arch::supported_architectures() {
            let (major, minor) = arch.split_once('.').unwrap();
            let per_sm = arch::cores_per_sm(arch).unwrap();
            for sm_count in [0u32, 1, 7, 56, 132, u32::MAX] {
                let props = RawDeviceProperties {
                    major: major.parse().unwrap(),
                    minor: minor.parse().unwrap(),
                    multiprocessor_count: sm_count,
                    ..Default::default()
                };
                let cap = ComputeCapability::from_properties(&props).unwrap();
                assert_eq!(cap.cores, u64::from(per_sm) * u64::from(sm_count));
            }
        }
    }

    #[test]
    fn test_unknown_generation() {
        let props = RawDeviceProperties {
            major: 8,
            minor: 6,
            ..pascal_props()
        };
        assert_eq!(
            ComputeCapability::from_properties(&props),
            Err(DomainError::UnsupportedArchitecture("8.6".to_string()))
        );
    }

    #[test]
    fn test_memory_bandwidth() {
        assert_eq!(memory_bandwidth_gbps(5_000_000, 256), 320);
        // 877 MHz HBM2 on a 4096-bit bus
        assert_eq!(memory_bandwidth_gbps(877_000, 4096), 898);
        // Truncation happens per step: 999 kHz is 0 MHz
        assert_eq!(memory_bandwidth_gbps(999, 4096), 0);
        assert_eq!(memory_bandwidth_gbps(0, 0), 0);
    }

    #[test]
    fn test_display() {
        let cap = ComputeCapability::from_properties(&pascal_props()).unwrap();
        assert_eq!(cap.to_string(), "Pascal (sm_61), 2560 cores, 8192 MiB");
    }
}
