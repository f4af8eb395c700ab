//! Trait definitions for CUDA driver operations
//!
//! The translators only see this trait, so they can be exercised with the
//! mock runtime and with the always-unavailable backend.

use crate::domain::RawDeviceProperties;
use crate::error::CudaError;

/// Narrow view of the CUDA driver used by the compute translator
pub trait ComputeRuntime: Send + Sync {
    /// Number of CUDA-capable devices
    fn device_count(&self) -> Result<u32, CudaError>;

    /// Driver API version as reported by the driver (e.g. 12040)
    fn driver_version(&self) -> Result<i32, CudaError>;

    /// Read the raw properties of the device at `index`
    fn device_properties(&self, index: u32) -> Result<RawDeviceProperties, CudaError>;

    /// Resolve a PCI bus id ("domain:bus:device.function") to a device index
    fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<u32, CudaError>;

    /// Whether `index` can directly access memory of `peer`
    fn can_access_peer(&self, index: u32, peer: u32) -> Result<bool, CudaError>;

    /// Destroy the primary context of the device at `index`
    fn reset_device(&self, index: u32) -> Result<(), CudaError>;
}

/// Format a driver API version as "major.minor"
pub fn format_driver_version(version: i32) -> String {
    format!("{}.{}", version / 1000, version % 100 / 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_driver_version() {
        assert_eq!(format_driver_version(12040), "12.4");
        assert_eq!(format_driver_version(11080), "11.8");
        assert_eq!(format_driver_version(9020), "9.2");
        assert_eq!(format_driver_version(0), "0.0");
    }
}
