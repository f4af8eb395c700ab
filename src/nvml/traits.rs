//! Trait definitions for NVML operations
//!
//! These traits abstract over NVML to enable testing with mocks. Values are
//! returned in NVML's own units; the translators normalize them.

use crate::error::NvmlError;

/// Clock domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockType {
    /// Streaming multiprocessor clock
    Sm,
    /// Memory clock
    Memory,
}

/// ECC counter location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccLocation {
    L1Cache,
    L2Cache,
    DeviceMemory,
}

/// PCIe traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcieDirection {
    Rx,
    Tx,
}

/// BAR1 aperture usage in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bar1Memory {
    pub total: u64,
    pub used: u64,
}

/// Framebuffer memory usage in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// GPU and memory utilization in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UtilizationRates {
    pub gpu: u32,
    pub memory: u32,
}

/// Trait for per-device NVML queries
pub trait GpuDevice {
    /// NVML index of this device
    fn index(&self) -> u32;

    /// Product name
    fn name(&self) -> Result<String, NvmlError>;

    /// Globally unique id ("GPU-...")
    fn uuid(&self) -> Result<String, NvmlError>;

    /// PCI bus id ("domain:bus:device.function")
    fn pci_bus_id(&self) -> Result<String, NvmlError>;

    /// Minor number of the `/dev/nvidiaN` node
    fn minor_number(&self) -> Result<u32, NvmlError>;

    /// BAR1 aperture size and usage
    fn bar1_memory(&self) -> Result<Bar1Memory, NvmlError>;

    /// Power management limit in milliwatts
    fn power_limit(&self) -> Result<u32, NvmlError>;

    /// Maximum clock in MHz
    fn max_clock(&self, clock: ClockType) -> Result<u32, NvmlError>;

    /// Maximum PCIe link generation
    fn max_pcie_link_gen(&self) -> Result<u32, NvmlError>;

    /// Maximum PCIe link width (lanes)
    fn max_pcie_link_width(&self) -> Result<u32, NvmlError>;

    /// Power draw in milliwatts
    fn power_usage(&self) -> Result<u32, NvmlError>;

    /// GPU core temperature in Celsius
    fn temperature(&self) -> Result<u32, NvmlError>;

    /// GPU and memory utilization
    fn utilization(&self) -> Result<UtilizationRates, NvmlError>;

    /// Encoder utilization in percent
    fn encoder_utilization(&self) -> Result<u32, NvmlError>;

    /// Decoder utilization in percent
    fn decoder_utilization(&self) -> Result<u32, NvmlError>;

    /// Framebuffer memory usage
    fn memory_info(&self) -> Result<MemoryUsage, NvmlError>;

    /// Current clock in MHz
    fn clock(&self, clock: ClockType) -> Result<u32, NvmlError>;

    /// Uncorrected volatile ECC errors at a location
    ///
    /// Boards without ECC counters return `NvmlError::NotSupported`.
    fn ecc_error_count(&self, location: EccLocation) -> Result<u64, NvmlError>;

    /// PCIe throughput in KB/s
    ///
    /// Boards older than Maxwell return `NvmlError::NotSupported`.
    fn pcie_throughput(&self, direction: PcieDirection) -> Result<u32, NvmlError>;

    /// PIDs of running compute processes, at most `capacity` of them
    fn running_compute_processes(&self, capacity: usize) -> Result<Vec<u32>, NvmlError>;

    /// Raw NVML topology level of the nearest common ancestor with `other`
    ///
    /// Drivers without the topology API return `NvmlError::FunctionNotFound`.
    fn topology_common_ancestor(&self, other: &Self) -> Result<u32, NvmlError>
    where
        Self: Sized;
}

/// Trait for discovering devices and system-level queries
pub trait GpuManager: Send + Sync {
    /// The device type returned by this manager
    type Device<'a>: GpuDevice
    where
        Self: 'a;

    /// Get the number of GPU devices
    fn device_count(&self) -> Result<u32, NvmlError>;

    /// Get driver version
    fn driver_version(&self) -> Result<String, NvmlError>;

    /// Get a device by index
    fn device_by_index(&self, index: u32) -> Result<Self::Device<'_>, NvmlError>;

    /// Get a device by PCI bus id
    fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<Self::Device<'_>, NvmlError>;

    /// Name of a running process, truncated to `max_length` bytes
    fn process_name(&self, pid: u32, max_length: usize) -> Result<String, NvmlError>;
}
