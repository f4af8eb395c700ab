//! NVML abstraction layer
//!
//! Provides trait-based abstractions over NVML for testability.

pub mod device;
pub(crate) mod raw;
pub mod traits;
pub mod wrapper;

pub use device::NvmlDevice;
pub use traits::{
    Bar1Memory, ClockType, EccLocation, GpuDevice, GpuManager, MemoryUsage, PcieDirection,
    UtilizationRates,
};
pub use wrapper::NvmlManager;
