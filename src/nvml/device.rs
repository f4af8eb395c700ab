//! NVML device implementation
//!
//! Real implementation of GpuDevice trait using nvml-wrapper, with raw
//! calls for the queries the wrapper does not cover.

use crate::error::NvmlError;
use crate::nvml::raw;
use crate::nvml::traits::{
    Bar1Memory, ClockType, EccLocation, GpuDevice, MemoryUsage, PcieDirection, UtilizationRates,
};

use nvml_wrapper::enum_wrappers::device::{Clock, PcieUtilCounter, TemperatureSensor};
use nvml_wrapper::Device;

/// NVML device wrapper implementing GpuDevice trait
pub struct NvmlDevice<'a> {
    device: Device<'a>,
    index: u32,
}

impl<'a> NvmlDevice<'a> {
    /// Create a new NVML device wrapper
    pub fn new(device: Device<'a>, index: u32) -> Self {
        Self { device, index }
    }
}

/// Convert nvml-wrapper errors into ours, keeping NVML's wording
pub(crate) fn convert_error(err: nvml_wrapper::error::NvmlError) -> NvmlError {
    use nvml_wrapper::error::NvmlError as NE;
    match err {
        NE::NotSupported => NvmlError::NotSupported(err.to_string()),
        NE::FunctionNotFound => NvmlError::FunctionNotFound(err.to_string()),
        NE::LibloadingError(_) => NvmlError::Unavailable,
        other => NvmlError::Call(other.to_string()),
    }
}

fn nvml_clock(clock: ClockType) -> Clock {
    match clock {
        ClockType::Sm => Clock::SM,
        ClockType::Memory => Clock::Memory,
    }
}

impl GpuDevice for NvmlDevice<'_> {
    fn index(&self) -> u32 {
        self.index
    }

    fn name(&self) -> Result<String, NvmlError> {
        self.device.name().map_err(convert_error)
    }

    fn uuid(&self) -> Result<String, NvmlError> {
        self.device.uuid().map_err(convert_error)
    }

    fn pci_bus_id(&self) -> Result<String, NvmlError> {
        Ok(self.device.pci_info().map_err(convert_error)?.bus_id)
    }

    fn minor_number(&self) -> Result<u32, NvmlError> {
        raw::minor_number(unsafe { self.device.handle() })
    }

    fn bar1_memory(&self) -> Result<Bar1Memory, NvmlError> {
        let bar1 = self.device.bar1_memory_info().map_err(convert_error)?;
        Ok(Bar1Memory {
            total: bar1.total,
            used: bar1.used,
        })
    }

    fn power_limit(&self) -> Result<u32, NvmlError> {
        self.device.power_management_limit().map_err(convert_error)
    }

    fn max_clock(&self, clock: ClockType) -> Result<u32, NvmlError> {
        self.device
            .max_clock_info(nvml_clock(clock))
            .map_err(convert_error)
    }

    fn max_pcie_link_gen(&self) -> Result<u32, NvmlError> {
        self.device.max_pcie_link_gen().map_err(convert_error)
    }

    fn max_pcie_link_width(&self) -> Result<u32, NvmlError> {
        self.device.max_pcie_link_width().map_err(convert_error)
    }

    fn power_usage(&self) -> Result<u32, NvmlError> {
        self.device.power_usage().map_err(convert_error)
    }

    fn temperature(&self) -> Result<u32, NvmlError> {
        self.device
            .temperature(TemperatureSensor::Gpu)
            .map_err(convert_error)
    }

    fn utilization(&self) -> Result<UtilizationRates, NvmlError> {
        let rates = self.device.utilization_rates().map_err(convert_error)?;
        Ok(UtilizationRates {
            gpu: rates.gpu,
            memory: rates.memory,
        })
    }

    fn encoder_utilization(&self) -> Result<u32, NvmlError> {
        raw::codec_utilization(unsafe { self.device.handle() }, true)
    }

    fn decoder_utilization(&self) -> Result<u32, NvmlError> {
        raw::codec_utilization(unsafe { self.device.handle() }, false)
    }

    fn memory_info(&self) -> Result<MemoryUsage, NvmlError> {
        let mem = self.device.memory_info().map_err(convert_error)?;
        Ok(MemoryUsage {
            total: mem.total,
            used: mem.used,
            free: mem.free,
        })
    }

    fn clock(&self, clock: ClockType) -> Result<u32, NvmlError> {
        self.device
            .clock_info(nvml_clock(clock))
            .map_err(convert_error)
    }

    fn ecc_error_count(&self, location: EccLocation) -> Result<u64, NvmlError> {
        let location = match location {
            EccLocation::L1Cache => raw::NVML_MEMORY_LOCATION_L1_CACHE,
            EccLocation::L2Cache => raw::NVML_MEMORY_LOCATION_L2_CACHE,
            EccLocation::DeviceMemory => raw::NVML_MEMORY_LOCATION_DEVICE_MEMORY,
        };
        raw::memory_error_counter(unsafe { self.device.handle() }, location)
    }

    fn pcie_throughput(&self, direction: PcieDirection) -> Result<u32, NvmlError> {
        let counter = match direction {
            PcieDirection::Rx => PcieUtilCounter::Receive,
            PcieDirection::Tx => PcieUtilCounter::Send,
        };
        self.device.pcie_throughput(counter).map_err(convert_error)
    }

    fn running_compute_processes(&self, capacity: usize) -> Result<Vec<u32>, NvmlError> {
        raw::compute_running_processes(unsafe { self.device.handle() }, capacity)
    }

    fn topology_common_ancestor(&self, other: &Self) -> Result<u32, NvmlError> {
        raw::topology_common_ancestor(unsafe { self.device.handle() }, unsafe {
            other.device.handle()
        })
    }
}
