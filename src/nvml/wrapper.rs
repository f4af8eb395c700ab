//! NVML manager implementation
//!
//! Provides the main interface for NVML initialization and device discovery.

use crate::error::NvmlError;
use crate::nvml::device::{convert_error, NvmlDevice};
use crate::nvml::traits::GpuManager;

use nvml_wrapper::Nvml;

/// NVML manager for GPU discovery
pub struct NvmlManager {
    nvml: Nvml,
}

impl NvmlManager {
    /// Initialize NVML and create a new manager
    ///
    /// A missing library maps to `NvmlError::Unavailable`.
    pub fn new() -> Result<Self, NvmlError> {
        let nvml = Nvml::init().map_err(|e| match e {
            nvml_wrapper::error::NvmlError::LibloadingError(_) => NvmlError::Unavailable,
            nvml_wrapper::error::NvmlError::DriverNotLoaded => {
                NvmlError::Call("NVIDIA driver not loaded".to_string())
            }
            other => convert_error(other),
        })?;

        Ok(Self { nvml })
    }
}

impl GpuManager for NvmlManager {
    type Device<'a> = NvmlDevice<'a>;

    fn device_count(&self) -> Result<u32, NvmlError> {
        self.nvml.device_count().map_err(convert_error)
    }

    fn driver_version(&self) -> Result<String, NvmlError> {
        self.nvml.sys_driver_version().map_err(convert_error)
    }

    fn device_by_index(&self, index: u32) -> Result<NvmlDevice<'_>, NvmlError> {
        let device = self.nvml.device_by_index(index).map_err(convert_error)?;
        Ok(NvmlDevice::new(device, index))
    }

    fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<NvmlDevice<'_>, NvmlError> {
        let device = self
            .nvml
            .device_by_pci_bus_id(bus_id)
            .map_err(convert_error)?;
        let index = device.index().map_err(convert_error)?;
        Ok(NvmlDevice::new(device, index))
    }

    fn process_name(&self, pid: u32, max_length: usize) -> Result<String, NvmlError> {
        self.nvml
            .sys_process_name(pid, max_length)
            .map_err(convert_error)
    }
}
