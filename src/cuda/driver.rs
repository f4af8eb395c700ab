//! CUDA driver API binding
//!
//! Loads `libcuda` at runtime through cudarc's dynamically loaded driver
//! bindings and calls the handful of entry points the compute translator
//! needs. Nothing is linked at build time, so the binary starts on hosts
//! without a CUDA driver.

use crate::cuda::traits::ComputeRuntime;
use crate::domain::RawDeviceProperties;
use crate::error::CudaError;

use cudarc::driver::sys::{CUdevice, CUdevice_attribute, CUresult, Lib};
use libloading::Library;
use std::ffi::{c_char, c_int, CStr, CString, OsStr};

/// Default driver library names, tried in order
pub const DEFAULT_LIBRARIES: &[&str] = &["libcuda.so.1", "libcuda.so"];

/// Runtime-loaded CUDA driver
pub struct CudaDriver {
    lib: Lib,
}

impl CudaDriver {
    /// Load the driver from the default library names and initialize it
    pub fn load() -> Result<Self, CudaError> {
        Self::load_from(DEFAULT_LIBRARIES)
    }

    /// Load the driver from the first usable candidate and initialize it
    ///
    /// Returns `CudaError::Unavailable` when no candidate can be loaded or
    /// none exports the full driver API.
    pub fn load_from<S: AsRef<OsStr>>(candidates: &[S]) -> Result<Self, CudaError> {
        for candidate in candidates {
            let name = candidate.as_ref();
            // SAFETY: loading the vendor driver runs its initializers, which
            // is the documented way to use libcuda.
            let lib = match unsafe { Library::new(name) } {
                Ok(library) => unsafe { Lib::from_library(library) },
                Err(e) => Err(e),
            };
            match lib {
                Ok(lib) => {
                    log::debug!("Loaded CUDA driver from {}", name.to_string_lossy());
                    let driver = Self { lib };
                    driver.init()?;
                    return Ok(driver);
                }
                Err(e) => log::debug!("Cannot load {}: {}", name.to_string_lossy(), e),
            }
        }
        Err(CudaError::Unavailable)
    }

    fn init(&self) -> Result<(), CudaError> {
        self.check(unsafe { (self.lib.cuInit)(0) })
    }

    fn check(&self, result: CUresult) -> Result<(), CudaError> {
        if result == CUresult::CUDA_SUCCESS {
            Ok(())
        } else {
            Err(CudaError::Call(self.error_string(result)))
        }
    }

    /// The driver's own description of an error code
    fn error_string(&self, code: CUresult) -> String {
        let mut ptr: *const c_char = std::ptr::null();
        let result = unsafe { (self.lib.cuGetErrorString)(code, &mut ptr) };
        if result == CUresult::CUDA_SUCCESS && !ptr.is_null() {
            // SAFETY: the driver returns a static NUL-terminated string
            return unsafe { CStr::from_ptr(ptr) }
                .to_string_lossy()
                .into_owned();
        }
        format!("CUDA error: {:?}", code)
    }

    fn device(&self, index: u32) -> Result<CUdevice, CudaError> {
        let ordinal = c_int::try_from(index)
            .map_err(|_| CudaError::Call(format!("invalid device ordinal: {}", index)))?;
        let mut device: CUdevice = 0;
        self.check(unsafe { (self.lib.cuDeviceGet)(&mut device, ordinal) })?;
        Ok(device)
    }

    fn attribute(&self, device: CUdevice, attribute: CUdevice_attribute) -> Result<u32, CudaError> {
        let mut value: c_int = 0;
        self.check(unsafe { (self.lib.cuDeviceGetAttribute)(&mut value, attribute, device) })?;
        Ok(value.max(0) as u32)
    }

    fn total_memory(&self, device: CUdevice) -> Result<u64, CudaError> {
        let mut bytes: usize = 0;
        self.check(unsafe { (self.lib.cuDeviceTotalMem_v2)(&mut bytes, device) })?;
        Ok(bytes as u64)
    }
}

impl ComputeRuntime for CudaDriver {
    fn device_count(&self) -> Result<u32, CudaError> {
        let mut count: c_int = 0;
        self.check(unsafe { (self.lib.cuDeviceGetCount)(&mut count) })?;
        Ok(count.max(0) as u32)
    }

    fn driver_version(&self) -> Result<i32, CudaError> {
        let mut version: c_int = 0;
        self.check(unsafe { (self.lib.cuDriverGetVersion)(&mut version) })?;
        Ok(version)
    }

    fn device_properties(&self, index: u32) -> Result<RawDeviceProperties, CudaError> {
        use CUdevice_attribute::*;

        let dev = self.device(index)?;

        Ok(RawDeviceProperties {
            major: self.attribute(dev, CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?,
            minor: self.attribute(dev, CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?,
            multiprocessor_count: self.attribute(dev, CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?,
            total_global_mem: self.total_memory(dev)?,
            shared_mem_per_multiprocessor: u64::from(
                self.attribute(dev, CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_MULTIPROCESSOR)?,
            ),
            total_const_mem: u64::from(
                self.attribute(dev, CU_DEVICE_ATTRIBUTE_TOTAL_CONSTANT_MEMORY)?,
            ),
            l2_cache_size: u64::from(self.attribute(dev, CU_DEVICE_ATTRIBUTE_L2_CACHE_SIZE)?),
            memory_clock_rate: self.attribute(dev, CU_DEVICE_ATTRIBUTE_MEMORY_CLOCK_RATE)?,
            memory_bus_width: self.attribute(dev, CU_DEVICE_ATTRIBUTE_GLOBAL_MEMORY_BUS_WIDTH)?,
            ecc_enabled: self.attribute(dev, CU_DEVICE_ATTRIBUTE_ECC_ENABLED)? != 0,
        })
    }

    fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<u32, CudaError> {
        let c_bus_id = CString::new(bus_id)
            .map_err(|_| CudaError::Call(format!("invalid PCI bus id: {:?}", bus_id)))?;
        let mut device: CUdevice = 0;
        self.check(unsafe { (self.lib.cuDeviceGetByPCIBusId)(&mut device, c_bus_id.as_ptr()) })?;
        Ok(device.max(0) as u32)
    }

    fn can_access_peer(&self, index: u32, peer: u32) -> Result<bool, CudaError> {
        let dev = self.device(index)?;
        let peer_dev = self.device(peer)?;
        let mut can_access: c_int = 0;
        self.check(unsafe { (self.lib.cuDeviceCanAccessPeer)(&mut can_access, dev, peer_dev) })?;
        Ok(can_access != 0)
    }

    fn reset_device(&self, index: u32) -> Result<(), CudaError> {
        let dev = self.device(index)?;
        self.check(unsafe { (self.lib.cuDevicePrimaryCtxReset_v2)(dev) })
    }
}
