//! Platform availability gate
//!
//! Each vendor library is probed once at startup. A library that cannot be
//! loaded is replaced by an always-unavailable backend, so every operation
//! on that side fails with the same well-known error instead of a
//! vendor-shaped one.

use crate::config::LibraryConfig;
use crate::cuda::{format_driver_version, ComputeRuntime, CudaDriver};
use crate::domain::{
    ComputeCapability, Device, ManagementIdentity, P2PLink, P2PLinkType, RawDeviceProperties,
    StatusSnapshot,
};
use crate::error::{AppError, CudaError, NvmlError, Result, ServiceError};
use crate::nvml::{GpuDevice, GpuManager, NvmlDevice, NvmlManager};
use crate::services::{self, StatusService};

/// CUDA driver, or nothing
pub enum ComputeBackend {
    Native(CudaDriver),
    Unavailable,
}

impl ComputeBackend {
    /// Load the driver from `candidates`, falling back to unavailable
    pub fn probe<S: AsRef<std::ffi::OsStr>>(candidates: &[S]) -> Self {
        match CudaDriver::load_from(candidates) {
            Ok(driver) => Self::Native(driver),
            Err(e) => {
                log::warn!("CUDA driver unavailable: {}", e);
                Self::Unavailable
            }
        }
    }

    /// Whether the driver was loaded
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    fn native(&self) -> std::result::Result<&CudaDriver, CudaError> {
        match self {
            Self::Native(driver) => Ok(driver),
            Self::Unavailable => Err(CudaError::Unavailable),
        }
    }
}

impl ComputeRuntime for ComputeBackend {
    fn device_count(&self) -> std::result::Result<u32, CudaError> {
        self.native()?.device_count()
    }

    fn driver_version(&self) -> std::result::Result<i32, CudaError> {
        self.native()?.driver_version()
    }

    fn device_properties(&self, index: u32) -> std::result::Result<RawDeviceProperties, CudaError> {
        self.native()?.device_properties(index)
    }

    fn device_by_pci_bus_id(&self, bus_id: &str) -> std::result::Result<u32, CudaError> {
        self.native()?.device_by_pci_bus_id(bus_id)
    }

    fn can_access_peer(&self, index: u32, peer: u32) -> std::result::Result<bool, CudaError> {
        self.native()?.can_access_peer(index, peer)
    }

    fn reset_device(&self, index: u32) -> std::result::Result<(), CudaError> {
        self.native()?.reset_device(index)
    }
}

/// NVML, or nothing
pub enum ManagementBackend {
    Native(NvmlManager),
    Unavailable,
}

impl ManagementBackend {
    /// Initialize NVML, falling back to unavailable
    pub fn probe() -> Self {
        match NvmlManager::new() {
            Ok(manager) => Self::Native(manager),
            Err(e) => {
                log::warn!("NVML unavailable: {}", e);
                Self::Unavailable
            }
        }
    }

    /// Whether NVML was initialized
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    fn native(&self) -> std::result::Result<&NvmlManager, NvmlError> {
        match self {
            Self::Native(manager) => Ok(manager),
            Self::Unavailable => Err(NvmlError::Unavailable),
        }
    }
}

impl GpuManager for ManagementBackend {
    type Device<'a> = NvmlDevice<'a>;

    fn device_count(&self) -> std::result::Result<u32, NvmlError> {
        self.native()?.device_count()
    }

    fn driver_version(&self) -> std::result::Result<String, NvmlError> {
        self.native()?.driver_version()
    }

    fn device_by_index(&self, index: u32) -> std::result::Result<NvmlDevice<'_>, NvmlError> {
        self.native()?.device_by_index(index)
    }

    fn device_by_pci_bus_id(&self, bus_id: &str) -> std::result::Result<NvmlDevice<'_>, NvmlError> {
        self.native()?.device_by_pci_bus_id(bus_id)
    }

    fn process_name(&self, pid: u32, max_length: usize) -> std::result::Result<String, NvmlError> {
        self.native()?.process_name(pid, max_length)
    }
}

/// The inspector backed by whatever the host provides
pub type SystemInspector = GpuInspector<ComputeBackend, ManagementBackend>;

/// Probe both vendor libraries and build an inspector
pub fn probe(libraries: &LibraryConfig, status: StatusService) -> SystemInspector {
    let runtime = ComputeBackend::probe(libraries.cuda.as_slice());
    let manager = ManagementBackend::probe();
    log::debug!(
        "Platform probe: CUDA {}, NVML {}",
        if runtime.is_available() { "available" } else { "unavailable" },
        if manager.is_available() { "available" } else { "unavailable" },
    );
    GpuInspector::new(runtime, manager).with_status_service(status)
}

/// Query facade over a compute runtime and a management library
pub struct GpuInspector<R, M> {
    runtime: R,
    manager: M,
    status: StatusService,
}

impl SystemInspector {
    /// Inspector with neither library, as on a host without NVIDIA drivers
    pub fn unavailable() -> Self {
        Self::new(ComputeBackend::Unavailable, ManagementBackend::Unavailable)
    }
}

impl<R: ComputeRuntime, M: GpuManager> GpuInspector<R, M> {
    /// Create an inspector over the given backends
    pub fn new(runtime: R, manager: M) -> Self {
        Self {
            runtime,
            manager,
            status: StatusService::default(),
        }
    }

    /// Builder: set the status service
    pub fn with_status_service(mut self, status: StatusService) -> Self {
        self.status = status;
        self
    }

    /// The compute runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The management library
    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// CUDA driver API version, e.g. "12.4"
    pub fn cuda_version(&self) -> Result<String> {
        Ok(format_driver_version(self.runtime.driver_version()?))
    }

    /// Management driver version string
    pub fn driver_version(&self) -> Result<String> {
        Ok(self.manager.driver_version()?)
    }

    /// Number of GPUs known to NVML
    pub fn device_count(&self) -> Result<u32> {
        Ok(self.manager.device_count()?)
    }

    /// Number of GPUs known to the CUDA driver
    pub fn compute_device_count(&self) -> Result<u32> {
        Ok(self.runtime.device_count()?)
    }

    /// Describe the GPU at `index`
    ///
    /// Both sides are queried. If only one succeeds the device carries that
    /// record alone; if both fail the compute error is returned.
    pub fn device(&self, index: u32) -> Result<Device> {
        let compute = services::describe_compute_device(&self.runtime, index);
        let management = services::describe_managed_device_at(&self.manager, index);
        assemble(index, compute, management)
    }

    /// Describe the GPU at a PCI bus id
    pub fn device_by_bus_id(&self, bus_id: &str) -> Result<Device> {
        let compute = services::describe_compute_device_by_bus_id(&self.runtime, bus_id);
        let management = self
            .manager
            .device_by_pci_bus_id(bus_id)
            .map_err(ServiceError::from)
            .and_then(|device| {
                Ok((device.index(), services::describe_managed_device(&device)?))
            });

        let index = match (&management, &compute) {
            (Ok((index, _)), _) | (Err(_), Ok((index, _))) => *index,
            (Err(_), Err(e)) => return Err(e.clone().into()),
        };
        assemble(
            index,
            compute.map(|(_, capability)| capability),
            management.map(|(_, identity)| identity),
        )
    }

    /// Describe every GPU
    ///
    /// The device count comes from the CUDA driver, or from NVML when the
    /// driver is unavailable.
    pub fn devices(&self) -> Result<Vec<Device>> {
        let count = match self.runtime.device_count() {
            Ok(count) => count,
            Err(compute_err) => self
                .manager
                .device_count()
                .map_err(|_| AppError::from(compute_err))?,
        };
        (0..count).map(|index| self.device(index)).collect()
    }

    /// Whether the GPU at `index` can access memory of `peer`
    pub fn can_access_peer(&self, index: u32, peer: u32) -> Result<bool> {
        Ok(self.runtime.can_access_peer(index, peer)?)
    }

    /// Take a status snapshot of the GPU at `index`
    pub fn status(&self, index: u32) -> Result<StatusSnapshot> {
        let device = self.manager.device_by_index(index)?;
        Ok(self.status.snapshot(&self.manager, &device)?)
    }

    /// Link category between two GPUs
    pub fn p2p_link(&self, index: u32, peer: u32) -> Result<P2PLinkType> {
        let device = self.manager.device_by_index(index)?;
        let peer = self.manager.device_by_index(peer)?;
        Ok(services::classify_link(&device, &peer)?)
    }

    /// Links from the GPU at `index` to every other GPU
    pub fn topology(&self, index: u32) -> Result<Vec<P2PLink>> {
        Ok(services::device_topology(&self.manager, index)?)
    }

    /// PCI bus id of the GPU at `index`
    pub fn bus_id(&self, index: u32) -> Result<String> {
        Ok(self.manager.device_by_index(index)?.pci_bus_id()?)
    }

    /// NVML index of the GPU at a PCI bus id
    pub fn index_of_bus_id(&self, bus_id: &str) -> Result<u32> {
        Ok(self.manager.device_by_pci_bus_id(bus_id)?.index())
    }

    /// Device node path of the GPU at `index`
    pub fn device_path(&self, index: u32) -> Result<String> {
        Ok(services::managed_device_path(&self.manager, index)?)
    }
}

fn assemble(
    index: u32,
    compute: std::result::Result<ComputeCapability, ServiceError>,
    management: std::result::Result<ManagementIdentity, ServiceError>,
) -> Result<Device> {
    match (compute, management) {
        (Ok(compute), Ok(management)) => Ok(Device::new(index, compute, management)),
        (Ok(compute), Err(e)) => {
            log::warn!("GPU {}: no management identity: {}", index, e);
            Ok(Device::compute_only(index, compute))
        }
        (Err(e), Ok(management)) => {
            log::warn!("GPU {}: no compute capability: {}", index, e);
            Ok(Device::management_only(index, management))
        }
        (Err(e), Err(_)) => Err(e.into()),
    }
}
