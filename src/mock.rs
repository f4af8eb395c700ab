//! Mock implementations for testing
//!
//! Provides a mock CUDA runtime and a mock NVML manager/device for unit
//! testing without real hardware. Every query can be made to fail, and the
//! mock device records the order in which queries were issued.

use crate::cuda::ComputeRuntime;
use crate::domain::RawDeviceProperties;
use crate::error::{CudaError, NvmlError};
use crate::nvml::{
    Bar1Memory, ClockType, EccLocation, GpuDevice, GpuManager, MemoryUsage, PcieDirection,
    UtilizationRates,
};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A per-device NVML query, used to inject failures and record calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Name,
    Uuid,
    PciBusId,
    MinorNumber,
    Bar1Memory,
    PowerLimit,
    MaxClock(ClockType),
    MaxPcieLinkGen,
    MaxPcieLinkWidth,
    PowerUsage,
    Temperature,
    Utilization,
    EncoderUtilization,
    DecoderUtilization,
    MemoryInfo,
    Clock(ClockType),
    EccErrorCount(EccLocation),
    PcieThroughput(PcieDirection),
    RunningProcesses,
    TopologyCommonAncestor,
}

/// Mock GPU device for testing
#[derive(Debug, Clone)]
pub struct MockDevice {
    index: u32,
    name: String,
    uuid: String,
    bus_id: String,
    minor: u32,
    bar1: Bar1Memory,
    power_limit_mw: u32,
    max_clocks: (u32, u32),
    pcie_max: (u32, u32),
    power_usage_mw: u32,
    temperature: u32,
    utilization: UtilizationRates,
    encoder: u32,
    decoder: u32,
    memory: MemoryUsage,
    clocks: (u32, u32),
    ecc: [u64; 3],
    pcie_throughput: (u32, u32),
    processes: Vec<u32>,
    topology: HashMap<u32, u32>,
    failures: HashMap<Query, NvmlError>,
    calls: Arc<Mutex<Vec<Query>>>,
}

impl MockDevice {
    /// Create a new mock device with default values
    pub fn new(index: u32) -> Self {
        Self {
            index,
            name: format!("Mock GPU {}", index),
            uuid: format!("GPU-MOCK-{:04}", index),
            bus_id: format!("00000000:{:02X}:00.0", index + 1),
            minor: index,
            bar1: Bar1Memory {
                total: 256 * 1024 * 1024,
                used: 5 * 1024 * 1024,
            },
            power_limit_mw: 250_000,
            max_clocks: (1911, 5505),
            pcie_max: (3, 16),
            power_usage_mw: 75_500,
            temperature: 45,
            utilization: UtilizationRates { gpu: 30, memory: 10 },
            encoder: 0,
            decoder: 0,
            memory: MemoryUsage {
                total: 8192 * 1024 * 1024,
                used: 1024 * 1024 * 1024,
                free: 7168 * 1024 * 1024,
            },
            clocks: (1506, 5005),
            ecc: [0; 3],
            pcie_throughput: (1000, 2000),
            processes: Vec::new(),
            topology: HashMap::new(),
            failures: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Builder: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set PCI bus id
    pub fn with_bus_id(mut self, bus_id: impl Into<String>) -> Self {
        self.bus_id = bus_id.into();
        self
    }

    /// Builder: set device node minor number
    pub fn with_minor(mut self, minor: u32) -> Self {
        self.minor = minor;
        self
    }

    /// Builder: set power limit and draw in milliwatts
    pub fn with_power(mut self, limit_mw: u32, usage_mw: u32) -> Self {
        self.power_limit_mw = limit_mw;
        self.power_usage_mw = usage_mw;
        self
    }

    /// Builder: set BAR1 total and used bytes
    pub fn with_bar1(mut self, total: u64, used: u64) -> Self {
        self.bar1 = Bar1Memory { total, used };
        self
    }

    /// Builder: set maximum PCIe generation and width
    pub fn with_pcie_link(mut self, generation: u32, width: u32) -> Self {
        self.pcie_max = (generation, width);
        self
    }

    /// Builder: set PCIe RX/TX throughput in KB/s
    pub fn with_pcie_throughput(mut self, rx: u32, tx: u32) -> Self {
        self.pcie_throughput = (rx, tx);
        self
    }

    /// Builder: set ECC counters for L1, L2 and device memory
    pub fn with_ecc_errors(mut self, l1: u64, l2: u64, global: u64) -> Self {
        self.ecc = [l1, l2, global];
        self
    }

    /// Builder: set memory usage in bytes
    pub fn with_memory(mut self, total: u64, used: u64) -> Self {
        self.memory = MemoryUsage {
            total,
            used,
            free: total.saturating_sub(used),
        };
        self
    }

    /// Builder: set running compute process PIDs
    pub fn with_processes(mut self, pids: Vec<u32>) -> Self {
        self.processes = pids;
        self
    }

    /// Builder: set the raw topology level towards a peer index
    pub fn with_topology(mut self, peer: u32, level: u32) -> Self {
        self.topology.insert(peer, level);
        self
    }

    /// Builder: make a query fail with the given error
    pub fn with_failure(mut self, query: Query, error: NvmlError) -> Self {
        self.failures.insert(query, error);
        self
    }

    /// Queries issued so far, in order
    pub fn calls(&self) -> Vec<Query> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, query: Query) -> Result<(), NvmlError> {
        self.calls.lock().unwrap().push(query);
        match self.failures.get(&query) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn pick(clock: ClockType, values: (u32, u32)) -> u32 {
    match clock {
        ClockType::Sm => values.0,
        ClockType::Memory => values.1,
    }
}

impl GpuDevice for MockDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn name(&self) -> Result<String, NvmlError> {
        self.record(Query::Name)?;
        Ok(self.name.clone())
    }

    fn uuid(&self) -> Result<String, NvmlError> {
        self.record(Query::Uuid)?;
        Ok(self.uuid.clone())
    }

    fn pci_bus_id(&self) -> Result<String, NvmlError> {
        self.record(Query::PciBusId)?;
        Ok(self.bus_id.clone())
    }

    fn minor_number(&self) -> Result<u32, NvmlError> {
        self.record(Query::MinorNumber)?;
        Ok(self.minor)
    }

    fn bar1_memory(&self) -> Result<Bar1Memory, NvmlError> {
        self.record(Query::Bar1Memory)?;
        Ok(self.bar1)
    }

    fn power_limit(&self) -> Result<u32, NvmlError> {
        self.record(Query::PowerLimit)?;
        Ok(self.power_limit_mw)
    }

    fn max_clock(&self, clock: ClockType) -> Result<u32, NvmlError> {
        self.record(Query::MaxClock(clock))?;
        Ok(pick(clock, self.max_clocks))
    }

    fn max_pcie_link_gen(&self) -> Result<u32, NvmlError> {
        self.record(Query::MaxPcieLinkGen)?;
        Ok(self.pcie_max.0)
    }

    fn max_pcie_link_width(&self) -> Result<u32, NvmlError> {
        self.record(Query::MaxPcieLinkWidth)?;
        Ok(self.pcie_max.1)
    }

    fn power_usage(&self) -> Result<u32, NvmlError> {
        self.record(Query::PowerUsage)?;
        Ok(self.power_usage_mw)
    }

    fn temperature(&self) -> Result<u32, NvmlError> {
        self.record(Query::Temperature)?;
        Ok(self.temperature)
    }

    fn utilization(&self) -> Result<UtilizationRates, NvmlError> {
        self.record(Query::Utilization)?;
        Ok(self.utilization)
    }

    fn encoder_utilization(&self) -> Result<u32, NvmlError> {
        self.record(Query::EncoderUtilization)?;
        Ok(self.encoder)
    }

    fn decoder_utilization(&self) -> Result<u32, NvmlError> {
        self.record(Query::DecoderUtilization)?;
        Ok(self.decoder)
    }

    fn memory_info(&self) -> Result<MemoryUsage, NvmlError> {
        self.record(Query::MemoryInfo)?;
        Ok(self.memory)
    }

    fn clock(&self, clock: ClockType) -> Result<u32, NvmlError> {
        self.record(Query::Clock(clock))?;
        Ok(pick(clock, self.clocks))
    }

    fn ecc_error_count(&self, location: EccLocation) -> Result<u64, NvmlError> {
        self.record(Query::EccErrorCount(location))?;
        Ok(match location {
            EccLocation::L1Cache => self.ecc[0],
            EccLocation::L2Cache => self.ecc[1],
            EccLocation::DeviceMemory => self.ecc[2],
        })
    }

    fn pcie_throughput(&self, direction: PcieDirection) -> Result<u32, NvmlError> {
        self.record(Query::PcieThroughput(direction))?;
        Ok(match direction {
            PcieDirection::Rx => self.pcie_throughput.0,
            PcieDirection::Tx => self.pcie_throughput.1,
        })
    }

    fn running_compute_processes(&self, capacity: usize) -> Result<Vec<u32>, NvmlError> {
        self.record(Query::RunningProcesses)?;
        Ok(self.processes.iter().copied().take(capacity).collect())
    }

    fn topology_common_ancestor(&self, other: &Self) -> Result<u32, NvmlError> {
        self.record(Query::TopologyCommonAncestor)?;
        self.topology
            .get(&other.index)
            .copied()
            .ok_or_else(|| NvmlError::Call(format!("no topology to GPU {}", other.index)))
    }
}

/// Mock GPU manager for testing
#[derive(Debug, Default)]
pub struct MockManager {
    devices: Vec<MockDevice>,
    driver_version: String,
    process_names: HashMap<u32, String>,
    count_failure: Option<NvmlError>,
}

impl MockManager {
    /// Create a mock manager with `device_count` default devices
    pub fn new(device_count: u32) -> Self {
        Self::with_devices((0..device_count).map(MockDevice::new).collect())
    }

    /// Create a mock manager with specific devices
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            driver_version: "535.104.05".to_string(),
            process_names: HashMap::new(),
            count_failure: None,
        }
    }

    /// Builder: register a process name
    pub fn with_process_name(mut self, pid: u32, name: impl Into<String>) -> Self {
        self.process_names.insert(pid, name.into());
        self
    }

    /// Builder: make device_count fail
    pub fn with_count_failure(mut self, error: NvmlError) -> Self {
        self.count_failure = Some(error);
        self
    }
}

impl GpuManager for MockManager {
    type Device<'a> = MockDevice;

    fn device_count(&self) -> Result<u32, NvmlError> {
        match &self.count_failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.devices.len() as u32),
        }
    }

    fn driver_version(&self) -> Result<String, NvmlError> {
        Ok(self.driver_version.clone())
    }

    fn device_by_index(&self, index: u32) -> Result<MockDevice, NvmlError> {
        self.devices
            .iter()
            .find(|d| d.index == index)
            .cloned()
            .ok_or_else(|| NvmlError::Call("Invalid Argument".to_string()))
    }

    fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<MockDevice, NvmlError> {
        self.devices
            .iter()
            .find(|d| d.bus_id.eq_ignore_ascii_case(bus_id))
            .cloned()
            .ok_or_else(|| NvmlError::Call("Not Found".to_string()))
    }

    fn process_name(&self, pid: u32, max_length: usize) -> Result<String, NvmlError> {
        let name = self
            .process_names
            .get(&pid)
            .ok_or_else(|| NvmlError::Call("Not Found".to_string()))?;
        Ok(name.chars().take(max_length).collect())
    }
}

/// Mock CUDA runtime for testing
#[derive(Debug)]
pub struct MockRuntime {
    devices: Vec<RawDeviceProperties>,
    bus_ids: Vec<String>,
    driver_version: i32,
    peer_access: HashSet<(u32, u32)>,
    property_failures: HashSet<u32>,
    reset_failure: Option<CudaError>,
    peer_failure: Option<CudaError>,
    resets: Mutex<Vec<u32>>,
}

impl MockRuntime {
    /// Create a runtime exposing the given devices
    ///
    /// Bus ids default to those of [`MockDevice::new`] at the same index.
    pub fn with_devices(devices: Vec<RawDeviceProperties>) -> Self {
        let bus_ids = (0..devices.len() as u32)
            .map(|i| format!("00000000:{:02X}:00.0", i + 1))
            .collect();
        Self {
            devices,
            bus_ids,
            driver_version: 12040,
            peer_access: HashSet::new(),
            property_failures: HashSet::new(),
            reset_failure: None,
            peer_failure: None,
            resets: Mutex::new(Vec::new()),
        }
    }

    /// Builder: allow `index` to access `peer`
    pub fn with_peer_access(mut self, index: u32, peer: u32) -> Self {
        self.peer_access.insert((index, peer));
        self
    }

    /// Builder: make property reads fail for a device
    pub fn with_property_failure(mut self, index: u32) -> Self {
        self.property_failures.insert(index);
        self
    }

    /// Builder: make device resets fail
    pub fn with_reset_failure(mut self, error: CudaError) -> Self {
        self.reset_failure = Some(error);
        self
    }

    /// Builder: make peer access checks fail
    pub fn with_peer_failure(mut self, error: CudaError) -> Self {
        self.peer_failure = Some(error);
        self
    }

    /// Devices reset so far, in order
    pub fn resets(&self) -> Vec<u32> {
        self.resets.lock().unwrap().clone()
    }

    fn check_index(&self, index: u32) -> Result<(), CudaError> {
        if (index as usize) < self.devices.len() {
            Ok(())
        } else {
            Err(CudaError::Call("invalid device ordinal".to_string()))
        }
    }
}

impl ComputeRuntime for MockRuntime {
    fn device_count(&self) -> Result<u32, CudaError> {
        Ok(self.devices.len() as u32)
    }

    fn driver_version(&self) -> Result<i32, CudaError> {
        Ok(self.driver_version)
    }

    fn device_properties(&self, index: u32) -> Result<RawDeviceProperties, CudaError> {
        self.check_index(index)?;
        if self.property_failures.contains(&index) {
            return Err(CudaError::Call("unspecified launch failure".to_string()));
        }
        Ok(self.devices[index as usize])
    }

    fn device_by_pci_bus_id(&self, bus_id: &str) -> Result<u32, CudaError> {
        self.bus_ids
            .iter()
            .position(|b| b.eq_ignore_ascii_case(bus_id))
            .map(|i| i as u32)
            .ok_or_else(|| CudaError::Call("invalid device ordinal".to_string()))
    }

    fn can_access_peer(&self, index: u32, peer: u32) -> Result<bool, CudaError> {
        self.check_index(index)?;
        self.check_index(peer)?;
        if let Some(err) = &self.peer_failure {
            return Err(err.clone());
        }
        Ok(self.peer_access.contains(&(index, peer)))
    }

    fn reset_device(&self, index: u32) -> Result<(), CudaError> {
        self.check_index(index)?;
        self.resets.lock().unwrap().push(index);
        match &self.reset_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Properties of a Pascal sm_61 board (GTX 1080 class)
pub fn pascal_properties() -> RawDeviceProperties {
    RawDeviceProperties {
        major: 6,
        minor: 1,
        multiprocessor_count: 20,
        total_global_mem: 8192 * 1024 * 1024,
        shared_mem_per_multiprocessor: 96 * 1024,
        total_const_mem: 64 * 1024,
        l2_cache_size: 2048 * 1024,
        memory_clock_rate: 5_005_000,
        memory_bus_width: 256,
        ecc_enabled: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_records_calls() {
        let device = MockDevice::new(0);
        device.name().unwrap();
        device.power_limit().unwrap();
        assert_eq!(device.calls(), vec![Query::Name, Query::PowerLimit]);
    }

    #[test]
    fn test_mock_device_failure_injection() {
        let device = MockDevice::new(0)
            .with_failure(Query::Temperature, NvmlError::Call("Unknown Error".into()));
        assert!(device.temperature().is_err());
        assert!(device.name().is_ok());
    }

    #[test]
    fn test_mock_device_process_capacity() {
        let device = MockDevice::new(0).with_processes((1..=40).collect());
        assert_eq!(device.running_compute_processes(32).unwrap().len(), 32);
    }

    #[test]
    fn test_mock_manager_device_by_bus_id() {
        let manager = MockManager::new(2);
        let device = manager.device_by_pci_bus_id("00000000:02:00.0").unwrap();
        assert_eq!(device.index(), 1);
        assert!(manager.device_by_pci_bus_id("0000:ff:00.0").is_err());
    }

    #[test]
    fn test_mock_manager_process_name_truncated() {
        let manager = MockManager::new(1).with_process_name(7, "python3");
        assert_eq!(manager.process_name(7, 3).unwrap(), "pyt");
    }

    #[test]
    fn test_mock_runtime_records_resets() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties()]);
        runtime.reset_device(0).unwrap();
        assert_eq!(runtime.resets(), vec![0]);
        assert!(runtime.reset_device(1).is_err());
    }

    #[test]
    fn test_mock_runtime_bus_id_matches_mock_device() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties(); 2]);
        let device = MockDevice::new(1);
        let bus_id = device.pci_bus_id().unwrap();
        assert_eq!(runtime.device_by_pci_bus_id(&bus_id).unwrap(), 1);
    }
}
