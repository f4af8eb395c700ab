//! Status snapshotter
//!
//! Takes a fresh [`StatusSnapshot`] of a device. ECC counters and PCIe
//! throughput are probed and left at zero when the board does not support
//! them; any other failure aborts the snapshot.

use crate::domain::{
    ClockInfo, EccErrors, MemoryStatus, PciStatus, PciThroughput, ProcessInfo, StatusSnapshot,
    UtilizationInfo,
};
use crate::error::{NvmlError, ServiceError};
use crate::nvml::{ClockType, EccLocation, GpuDevice, GpuManager, PcieDirection};

use chrono::Utc;

/// Default number of process slots read per snapshot
pub const DEFAULT_MAX_PROCESSES: usize = 32;

/// Default maximum process name length in bytes
pub const DEFAULT_PROCESS_NAME_LENGTH: usize = 64;

const MIB: u64 = 1024 * 1024;

/// Service taking status snapshots with a fixed process capacity
#[derive(Debug, Clone, Copy)]
pub struct StatusService {
    max_processes: usize,
    process_name_length: usize,
}

impl Default for StatusService {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROCESSES, DEFAULT_PROCESS_NAME_LENGTH)
    }
}

impl StatusService {
    /// Create a new status service
    pub fn new(max_processes: usize, process_name_length: usize) -> Self {
        Self {
            max_processes,
            process_name_length,
        }
    }

    /// Maximum number of processes reported per snapshot
    pub fn max_processes(&self) -> usize {
        self.max_processes
    }

    /// Take a snapshot of `device`
    ///
    /// Process names are resolved through `manager`; one failed name lookup
    /// fails the whole snapshot.
    pub fn snapshot<M: GpuManager>(
        &self,
        manager: &M,
        device: &M::Device<'_>,
    ) -> Result<StatusSnapshot, ServiceError> {
        let mut status = StatusSnapshot::at(Utc::now());

        status.power_watts = device.power_usage()? / 1000;
        status.temperature = device.temperature()?;

        let rates = device.utilization()?;
        status.utilization = UtilizationInfo {
            gpu: rates.gpu,
            memory: rates.memory,
            encoder: device.encoder_utilization()?,
            decoder: device.decoder_utilization()?,
        };

        let memory = device.memory_info()?;
        status.clocks = ClockInfo {
            core: device.clock(ClockType::Sm)?,
            memory: device.clock(ClockType::Memory)?,
        };
        let bar1 = device.bar1_memory()?;
        let pids = device.running_compute_processes(self.max_processes)?;

        status.memory = MemoryStatus {
            used: memory.used,
            free: memory.free,
            total: memory.total,
            ecc_errors: ecc_errors(device)?,
        };
        status.pci = PciStatus {
            bar1_used_mib: bar1.used / MIB,
            throughput: pcie_throughput(device)?,
        };

        status.processes = pids
            .into_iter()
            .map(|pid| {
                let name = manager.process_name(pid, self.process_name_length)?;
                Ok(ProcessInfo { pid, name })
            })
            .collect::<Result<_, NvmlError>>()?;

        log::debug!(
            "GPU {}: {} W, {} C, {} processes",
            device.index(),
            status.power_watts,
            status.temperature,
            status.processes.len()
        );

        Ok(status)
    }
}

/// Uncorrected volatile ECC counters, zero when the board has none
fn ecc_errors<D: GpuDevice>(device: &D) -> Result<EccErrors, NvmlError> {
    let l1_cache = match device.ecc_error_count(EccLocation::L1Cache) {
        Ok(count) => count,
        Err(e) if e.is_not_supported() => {
            log::debug!("GPU {}: ECC counters not supported", device.index());
            return Ok(EccErrors::default());
        }
        Err(e) => return Err(e),
    };

    Ok(EccErrors {
        l1_cache,
        l2_cache: device.ecc_error_count(EccLocation::L2Cache)?,
        global: device.ecc_error_count(EccLocation::DeviceMemory)?,
    })
}

/// PCIe throughput, zero when the board does not report it
fn pcie_throughput<D: GpuDevice>(device: &D) -> Result<PciThroughput, NvmlError> {
    let rx = match device.pcie_throughput(PcieDirection::Rx) {
        Ok(rx) => rx,
        Err(e) if e.is_not_supported() => {
            log::debug!("GPU {}: PCIe throughput not supported", device.index());
            return Ok(PciThroughput::default());
        }
        Err(e) => return Err(e),
    };

    Ok(PciThroughput {
        rx,
        tx: device.pcie_throughput(PcieDirection::Tx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockManager, Query};

    fn not_supported() -> NvmlError {
        NvmlError::NotSupported("Not Supported".into())
    }

    #[test]
    fn test_snapshot_values() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0)
            .with_power(250_000, 75_500)
            .with_memory(8192 * MIB, 1024 * MIB)
            .with_bar1(256 * MIB, 5 * MIB)
            .with_ecc_errors(1, 2, 3)
            .with_pcie_throughput(1000, 2000)
            .with_processes(vec![4242])])
        .with_process_name(4242, "python3");
        let device = manager.device_by_index(0).unwrap();

        let status = StatusService::default().snapshot(&manager, &device).unwrap();
        assert_eq!(status.power_watts, 75);
        assert_eq!(status.temperature, 45);
        assert_eq!(status.utilization.gpu, 30);
        assert_eq!(status.memory.used, 1024 * MIB);
        assert_eq!(status.memory.free, 7168 * MIB);
        assert_eq!(status.memory.ecc_errors.total(), 6);
        assert_eq!(status.clocks, ClockInfo { core: 1506, memory: 5005 });
        assert_eq!(status.pci.bar1_used_mib, 5);
        assert_eq!(status.pci.throughput, PciThroughput { rx: 1000, tx: 2000 });
        assert_eq!(
            status.processes,
            vec![ProcessInfo {
                pid: 4242,
                name: "python3".into()
            }]
        );
    }

    #[test]
    fn test_ecc_not_supported_defaults_to_zero() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0)
            .with_ecc_errors(1, 2, 3)
            .with_failure(Query::EccErrorCount(EccLocation::L1Cache), not_supported())]);
        let device = manager.device_by_index(0).unwrap();

        let status = StatusService::default().snapshot(&manager, &device).unwrap();
        assert_eq!(status.memory.ecc_errors, EccErrors::default());
        assert!(!device
            .calls()
            .contains(&Query::EccErrorCount(EccLocation::L2Cache)));
    }

    #[test]
    fn test_ecc_other_failure_aborts() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0).with_failure(
            Query::EccErrorCount(EccLocation::L1Cache),
            NvmlError::Call("Unknown Error".into()),
        )]);
        let device = manager.device_by_index(0).unwrap();

        let err = StatusService::default()
            .snapshot(&manager, &device)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown Error");
    }

    #[test]
    fn test_ecc_later_location_not_supported_aborts() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0).with_failure(
            Query::EccErrorCount(EccLocation::L2Cache),
            not_supported(),
        )]);
        let device = manager.device_by_index(0).unwrap();
        assert!(StatusService::default().snapshot(&manager, &device).is_err());
    }

    #[test]
    fn test_pcie_throughput_not_supported_defaults_to_zero() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0)
            .with_failure(Query::PcieThroughput(PcieDirection::Rx), not_supported())]);
        let device = manager.device_by_index(0).unwrap();

        let status = StatusService::default().snapshot(&manager, &device).unwrap();
        assert_eq!(status.pci.throughput, PciThroughput::default());
    }

    #[test]
    fn test_pcie_throughput_failure_aborts() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0).with_failure(
            Query::PcieThroughput(PcieDirection::Tx),
            NvmlError::Call("GPU is lost".into()),
        )]);
        let device = manager.device_by_index(0).unwrap();
        assert!(StatusService::default().snapshot(&manager, &device).is_err());
    }

    #[test]
    fn test_required_query_failure_aborts() {
        let manager = MockManager::with_devices(vec![
            MockDevice::new(0).with_failure(Query::Temperature, not_supported())
        ]);
        let device = manager.device_by_index(0).unwrap();

        assert!(StatusService::default().snapshot(&manager, &device).is_err());
        assert!(!device.calls().contains(&Query::Utilization));
    }

    #[test]
    fn test_process_name_failure_aborts() {
        let manager =
            MockManager::with_devices(vec![MockDevice::new(0).with_processes(vec![10, 11])])
                .with_process_name(10, "trainer");
        let device = manager.device_by_index(0).unwrap();

        assert!(StatusService::default().snapshot(&manager, &device).is_err());
    }

    #[test]
    fn test_process_capacity() {
        let pids: Vec<u32> = (100..140).collect();
        let mut manager =
            MockManager::with_devices(vec![MockDevice::new(0).with_processes(pids.clone())]);
        for pid in &pids {
            manager = manager.with_process_name(*pid, format!("worker-{}", pid));
        }
        let device = manager.device_by_index(0).unwrap();

        let status = StatusService::new(4, 64).snapshot(&manager, &device).unwrap();
        assert_eq!(status.processes.len(), 4);
        assert_eq!(status.processes[3].pid, 103);

        let status = StatusService::default().snapshot(&manager, &device).unwrap();
        assert_eq!(status.processes.len(), DEFAULT_MAX_PROCESSES);
    }

    #[test]
    fn test_process_name_length() {
        let manager = MockManager::with_devices(vec![MockDevice::new(0).with_processes(vec![1])])
            .with_process_name(1, "a-very-long-process-name");
        let device = manager.device_by_index(0).unwrap();

        let status = StatusService::new(32, 6).snapshot(&manager, &device).unwrap();
        assert_eq!(status.processes[0].name, "a-very");
    }
}
