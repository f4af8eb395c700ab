//! Management-telemetry translator
//!
//! Builds a [`ManagementIdentity`] from a fixed sequence of NVML queries.
//! The first failing query aborts the whole record.

use crate::domain::identity::{device_path, pcie_bandwidth_gbps};
use crate::domain::{ClockInfo, ManagementIdentity, PciInfo, PcieLink};
use crate::error::ServiceError;
use crate::nvml::{ClockType, GpuDevice, GpuManager};

const MIB: u64 = 1024 * 1024;

/// Describe a managed device
pub fn describe_managed_device<D: GpuDevice>(device: &D) -> Result<ManagementIdentity, ServiceError> {
    let model = device.name()?;
    let uuid = device.uuid()?;
    let bus_id = device.pci_bus_id()?;
    let path = device_path(device.minor_number()?);
    let bar1 = device.bar1_memory()?;
    let power_mw = device.power_limit()?;
    let core_clock = device.max_clock(ClockType::Sm)?;
    let memory_clock = device.max_clock(ClockType::Memory)?;
    let generation = device.max_pcie_link_gen()?;
    let width = device.max_pcie_link_width()?;

    let identity = ManagementIdentity {
        model,
        uuid,
        path,
        power_watts: power_mw / 1000,
        pci: PciInfo {
            bus_id,
            bar1_mib: bar1.total / MIB,
            bandwidth_gbps: pcie_bandwidth_gbps(generation, width),
            link: PcieLink::new(generation, width),
        },
        clocks: ClockInfo {
            core: core_clock,
            memory: memory_clock,
        },
    };
    log::debug!("NVML device {}: {}", device.index(), identity);

    Ok(identity)
}

/// Describe the managed device at `index`
pub fn describe_managed_device_at<M: GpuManager>(
    manager: &M,
    index: u32,
) -> Result<ManagementIdentity, ServiceError> {
    let device = manager.device_by_index(index)?;
    describe_managed_device(&device)
}

/// Device node path of the managed device at `index`
pub fn managed_device_path<M: GpuManager>(manager: &M, index: u32) -> Result<String, ServiceError> {
    let device = manager.device_by_index(index)?;
    Ok(device_path(device.minor_number()?))
}
