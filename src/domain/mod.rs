//! Domain models for gpuprobe
//!
//! Plain records built by the translators from raw vendor values.
//! Every record is immutable once built and owned by the caller.

pub mod arch;
pub mod compute;
pub mod device;
pub mod identity;
pub mod status;
pub mod topology;

pub use arch::{ArchSpec, ComputeVersion};
pub use compute::{ComputeCapability, MemoryGeometry, RawDeviceProperties};
pub use device::Device;
pub use identity::{ClockInfo, ManagementIdentity, PciInfo, PcieLink};
pub use status::{
    EccErrors, MemoryStatus, PciStatus, PciThroughput, ProcessInfo, StatusSnapshot,
    UtilizationInfo,
};
pub use topology::{P2PLink, P2PLinkType};
