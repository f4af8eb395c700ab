//! Service layer
//!
//! The translators turning raw CUDA driver and NVML values into domain
//! records. Each is written against the backend traits only.

pub mod compute;
pub mod identity;
pub mod status;
pub mod topology;

pub use compute::{describe_compute_device, describe_compute_device_by_bus_id};
pub use identity::{describe_managed_device, describe_managed_device_at, managed_device_path};
pub use status::StatusService;
pub use topology::{classify_link, device_topology};
