//! CUDA driver abstraction layer
//!
//! Provides a trait-based view of the CUDA driver for testability.

pub mod driver;
pub mod traits;

pub use driver::CudaDriver;
pub use traits::{format_driver_version, ComputeRuntime};
