//! gpuprobe - CUDA and NVML GPU query library
//!
//! This library normalizes what the CUDA driver and NVIDIA's NVML report
//! about the installed GPUs: compute capabilities, management identity,
//! peer-to-peer topology and live status.
//!
//! # Modules
//!
//! - [`bootstrap`]: Environment preparation before the libraries load
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`cuda`]: CUDA driver abstraction layer
//! - [`domain`]: Domain models and lookup tables
//! - [`error`]: Error types
//! - [`nvml`]: NVML abstraction layer
//! - [`platform`]: Library availability and the query facade
//! - [`services`]: Translators, classifier and snapshotter

pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod config;
pub mod cuda;
pub mod domain;
pub mod error;
pub mod nvml;
pub mod platform;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
pub use platform::{probe, GpuInspector, SystemInspector};
