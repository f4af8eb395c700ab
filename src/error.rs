//! Unified error types for gpuprobe
//!
//! Backend errors (CUDA driver, NVML) stay close to the vendor's own
//! wording. They are flattened into [`AppError`] at the public surface.

use thiserror::Error;

/// Top-level error type returned by every public operation
#[derive(Error, Debug)]
pub enum AppError {
    /// The CUDA driver library could not be loaded on this system
    #[error("CUDA is unavailable on this system (driver library not found)")]
    ComputeUnavailable,

    /// The NVML library could not be loaded on this system
    #[error("NVML is unavailable on this system (management library not found)")]
    ManagementUnavailable,

    /// A vendor call failed; carries the vendor's error text verbatim
    #[error("{0}")]
    VendorCallFailed(String),

    /// Compute capability not present in the capability tables
    #[error("Unsupported CUDA architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Topology level outside the known link categories
    #[error("Unsupported P2P link type: {0}")]
    UnsupportedLinkType(u32),

    /// No device matched the requested selector
    #[error("GPU not found: {0}")]
    DeviceNotFound(String),

    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error (output, helper processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the CUDA driver API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CudaError {
    /// Driver library is not loadable
    #[error("CUDA driver library not available")]
    Unavailable,

    /// A driver call returned a non-success code
    #[error("{0}")]
    Call(String),
}

/// Errors from NVML operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NvmlError {
    /// NVML library is not loadable
    #[error("NVML library not available")]
    Unavailable,

    /// The query is not supported by this GPU
    #[error("{0}")]
    NotSupported(String),

    /// The running driver does not export this function
    #[error("{0}")]
    FunctionNotFound(String),

    /// Any other NVML failure
    #[error("{0}")]
    Call(String),
}

impl NvmlError {
    /// Whether the error is the "not supported on this hardware" outcome
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

/// Errors from classifying raw vendor codes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Compute capability not present in the capability tables
    #[error("Unsupported CUDA architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Topology level outside the known link categories
    #[error("Unsupported P2P link type: {0}")]
    UnsupportedLinkType(u32),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors from the translator services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// CUDA driver call failed
    #[error(transparent)]
    Cuda(#[from] CudaError),

    /// NVML call failed
    #[error(transparent)]
    Nvml(#[from] NvmlError),

    /// Raw value could not be classified
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<CudaError> for AppError {
    fn from(err: CudaError) -> Self {
        match err {
            CudaError::Unavailable => AppError::ComputeUnavailable,
            CudaError::Call(msg) => AppError::VendorCallFailed(msg),
        }
    }
}

impl From<NvmlError> for AppError {
    fn from(err: NvmlError) -> Self {
        match err {
            NvmlError::Unavailable => AppError::ManagementUnavailable,
            NvmlError::NotSupported(msg)
            | NvmlError::FunctionNotFound(msg)
            | NvmlError::Call(msg) => AppError::VendorCallFailed(msg),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::UnsupportedArchitecture(arch) => AppError::UnsupportedArchitecture(arch),
            DomainError::UnsupportedLinkType(level) => AppError::UnsupportedLinkType(level),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Cuda(e) => e.into(),
            ServiceError::Nvml(e) => e.into(),
            ServiceError::Domain(e) => e.into(),
        }
    }
}

impl AppError {
    /// Whether this is one of the two platform-unavailable failures
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ComputeUnavailable | Self::ManagementUnavailable)
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
