//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::cuda::driver::DEFAULT_LIBRARIES;
use crate::error::ConfigError;
use crate::services::status::{DEFAULT_MAX_PROCESSES, DEFAULT_PROCESS_NAME_LENGTH};
use crate::services::StatusService;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Default GPU selection
    pub gpu: GpuConfig,
    /// Status snapshot settings
    pub status: StatusConfig,
    /// Environment preparation before the libraries are loaded
    pub environment: EnvironmentConfig,
    /// Vendor library locations
    pub library: LibraryConfig,
}

impl Config {
    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status.max_processes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "status.max_processes".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.status.process_name_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "status.process_name_length".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.library.cuda.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "library.cuda".to_string(),
                message: "at least one library name is required".to_string(),
            });
        }
        if self.gpu.index.is_some() && self.gpu.bus_id.is_some() {
            return Err(ConfigError::InvalidValue {
                key: "gpu".to_string(),
                message: "index and bus_id are mutually exclusive".to_string(),
            });
        }
        Ok(())
    }
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,
}

/// GPU selection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GpuConfig {
    /// Target GPU by index
    pub index: Option<u32>,
    /// Target GPU by PCI bus id
    pub bus_id: Option<String>,
}

/// Status snapshot configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Process slots read per snapshot
    pub max_processes: usize,
    /// Maximum process name length in bytes
    pub process_name_length: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            max_processes: DEFAULT_MAX_PROCESSES,
            process_name_length: DEFAULT_PROCESS_NAME_LENGTH,
        }
    }
}

impl StatusConfig {
    /// Build the status service for these settings
    pub fn to_service(&self) -> StatusService {
        StatusService::new(self.max_processes, self.process_name_length)
    }
}

/// Environment preparation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Make sure the nvidia-uvm module is loaded
    pub load_uvm: bool,
    /// Device node whose presence means the module is loaded
    pub uvm_device: PathBuf,
    /// Helper that loads the module
    pub modprobe: String,
    /// Helper arguments
    pub modprobe_args: Vec<String>,
    /// Variables to set
    pub set: BTreeMap<String, String>,
    /// Variables to remove
    pub unset: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            load_uvm: true,
            uvm_device: PathBuf::from("/dev/nvidia-uvm"),
            modprobe: "nvidia-modprobe".to_string(),
            modprobe_args: vec!["-u".to_string(), "-c=0".to_string()],
            set: BTreeMap::from([("CUDA_DEVICE_ORDER".to_string(), "PCI_BUS_ID".to_string())]),
            unset: vec!["CUDA_VISIBLE_DEVICES".to_string()],
        }
    }
}

/// Vendor library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// CUDA driver library names or paths, tried in order
    pub cuda: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            cuda: DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.status.max_processes, 32);
        assert_eq!(config.status.process_name_length, 64);
        assert!(config.environment.load_uvm);
        assert_eq!(
            config.environment.set.get("CUDA_DEVICE_ORDER").map(String::as_str),
            Some("PCI_BUS_ID")
        );
        assert_eq!(config.environment.unset, vec!["CUDA_VISIBLE_DEVICES"]);
        assert_eq!(config.library.cuda[0], "libcuda.so.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [status]
            max_processes = 8

            [environment]
            load_uvm = false
            "#,
        )
        .unwrap();

        assert_eq!(config.status.max_processes, 8);
        assert_eq!(config.status.process_name_length, 64);
        assert!(!config.environment.load_uvm);
        assert_eq!(config.environment.modprobe, "nvidia-modprobe");
    }

    #[test]
    fn test_validate_rejects_zero_processes() {
        let mut config = Config::default();
        config.status.max_processes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "status.max_processes"
        ));
    }

    #[test]
    fn test_validate_rejects_both_selectors() {
        let mut config = Config::default();
        config.gpu.index = Some(0);
        config.gpu.bus_id = Some("00000000:01:00.0".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_status_service_from_config() {
        let config = StatusConfig {
            max_processes: 4,
            process_name_length: 16,
        };
        assert_eq!(config.to_service().max_processes(), 4);
    }
}
