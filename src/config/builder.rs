//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;

use std::path::Path;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file
    ///
    /// An explicit path must load. Without one the default locations are
    /// searched and defaults are kept when none exists.
    pub fn with_file(mut self, path: Option<&Path>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default(),
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Override with CLI verbose flag
    pub fn with_verbose(mut self, verbose: Option<bool>) -> Self {
        if let Some(v) = verbose {
            self.config.general.verbose = v;
        }
        self
    }

    /// Override with CLI GPU index
    ///
    /// Replaces any bus id selection from the file.
    pub fn with_gpu_index(mut self, index: Option<u32>) -> Self {
        if let Some(i) = index {
            self.config.gpu.index = Some(i);
            self.config.gpu.bus_id = None;
        }
        self
    }

    /// Override with CLI PCI bus id
    ///
    /// Replaces any index selection from the file.
    pub fn with_bus_id(mut self, bus_id: Option<String>) -> Self {
        if let Some(b) = bus_id {
            self.config.gpu.bus_id = Some(b);
            self.config.gpu.index = None;
        }
        self
    }

    /// Override the number of process slots per snapshot
    pub fn with_max_processes(mut self, max: Option<usize>) -> Self {
        if let Some(m) = max {
            self.config.status.max_processes = m;
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert!(!config.general.verbose);
        assert!(config.gpu.index.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_verbose(Some(true))
            .with_gpu_index(Some(1))
            .with_max_processes(Some(8))
            .build()
            .unwrap();

        assert!(config.general.verbose);
        assert_eq!(config.gpu.index, Some(1));
        assert_eq!(config.status.max_processes, 8);
    }

    #[test]
    fn test_cli_selector_replaces_file_selector() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gpu]\nindex = 2").unwrap();

        let config = ConfigBuilder::new()
            .with_file(Some(file.path()))
            .unwrap()
            .with_bus_id(Some("00000000:81:00.0".to_string()))
            .build()
            .unwrap();

        assert_eq!(config.gpu.index, None);
        assert_eq!(config.gpu.bus_id.as_deref(), Some("00000000:81:00.0"));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let result = ConfigBuilder::new().with_file(Some(Path::new("/nonexistent/gpuprobe.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_override_fails_build() {
        let result = ConfigBuilder::new().with_max_processes(Some(0)).build();
        assert!(result.is_err());
    }
}
