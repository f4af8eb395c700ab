//! Environment preparation
//!
//! Runs once before the vendor libraries are used: makes sure the UVM
//! kernel module is loaded, adjusts the CUDA environment variables, probes
//! both libraries and reports what it found. Everything is reported to the
//! sink the caller passes in; no process-wide logger is touched.

use crate::config::{Config, EnvironmentConfig};
use crate::error::AppError;
use crate::platform::{self, SystemInspector};

use log::{Level, Log, Record};
use std::collections::BTreeMap;
use std::fmt;

const TARGET: &str = "gpuprobe::bootstrap";

/// Outcome of the UVM module check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvmStatus {
    /// The device node already existed
    AlreadyLoaded,
    /// The helper was run and succeeded
    Loaded,
    /// Not applicable on this platform
    Skipped,
}

struct Reporter<'a> {
    sink: &'a dyn Log,
}

impl Reporter<'_> {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let record = Record::builder()
            .args(args)
            .level(level)
            .target(TARGET)
            .module_path_static(Some(module_path!()))
            .file_static(Some(file!()))
            .build();
        if self.sink.enabled(record.metadata()) {
            self.sink.log(&record);
        }
    }
}

/// Prepare the environment and probe the vendor libraries
pub fn bootstrap(config: &Config, sink: &dyn Log) -> SystemInspector {
    let reporter = Reporter { sink };
    let env = &config.environment;

    if env.load_uvm {
        match load_uvm(env) {
            Ok(UvmStatus::Loaded) => reporter.log(
                Level::Info,
                format_args!("Loaded UVM kernel module with {}", env.modprobe),
            ),
            Ok(status) => reporter.log(Level::Debug, format_args!("UVM module: {:?}", status)),
            Err(e) => reporter.log(
                Level::Warn,
                format_args!("Could not load UVM kernel module: {}", e),
            ),
        }
    }

    prepare_environment(env, &mut ProcessEnv, &reporter);

    let inspector = platform::probe(&config.library, config.status.to_service());
    match inspector.device_count() {
        Ok(count) => reporter.log(
            Level::Info,
            format_args!("NVML initialized, {} GPU(s) found", count),
        ),
        Err(e) => reporter.log(Level::Warn, format_args!("{}", e)),
    }
    match inspector.cuda_version() {
        Ok(version) => reporter.log(Level::Debug, format_args!("CUDA driver API {}", version)),
        Err(e) => reporter.log(Level::Warn, format_args!("{}", e)),
    }

    inspector
}

/// Make sure the UVM module is loaded
///
/// The module is considered loaded when its device node exists. Otherwise
/// the configured helper is run.
#[cfg(target_os = "linux")]
pub fn load_uvm(env: &EnvironmentConfig) -> Result<UvmStatus, AppError> {
    if env.uvm_device.exists() {
        return Ok(UvmStatus::AlreadyLoaded);
    }

    let status = std::process::Command::new(&env.modprobe)
        .args(&env.modprobe_args)
        .status()?;
    if !status.success() {
        return Err(AppError::Io(std::io::Error::other(format!(
            "{} exited with {}",
            env.modprobe, status
        ))));
    }

    Ok(UvmStatus::Loaded)
}

#[cfg(not(target_os = "linux"))]
pub fn load_uvm(_env: &EnvironmentConfig) -> Result<UvmStatus, AppError> {
    Ok(UvmStatus::Skipped)
}

/// Variable store the environment preparation writes to
pub trait EnvVars {
    fn is_set(&self, key: &str) -> bool;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// The environment of the running process
pub struct ProcessEnv;

impl EnvVars for ProcessEnv {
    fn is_set(&self, key: &str) -> bool {
        std::env::var_os(key).is_some()
    }

    fn set(&mut self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }

    fn remove(&mut self, key: &str) {
        std::env::remove_var(key);
    }
}

impl EnvVars for BTreeMap<String, String> {
    fn is_set(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        BTreeMap::remove(self, key);
    }
}

fn prepare_environment(env: &EnvironmentConfig, vars: &mut dyn EnvVars, reporter: &Reporter<'_>) {
    for (key, value) in &env.set {
        vars.set(key, value);
        reporter.log(Level::Debug, format_args!("Set {}={}", key, value));
    }
    for key in &env.unset {
        if vars.is_set(key) {
            vars.remove(key);
            reporter.log(Level::Debug, format_args!("Unset {}", key));
        }
    }
}
