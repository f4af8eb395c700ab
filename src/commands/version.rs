//! Version command implementation

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, VersionInfo};
use crate::cuda::ComputeRuntime;
use crate::error::Result;
use crate::nvml::GpuManager;
use crate::platform::GpuInspector;

/// Execute the version command
///
/// Fails only when neither library reports a version.
pub fn run_version<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
    format: OutputFormat,
) -> Result<()> {
    let info = versions(inspector)?;
    print_output(&info, format)?;
    Ok(())
}

fn versions<R: ComputeRuntime, M: GpuManager>(
    inspector: &GpuInspector<R, M>,
) -> Result<VersionInfo> {
    let cuda = inspector.cuda_version();
    let driver = inspector.driver_version();

    match (cuda, driver) {
        (Err(e), Err(_)) => Err(e),
        (cuda, driver) => Ok(VersionInfo {
            gpuprobe: env!("CARGO_PKG_VERSION").to_string(),
            cuda: cuda.ok(),
            driver: driver.ok(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::mock::MockManager;
    use crate::platform::{ComputeBackend, SystemInspector};

    #[test]
    fn test_partial_versions() {
        let inspector = GpuInspector::new(ComputeBackend::Unavailable, MockManager::new(1));
        let info = versions(&inspector).unwrap();
        assert_eq!(info.cuda, None);
        assert_eq!(info.driver.as_deref(), Some("535.104.05"));
    }

    #[test]
    fn test_no_versions() {
        let inspector = SystemInspector::unavailable();
        assert!(matches!(
            versions(&inspector),
            Err(AppError::ComputeUnavailable)
        ));
    }
}
