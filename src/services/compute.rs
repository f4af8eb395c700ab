//! Compute-capability translator
//!
//! Reads raw device properties from the CUDA driver and turns them into a
//! [`ComputeCapability`].

use crate::cuda::ComputeRuntime;
use crate::domain::ComputeCapability;
use crate::error::ServiceError;

/// Describe the compute device at `index`
///
/// The device's primary context is reset once its properties are read, so
/// any context the caller held on that device does not survive this call.
pub fn describe_compute_device<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    index: u32,
) -> Result<ComputeCapability, ServiceError> {
    let props = runtime.device_properties(index)?;

    if let Err(e) = runtime.reset_device(index) {
        log::warn!("Failed to reset context of CUDA device {}: {}", index, e);
    }

    let capability = ComputeCapability::from_properties(&props)?;
    log::debug!("CUDA device {}: {}", index, capability);

    Ok(capability)
}

/// Describe the compute device at a PCI bus id
pub fn describe_compute_device_by_bus_id<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    bus_id: &str,
) -> Result<(u32, ComputeCapability), ServiceError> {
    let index = runtime.device_by_pci_bus_id(bus_id)?;
    log::debug!("PCI bus id {} resolved to CUDA device {}", bus_id, index);
    Ok((index, describe_compute_device(runtime, index)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawDeviceProperties;
    use crate::error::{CudaError, DomainError};
    use crate::mock::{pascal_properties, MockRuntime};

    #[test]
    fn test_describe_pascal() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties()]);
        let cap = describe_compute_device(&runtime, 0).unwrap();

        assert_eq!(cap.family, "Pascal");
        assert_eq!(cap.arch, "6.1");
        assert_eq!(cap.cores, 2560);
        assert_eq!(cap.hyper_q, 32);
        assert_eq!(cap.memory.global_mib, 8192);
        assert_eq!(cap.memory.shared_kib, 96);
        assert_eq!(cap.memory.constant_kib, 64);
        assert_eq!(cap.memory.l2_cache_kib, 2048);
        assert_eq!(cap.memory.bandwidth_gbps, 320);
        assert!(!cap.memory.ecc);
    }

    #[test]
    fn test_context_reset_after_read() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties(); 2]);
        describe_compute_device(&runtime, 1).unwrap();
        assert_eq!(runtime.resets(), vec![1]);
    }

    #[test]
    fn test_reset_failure_is_not_fatal() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties()])
            .with_reset_failure(CudaError::Call("context is destroyed".into()));
        assert!(describe_compute_device(&runtime, 0).is_ok());
    }

    #[test]
    fn test_property_failure_surfaces_vendor_text() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties()]).with_property_failure(0);
        let err = describe_compute_device(&runtime, 0).unwrap_err();
        assert_eq!(err.to_string(), "unspecified launch failure");
        assert!(runtime.resets().is_empty());
    }

    #[test]
    fn test_unknown_architecture_fails() {
        let props = RawDeviceProperties {
            major: 8,
            minor: 6,
            multiprocessor_count: 82,
            ..pascal_properties()
        };
        let runtime = MockRuntime::with_devices(vec![props]);
        let err = describe_compute_device(&runtime, 0).unwrap_err();
        assert_eq!(
            err,
            ServiceError::Domain(DomainError::UnsupportedArchitecture("8.6".into()))
        );
    }

    #[test]
    fn test_cores_scale_with_sm_count() {
        for sm_count in [0, 1, 7, 80] {
            let props = RawDeviceProperties {
                major: 7,
                minor: 0,
                multiprocessor_count: sm_count,
                ..pascal_properties()
            };
            let runtime = MockRuntime::with_devices(vec![props]);
            let cap = describe_compute_device(&runtime, 0).unwrap();
            assert_eq!(cap.cores, 64 * u64::from(sm_count));
        }
    }

    #[test]
    fn test_describe_by_bus_id() {
        let volta = RawDeviceProperties {
            major: 7,
            minor: 0,
            multiprocessor_count: 80,
            ecc_enabled: true,
            ..pascal_properties()
        };
        let runtime = MockRuntime::with_devices(vec![pascal_properties(), volta]);
        let (index, cap) = describe_compute_device_by_bus_id(&runtime, "00000000:02:00.0").unwrap();
        assert_eq!(index, 1);
        assert_eq!(cap.family, "Volta");
        assert!(cap.memory.ecc);
    }

    #[test]
    fn test_unknown_bus_id() {
        let runtime = MockRuntime::with_devices(vec![pascal_properties()]);
        let err = describe_compute_device_by_bus_id(&runtime, "0000:ff:00.0").unwrap_err();
        assert!(matches!(err, ServiceError::Cuda(CudaError::Call(_))));
    }
}
