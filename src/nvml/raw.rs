//! Raw NVML entry points
//!
//! A few queries are not exposed by nvml-wrapper in the shape the
//! translators need (raw topology levels, fixed-capacity process reads,
//! per-location ECC counters). These bypass the wrapper and call the
//! library directly through libloading.

use crate::error::NvmlError;

use libloading::{Library, Symbol};
use nvml_wrapper_sys::bindings::nvmlDevice_t;
use std::ffi::{c_char, c_uint, c_ulonglong, CStr};
use std::sync::OnceLock;

const NVML_LIBRARIES: &[&str] = &["libnvidia-ml.so.1", "libnvidia-ml.so"];

// nvmlReturn_t values
const NVML_SUCCESS: c_uint = 0;
const NVML_ERROR_NOT_SUPPORTED: c_uint = 3;
const NVML_ERROR_INSUFFICIENT_SIZE: c_uint = 7;
const NVML_ERROR_FUNCTION_NOT_FOUND: c_uint = 13;

// nvmlMemoryErrorType_t / nvmlEccCounterType_t
const NVML_MEMORY_ERROR_TYPE_UNCORRECTED: c_uint = 1;
const NVML_VOLATILE_ECC: c_uint = 0;

// nvmlMemoryLocation_t
pub const NVML_MEMORY_LOCATION_L1_CACHE: c_uint = 0;
pub const NVML_MEMORY_LOCATION_L2_CACHE: c_uint = 1;
pub const NVML_MEMORY_LOCATION_DEVICE_MEMORY: c_uint = 2;

// Extra slots for processes that start between the count and the read
const PROCESS_SLACK: usize = 8;
const PROCESS_READ_ATTEMPTS: usize = 3;

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct NvmlProcessInfoV1 {
    pid: c_uint,
    used_gpu_memory: c_ulonglong,
}

fn library() -> Result<&'static Library, NvmlError> {
    static LIBRARY: OnceLock<Option<Library>> = OnceLock::new();
    LIBRARY
        .get_or_init(|| {
            NVML_LIBRARIES.iter().find_map(|name| {
                // SAFETY: loading libnvidia-ml runs no initializers beyond
                // its own; nvmlInit is called by nvml-wrapper.
                unsafe { Library::new(name) }.ok()
            })
        })
        .as_ref()
        .ok_or(NvmlError::Unavailable)
}

fn symbol<T>(name: &[u8]) -> Result<Symbol<'static, T>, NvmlError> {
    let lib = library()?;
    // SAFETY: callers pass a function type matching the NVML prototype
    unsafe { lib.get(name) }.map_err(|e| {
        let name = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        NvmlError::FunctionNotFound(format!("{} not available: {}", name, e))
    })
}

/// NVML's own text for a return code
fn error_string(code: c_uint) -> String {
    type ErrorStringFn = unsafe extern "C" fn(c_uint) -> *const c_char;

    if let Ok(func) = symbol::<ErrorStringFn>(b"nvmlErrorString\0") {
        let ptr = unsafe { func(code) };
        if !ptr.is_null() {
            // SAFETY: NVML returns a static NUL-terminated string
            return unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        }
    }
    format!("NVML error code: {}", code)
}

/// Convert an NVML return code into a result
fn check(code: c_uint) -> Result<(), NvmlError> {
    match code {
        NVML_SUCCESS => Ok(()),
        NVML_ERROR_NOT_SUPPORTED => Err(NvmlError::NotSupported(error_string(code))),
        NVML_ERROR_FUNCTION_NOT_FOUND => Err(NvmlError::FunctionNotFound(error_string(code))),
        _ => Err(NvmlError::Call(error_string(code))),
    }
}

/// Minor number of the device node
pub fn minor_number(handle: nvmlDevice_t) -> Result<u32, NvmlError> {
    type GetMinorNumberFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_uint) -> c_uint;

    let func: Symbol<GetMinorNumberFn> = symbol(b"nvmlDeviceGetMinorNumber\0")?;
    let mut minor: c_uint = 0;
    check(unsafe { func(handle, &mut minor) })?;
    Ok(minor)
}

/// Encoder or decoder utilization in percent
pub fn codec_utilization(handle: nvmlDevice_t, encoder: bool) -> Result<u32, NvmlError> {
    type GetCodecUtilFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_uint, *mut c_uint) -> c_uint;

    let name: &[u8] = if encoder {
        b"nvmlDeviceGetEncoderUtilization\0"
    } else {
        b"nvmlDeviceGetDecoderUtilization\0"
    };
    let func: Symbol<GetCodecUtilFn> = symbol(name)?;
    let mut utilization: c_uint = 0;
    let mut sampling_period: c_uint = 0;
    check(unsafe { func(handle, &mut utilization, &mut sampling_period) })?;
    Ok(utilization)
}

/// Uncorrected volatile ECC errors at a memory location
pub fn memory_error_counter(handle: nvmlDevice_t, location: c_uint) -> Result<u64, NvmlError> {
    type GetMemoryErrorCounterFn =
        unsafe extern "C" fn(nvmlDevice_t, c_uint, c_uint, c_uint, *mut c_ulonglong) -> c_uint;

    let func: Symbol<GetMemoryErrorCounterFn> = symbol(b"nvmlDeviceGetMemoryErrorCounter\0")?;
    let mut count: c_ulonglong = 0;
    check(unsafe {
        func(
            handle,
            NVML_MEMORY_ERROR_TYPE_UNCORRECTED,
            NVML_VOLATILE_ECC,
            location,
            &mut count,
        )
    })?;
    Ok(count)
}

/// Running compute process PIDs, at most `capacity`
pub fn compute_running_processes(
    handle: nvmlDevice_t,
    capacity: usize,
) -> Result<Vec<u32>, NvmlError> {
    type GetProcessesFn =
        unsafe extern "C" fn(nvmlDevice_t, *mut c_uint, *mut NvmlProcessInfoV1) -> c_uint;

    let func: Symbol<GetProcessesFn> = symbol(b"nvmlDeviceGetComputeRunningProcesses\0")?;

    read_processes(capacity, |count, buffer| {
        let ptr = buffer.map_or(std::ptr::null_mut(), |b| b.as_mut_ptr());
        // SAFETY: `count` never exceeds the length of `buffer`
        unsafe { func(handle, count, ptr) }
    })
}

/// Count-then-read loop around the process list query
///
/// The buffer is regrown while processes keep appearing between calls. If
/// it is still too small after `PROCESS_READ_ATTEMPTS` reads, the snapshot
/// reports no processes rather than failing.
fn read_processes<F>(capacity: usize, mut call: F) -> Result<Vec<u32>, NvmlError>
where
    F: FnMut(&mut c_uint, Option<&mut [NvmlProcessInfoV1]>) -> c_uint,
{
    let mut count: c_uint = 0;
    match call(&mut count, None) {
        NVML_SUCCESS => return Ok(Vec::new()),
        NVML_ERROR_INSUFFICIENT_SIZE => {}
        code => check(code)?,
    }

    for _ in 0..PROCESS_READ_ATTEMPTS {
        let mut processes = vec![NvmlProcessInfoV1::default(); count as usize + PROCESS_SLACK];
        let mut filled = processes.len() as c_uint;
        match call(&mut filled, Some(&mut processes)) {
            NVML_SUCCESS => {
                return Ok(processes
                    .into_iter()
                    .take(filled as usize)
                    .take(capacity)
                    .map(|p| p.pid)
                    .collect())
            }
            NVML_ERROR_INSUFFICIENT_SIZE => count = filled,
            code => check(code)?,
        }
    }

    log::warn!("Process list kept growing while being read, reporting none");
    Ok(Vec::new())
}

/// Raw topology level of the nearest common ancestor of two devices
pub fn topology_common_ancestor(
    handle: nvmlDevice_t,
    other: nvmlDevice_t,
) -> Result<u32, NvmlError> {
    type GetCommonAncestorFn =
        unsafe extern "C" fn(nvmlDevice_t, nvmlDevice_t, *mut c_uint) -> c_uint;

    let func: Symbol<GetCommonAncestorFn> = symbol(b"nvmlDeviceGetTopologyCommonAncestor\0")?;
    let mut level: c_uint = 0;
    check(unsafe { func(handle, other, &mut level) })?;
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code() {
        assert!(check(NVML_SUCCESS).is_ok());
    }

    #[test]
    fn test_distinguished_codes() {
        assert!(matches!(
            check(NVML_ERROR_NOT_SUPPORTED),
            Err(NvmlError::NotSupported(_))
        ));
        assert!(matches!(
            check(NVML_ERROR_FUNCTION_NOT_FOUND),
            Err(NvmlError::FunctionNotFound(_))
        ));
        assert!(matches!(check(999), Err(NvmlError::Call(_))));
    }

    fn process(pid: u32) -> NvmlProcessInfoV1 {
        NvmlProcessInfoV1 {
            pid,
            used_gpu_memory: 0,
        }
    }

    #[test]
    fn test_no_processes() {
        let pids = read_processes(4, |_, _| NVML_SUCCESS).unwrap();
        assert!(pids.is_empty());
    }

    #[test]
    fn test_count_errors_keep_their_kind() {
        assert!(matches!(
            read_processes(4, |_, _| NVML_ERROR_NOT_SUPPORTED),
            Err(NvmlError::NotSupported(_))
        ));
        assert!(matches!(
            read_processes(4, |_, _| NVML_ERROR_FUNCTION_NOT_FOUND),
            Err(NvmlError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn test_read_truncates_to_capacity() {
        let pids = read_processes(2, |count, buffer| match buffer {
            None => {
                *count = 3;
                NVML_ERROR_INSUFFICIENT_SIZE
            }
            Some(buffer) => {
                for (slot, pid) in buffer.iter_mut().zip([100, 200, 300]) {
                    *slot = process(pid);
                }
                *count = 3;
                NVML_SUCCESS
            }
        })
        .unwrap();
        assert_eq!(pids, vec![100, 200]);
    }

    #[test]
    fn test_read_regrows_when_processes_appear() {
        let mut reads = 0;
        let pids = read_processes(32, |count, buffer| match buffer {
            None => {
                *count = 1;
                NVML_ERROR_INSUFFICIENT_SIZE
            }
            Some(buffer) => {
                reads += 1;
                if reads == 1 {
                    *count = 20;
                    return NVML_ERROR_INSUFFICIENT_SIZE;
                }
                assert!(buffer.len() >= 20);
                for (i, slot) in buffer.iter_mut().take(20).enumerate() {
                    *slot = process(i as u32);
                }
                *count = 20;
                NVML_SUCCESS
            }
        })
        .unwrap();
        assert_eq!(pids.len(), 20);
        assert_eq!(reads, 2);
    }

    #[test]
    fn test_endless_growth_reports_no_processes() {
        let pids = read_processes(4, |count, _| {
            *count += 100;
            NVML_ERROR_INSUFFICIENT_SIZE
        })
        .unwrap();
        assert!(pids.is_empty());
    }
}
