//! CUDA driver backend.
//!
//! The primary context of device `GINT_CUDA_DEVICE` (default 0) is retained
//! on first use and bound to whichever thread issues a call. Copies go through
//! unified addressing, so one driver entry point serves every direction.

use std::ffi::c_void;
use std::sync::{Arc, OnceLock};

use cudarc::driver::{result, sys, CudaDevice, DriverError};

use super::record_fault;
use crate::error::{Error, Result};
use crate::space::{Direction, SpaceKind};

pub(crate) const BACKEND_NAME: &str = "cuda";

const MEMHOSTREGISTER_DEVICEMAP: std::os::raw::c_uint = 0x02;

static DEVICE: OnceLock<std::result::Result<Arc<CudaDevice>, String>> = OnceLock::new();

fn device_ordinal() -> usize {
    std::env::var("GINT_CUDA_DEVICE")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Make the shared context current on this thread.
fn bind(label: &str) -> Result<()> {
    let device = DEVICE.get_or_init(|| {
        let ordinal = device_ordinal();
        tracing::info!(ordinal, "initializing CUDA device");
        CudaDevice::new(ordinal).map_err(|e| format!("CUDA device {ordinal} initialization failed: {e}"))
    });
    match device {
        Ok(device) => device.bind_to_thread().map_err(|e| driver_error(label, e)),
        Err(message) => Err(Error::runtime(label, message.clone())),
    }
}

fn driver_error(label: &str, err: DriverError) -> Error {
    Error::runtime(label, err.to_string())
}

// ===== Memory =====

pub(crate) fn host_alloc(bytes: usize) -> Result<*mut u8> {
    bind("host alloc")?;
    let mut ptr: *mut c_void = std::ptr::null_mut();
    unsafe { sys::lib().cuMemAllocHost_v2(&mut ptr, bytes) }
        .result()
        .map_err(|e| Error::allocation(SpaceKind::Host, bytes, e.to_string()))?;
    Ok(ptr.cast())
}

pub(crate) unsafe fn host_free(ptr: *mut u8) -> Result<()> {
    bind("host free")?;
    sys::lib()
        .cuMemFreeHost(ptr.cast())
        .result()
        .map_err(|e| driver_error("host free", e))
}

pub(crate) fn device_alloc(bytes: usize) -> Result<*mut u8> {
    bind("device alloc")?;
    let dptr = unsafe { result::malloc_sync(bytes) }
        .map_err(|e| Error::allocation(SpaceKind::Device, bytes, e.to_string()))?;
    Ok(dptr as *mut u8)
}

pub(crate) unsafe fn device_free(ptr: *mut u8) -> Result<()> {
    bind("device free")?;
    result::free_sync(ptr as sys::CUdeviceptr).map_err(|e| driver_error("device free", e))
}

pub(crate) unsafe fn device_memset(ptr: *mut u8, value: u8, bytes: usize) -> Result<()> {
    bind("device memset")?;
    result::memset_d8_sync(ptr as sys::CUdeviceptr, value, bytes).map_err(|e| driver_error("device memset", e))
}

pub(crate) unsafe fn device_memset_async(ptr: *mut u8, value: u8, bytes: usize, stream: &RawStream) -> Result<()> {
    bind("device memset async")?;
    result::memset_d8_async(ptr as sys::CUdeviceptr, value, bytes, stream.handle)
        .map_err(|e| driver_error("device memset async", e))
}

pub(crate) unsafe fn memcpy(dst: *mut u8, src: *const u8, bytes: usize, direction: Direction) -> Result<()> {
    if direction == Direction::HostToHost {
        std::ptr::copy(src, dst, bytes);
        return Ok(());
    }
    let label = format!("memcpy {}", direction.tag());
    bind(&label)?;
    sys::lib()
        .cuMemcpy(dst as sys::CUdeviceptr, src as sys::CUdeviceptr, bytes)
        .result()
        .map_err(|e| driver_error(&label, e))
}

pub(crate) unsafe fn memcpy_async(
    dst: *mut u8,
    src: *const u8,
    bytes: usize,
    direction: Direction,
    stream: &RawStream,
) -> Result<()> {
    let label = format!("memcpy async {}", direction.tag());
    bind(&label)?;
    sys::lib()
        .cuMemcpyAsync(dst as sys::CUdeviceptr, src as sys::CUdeviceptr, bytes, stream.handle)
        .result()
        .map_err(|e| driver_error(&label, e))
}

// ===== Host mapping =====

pub(crate) unsafe fn host_register(ptr: *mut u8, bytes: usize) -> Result<()> {
    bind("host register")?;
    sys::lib()
        .cuMemHostRegister_v2(ptr.cast(), bytes, MEMHOSTREGISTER_DEVICEMAP)
        .result()
        .map_err(|e| driver_error("host register", e))
}

pub(crate) unsafe fn host_unregister(ptr: *mut u8) -> Result<()> {
    bind("host unregister")?;
    sys::lib()
        .cuMemHostUnregister(ptr.cast())
        .result()
        .map_err(|e| driver_error("host unregister", e))
}

pub(crate) fn host_device_pointer(ptr: *mut u8) -> Result<*mut u8> {
    bind("device pointer")?;
    let mut dptr: sys::CUdeviceptr = 0;
    unsafe { sys::lib().cuMemHostGetDevicePointer_v2(&mut dptr, ptr.cast(), 0) }
        .result()
        .map_err(|e| driver_error("device pointer", e))?;
    Ok(dptr as *mut u8)
}

// ===== Streams =====

pub(crate) struct RawStream {
    handle: sys::CUstream,
}

// SAFETY: CUDA stream handles may be used from any thread bound to their context.
unsafe impl Send for RawStream {}
unsafe impl Sync for RawStream {}

impl RawStream {
    pub(crate) fn create() -> Result<Self> {
        bind("stream create")?;
        let handle = result::stream::create(result::stream::StreamKind::NonBlocking)
            .map_err(|e| driver_error("stream create", e))?;
        Ok(Self { handle })
    }

    pub(crate) fn synchronize(&self) -> Result<()> {
        bind("stream synchronize")?;
        unsafe { result::stream::synchronize(self.handle) }.map_err(|e| {
            record_fault(e.to_string());
            driver_error("stream synchronize", e)
        })
    }
}

impl Drop for RawStream {
    fn drop(&mut self) {
        let outcome = bind("stream destroy").and_then(|()| {
            unsafe { result::stream::destroy(self.handle) }.map_err(|e| driver_error("stream destroy", e))
        });
        if let Err(err) = outcome {
            tracing::error!(%err, "failed to destroy stream");
        }
    }
}

pub(crate) fn device_synchronize() -> Result<()> {
    bind("synchronize")?;
    result::ctx::synchronize().map_err(|e| {
        record_fault(e.to_string());
        driver_error("synchronize", e)
    })
}

/// Non-blocking probe of the context's sticky error state.
pub(crate) fn query_fault() -> Option<String> {
    if DEVICE.get().is_none() {
        return None;
    }
    bind("fault query").ok()?;
    match unsafe { sys::lib().cuStreamQuery(std::ptr::null_mut()) }.result() {
        Ok(()) => None,
        Err(DriverError(sys::CUresult::CUDA_ERROR_NOT_READY)) => None,
        Err(err) => Some(err.to_string()),
    }
}
