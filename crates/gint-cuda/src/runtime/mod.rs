//! Accelerator runtime bindings.
//!
//! Both backends expose the same crate-private function set; exactly one is
//! compiled in. Without the `cuda` feature the device space is emulated in
//! host memory, with stream work deferred until synchronization so that
//! ordering bugs show up the same way they would on hardware.

use parking_lot::Mutex;

#[cfg(not(feature = "cuda"))]
mod emulated;
#[cfg(not(feature = "cuda"))]
pub(crate) use emulated::*;

#[cfg(feature = "cuda")]
mod cuda;
#[cfg(feature = "cuda")]
pub(crate) use cuda::*;

static PENDING_FAULT: Mutex<Option<String>> = parking_lot::const_mutex(None);

/// Remember a fault raised by asynchronous work. The first fault is kept
/// until it is taken.
pub(crate) fn record_fault(message: String) {
    let mut pending = PENDING_FAULT.lock();
    if pending.is_none() {
        tracing::warn!(%message, "recording runtime fault");
        *pending = Some(message);
    }
}

pub(crate) fn peek_fault() -> Option<String> {
    PENDING_FAULT.lock().clone()
}

pub(crate) fn take_fault() -> Option<String> {
    let recorded = PENDING_FAULT.lock().take();
    recorded.or_else(query_fault)
}

/// Block until all work submitted to every stream has completed.
pub fn synchronize() -> crate::Result<()> {
    device_synchronize()?;
    match peek_fault() {
        Some(message) => Err(crate::Error::runtime("synchronize", message)),
        None => Ok(()),
    }
}

/// Name of the compiled-in runtime backend.
pub fn backend_name() -> &'static str {
    BACKEND_NAME
}
