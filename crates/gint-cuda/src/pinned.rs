//! Page-locking of caller-owned host memory
//!
//! Registration is process-wide state keyed by the start address of the
//! pinned range. Registering a range that overlaps an existing one fails
//! with [`Error::AlreadyRegistered`]; unregistering an address that does not
//! start a registered range fails with [`Error::NotRegistered`].

use std::collections::BTreeMap;

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::runtime;

/// start address -> length in bytes
static REGISTRY: Mutex<BTreeMap<usize, usize>> = parking_lot::const_mutex(BTreeMap::new());

fn overlaps(registry: &BTreeMap<usize, usize>, start: usize, bytes: usize) -> bool {
    let end = start.saturating_add(bytes);
    let before = registry
        .range(..=start)
        .next_back()
        .is_some_and(|(&base, &len)| base + len > start);
    let after = registry.range(start..end).next().is_some();
    before || after
}

/// Pin `data` so the accelerator can read and write it directly and
/// asynchronous copies from it can overlap host work.
#[tracing::instrument(level = "debug", skip(data), fields(address = data.as_ptr() as usize, bytes = std::mem::size_of_val(data)))]
pub fn register_pointer<T: Pod>(data: &[T]) -> Result<()> {
    let address = data.as_ptr() as usize;
    let bytes = std::mem::size_of_val(data);
    if bytes == 0 {
        return Err(Error::runtime("register_pointer", "cannot pin an empty range"));
    }

    let mut registry = REGISTRY.lock();
    if overlaps(&registry, address, bytes) {
        return Err(Error::AlreadyRegistered { address });
    }
    // SAFETY: `data` is a live range of exactly `bytes` bytes.
    unsafe { runtime::host_register(data.as_ptr().cast_mut().cast(), bytes)? };
    registry.insert(address, bytes);
    Ok(())
}

/// Undo [`register_pointer`] for the range starting at `data`.
#[tracing::instrument(level = "debug", skip(data), fields(address = data.as_ptr() as usize))]
pub fn unregister_pointer<T: Pod>(data: &[T]) -> Result<()> {
    let address = data.as_ptr() as usize;
    let mut registry = REGISTRY.lock();
    if !registry.contains_key(&address) {
        return Err(Error::NotRegistered { address });
    }
    // SAFETY: the range was registered by `register_pointer`.
    unsafe { runtime::host_unregister(data.as_ptr().cast_mut().cast())? };
    registry.remove(&address);
    Ok(())
}

/// Accelerator address mapped to a page-locked host address. Interior
/// pointers of a pinned range are accepted.
pub fn device_pointer<T>(host: *const T) -> Result<*mut T> {
    runtime::host_device_pointer(host.cast_mut().cast()).map(|ptr| ptr.cast())
}

/// Whether a registered range starts at `address`.
pub fn is_registered<T>(address: *const T) -> bool {
    REGISTRY.lock().contains_key(&(address as usize))
}

/// Registers a mutable host range for the guard's lifetime.
pub struct Pinned<'a, T: Pod> {
    data: &'a mut [T],
}

impl<'a, T: Pod> Pinned<'a, T> {
    pub fn new(data: &'a mut [T]) -> Result<Self> {
        register_pointer(&*data)?;
        Ok(Self { data })
    }

    pub fn as_slice(&self) -> &[T] {
        &*self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut *self.data
    }

    pub fn device_pointer(&self) -> Result<*mut T> {
        device_pointer(self.data.as_ptr())
    }
}

impl<T: Pod> Drop for Pinned<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = unregister_pointer(&*self.data) {
            tracing::error!(%err, "failed to unpin host range");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn overlap_detection() {
        let mut registry = BTreeMap::new();
        registry.insert(100, 50);
        assert!(overlaps(&registry, 100, 1));
        assert!(overlaps(&registry, 149, 10));
        assert!(overlaps(&registry, 90, 11));
        assert!(!overlaps(&registry, 150, 10));
        assert!(!overlaps(&registry, 90, 10));
    }

    #[test]
    #[serial(pinned)]
    fn register_twice_fails() {
        let data = vec![1.0f64; 32];
        register_pointer(&data).unwrap();
        assert!(matches!(register_pointer(&data), Err(Error::AlreadyRegistered { .. })));
        assert!(matches!(register_pointer(&data[4..]), Err(Error::AlreadyRegistered { .. })));
        unregister_pointer(&data).unwrap();
        assert!(!is_registered(data.as_ptr()));
    }

    #[test]
    #[serial(pinned)]
    fn unregister_unknown_fails() {
        let data = vec![0u8; 8];
        assert!(matches!(unregister_pointer(&data), Err(Error::NotRegistered { .. })));
    }

    #[test]
    #[serial(pinned)]
    fn empty_range_cannot_be_pinned() {
        let data: Vec<u32> = Vec::new();
        assert!(matches!(register_pointer(&data), Err(Error::Runtime { .. })));
    }

    #[test]
    #[serial(pinned)]
    fn guard_maps_interior_pointers_and_unpins() {
        let mut data = vec![0u32; 64];
        let start = data.as_ptr();
        {
            let pinned = Pinned::new(&mut data).unwrap();
            assert!(is_registered(start));
            assert!(pinned.device_pointer().is_ok());
            assert!(device_pointer(unsafe { start.add(10) }).is_ok());
        }
        assert!(!is_registered(start));
    }

    #[test]
    #[serial(pinned)]
    fn unpinned_memory_has_no_device_address() {
        let data = vec![0u64; 4];
        assert!(matches!(device_pointer(data.as_ptr()), Err(Error::Runtime { .. })));
    }
}
