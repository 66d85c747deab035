//! Reference-counted fixed-size arrays.

use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::Pod;

use crate::error::{Error, Result};
use crate::space::{Host, MemorySpace};
use crate::vector::Allocation;

/// A fixed-length array in space `M` shared by every clone. The memory is
/// released through `M` when the last clone is dropped.
pub struct SharedArray<T: Pod, M: MemorySpace> {
    store: Arc<Allocation<M>>,
    len: usize,
    _marker: PhantomData<T>,
}

/// Allocate a shared array of `len` elements.
pub fn make_shared<T: Pod, M: MemorySpace>(len: usize) -> Result<SharedArray<T, M>> {
    let bytes = len
        .checked_mul(std::mem::size_of::<T>())
        .ok_or_else(|| Error::allocation(M::KIND, usize::MAX, format!("{len} elements overflow usize")))?;
    Ok(SharedArray {
        store: Arc::new(Allocation::new(bytes)?),
        len,
        _marker: PhantomData,
    })
}

impl<T: Pod, M: MemorySpace> SharedArray<T, M> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const T {
        self.store.as_ptr().cast_const().cast()
    }

    /// Writable address of the shared storage. Writers must coordinate with
    /// every other holder of a clone.
    pub fn as_mut_ptr(&self) -> *mut T {
        self.store.as_ptr().cast()
    }

    /// Number of live handles to this array.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.store)
    }
}

impl<T: Pod> SharedArray<T, Host> {
    pub fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: host storage is zero-initialized and holds `len` elements.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// Mutable view, only while this is the sole handle.
    pub fn get_mut(&mut self) -> Option<&mut [T]> {
        let len = self.len;
        let store = Arc::get_mut(&mut self.store)?;
        if len == 0 {
            return Some(&mut []);
        }
        // SAFETY: unique handle to zero-initialized storage of `len` elements.
        Some(unsafe { std::slice::from_raw_parts_mut(store.as_ptr().cast(), len) })
    }
}

impl<T: Pod, M: MemorySpace> Clone for SharedArray<T, M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<T: Pod, M: MemorySpace> std::fmt::Debug for SharedArray<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedArray")
            .field("space", &M::KIND)
            .field("len", &self.len)
            .field("handles", &self.handles())
            .finish()
    }
}
