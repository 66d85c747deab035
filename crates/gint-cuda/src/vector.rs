//! Typed, resizable buffers in either memory space
//!
//! [`Vector<T, M>`] behaves the same whether `M` is [`Host`] or [`Device`]:
//! only the backing store and the function that releases it differ. Elements
//! must be [`bytemuck::Pod`]. They are only ever bulk-copied or bulk-filled,
//! never constructed or dropped one by one.
//!
//! Growth never preserves contents and `push_back` never grows. Callers size a
//! vector up front with [`Vector::reserve`] or [`Vector::resize`] and then fill
//! it.
//!
//! ```rust
//! use gint_cuda::{Device, Host, Vector};
//!
//! let values: Vec<f64> = (0..1000).map(f64::from).collect();
//! let device = Vector::<f64, Device>::from_slice(&values)?;
//! let host = Vector::<f64, Host>::from_vector(&device)?;
//! assert_eq!(&host[..], &values[..]);
//! # Ok::<(), gint_cuda::Error>(())
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use bytemuck::Pod;

use crate::error::{Error, Result};
use crate::space::{self, Device, Host, MemorySpace, SpaceKind, ALLOCATION_ALIGNMENT};
use crate::stream::Stream;

/// Memory owned by one space and released through that space on drop.
pub(crate) struct Allocation<M: MemorySpace> {
    ptr: *mut u8,
    bytes: usize,
    _space: PhantomData<M>,
}

// SAFETY: an Allocation is the unique owner of its address range.
unsafe impl<M: MemorySpace> Send for Allocation<M> {}
unsafe impl<M: MemorySpace> Sync for Allocation<M> {}

impl<M: MemorySpace> Allocation<M> {
    pub(crate) const fn empty() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            bytes: 0,
            _space: PhantomData,
        }
    }

    /// Allocate `bytes` bytes. Host memory is zero-filled so that slice views
    /// never observe uninitialized bytes.
    pub(crate) fn new(bytes: usize) -> Result<Self> {
        let allocation = Self {
            ptr: M::allocate(bytes)?,
            bytes,
            _space: PhantomData,
        };
        if M::KIND == SpaceKind::Host {
            // SAFETY: freshly allocated range of exactly `bytes` bytes.
            unsafe { M::memset(allocation.ptr, 0, bytes)? };
        }
        Ok(allocation)
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }
}

impl<M: MemorySpace> Drop for Allocation<M> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `M::allocate` and is released exactly once.
        if let Err(err) = unsafe { M::free(self.ptr) } {
            tracing::error!(%err, space = %M::KIND, bytes = self.bytes, "failed to release allocation");
        }
    }
}

/// A contiguous, typed buffer of `T` in memory space `M`.
///
/// Invariants: `len <= capacity`, and capacity only changes by growing (or
/// by [`Vector::swap`]). Pointers obtained from a vector are invalidated when
/// it grows.
pub struct Vector<T: Pod, M: MemorySpace> {
    store: Allocation<M>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

pub type HostVector<T> = Vector<T, Host>;
pub type DeviceVector<T> = Vector<T, Device>;

impl<T: Pod, M: MemorySpace> Vector<T, M> {
    const ELEMENT_SIZE: usize = {
        assert!(mem::size_of::<T>() > 0, "zero-sized element types are not supported");
        assert!(
            mem::align_of::<T>() <= ALLOCATION_ALIGNMENT,
            "element alignment exceeds allocation alignment"
        );
        mem::size_of::<T>()
    };

    /// An empty vector. Does not allocate.
    pub const fn new() -> Self {
        Self {
            store: Allocation::empty(),
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// A vector of `len` elements. Host and emulated device storage start
    /// zeroed; driver-allocated device contents are unspecified.
    pub fn with_len(len: usize) -> Result<Self> {
        let mut vector = Self::new();
        vector.resize(len)?;
        Ok(vector)
    }

    /// Copy a host slice into a new vector in space `M`.
    pub fn from_slice(src: &[T]) -> Result<Self> {
        let mut vector = Self::new();
        vector.assign(src)?;
        Ok(vector)
    }

    /// Deep copy of a vector in any space into a new vector in space `M`.
    pub fn from_vector<S: MemorySpace>(src: &Vector<T, S>) -> Result<Self> {
        let mut vector = Self::new();
        vector.assign_from(src)?;
        Ok(vector)
    }

    pub fn try_clone(&self) -> Result<Self> {
        Self::from_vector(self)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Alias of [`Vector::len`].
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes occupied by the `len` live elements.
    pub fn size_bytes(&self) -> usize {
        self.len * Self::ELEMENT_SIZE
    }

    pub fn space(&self) -> SpaceKind {
        M::KIND
    }

    /// Start of the storage in space `M`; null while nothing is allocated.
    pub fn as_ptr(&self) -> *const T {
        self.store.as_ptr().cast_const().cast()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.store.as_ptr().cast()
    }

    /// Ensure room for `capacity` elements.
    ///
    /// When this grows the vector, fresh storage of exactly `capacity`
    /// elements replaces the old one and the previous contents are gone.
    /// On failure the vector is unchanged.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity <= self.capacity {
            return Ok(());
        }
        let bytes = capacity
            .checked_mul(Self::ELEMENT_SIZE)
            .ok_or_else(|| Error::allocation(M::KIND, usize::MAX, format!("{capacity} elements overflow usize")))?;
        self.store = Allocation::new(bytes)?;
        tracing::trace!(space = %M::KIND, from = self.capacity, to = capacity, bytes, "vector reallocated");
        self.capacity = capacity;
        Ok(())
    }

    /// Set the length to `len`, growing (without preserving contents) if needed.
    pub fn resize(&mut self, len: usize) -> Result<()> {
        self.reserve(len)?;
        self.len = len;
        Ok(())
    }

    /// Drop all elements, keeping the storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace the contents with a copy of a host slice.
    pub fn assign(&mut self, src: &[T]) -> Result<()> {
        // SAFETY: a live slice is readable for its full length.
        unsafe { self.assign_raw::<Host>(src.as_ptr(), src.len()) }
    }

    /// Replace the contents with a copy of another vector in any space.
    pub fn assign_from<S: MemorySpace>(&mut self, src: &Vector<T, S>) -> Result<()> {
        // SAFETY: `src` cannot alias `self`, both are borrowed.
        unsafe { self.assign_raw::<S>(src.as_ptr(), src.len()) }
    }

    /// Replace the contents with `len` elements read from `src` in space `S`.
    ///
    /// # Safety
    ///
    /// `src` must be readable for `len` elements in space `S`, and must not
    /// point into this vector's storage (which may be released by the resize).
    #[tracing::instrument(level = "trace", skip(self, src), fields(
        src_space = %S::KIND,
        dst_space = %M::KIND,
        elements = len,
        type_name = std::any::type_name::<T>()
    ))]
    pub unsafe fn assign_raw<S: MemorySpace>(&mut self, src: *const T, len: usize) -> Result<()> {
        self.resize(len)?;
        space::copy::<T, M, S>(src, len, self.as_mut_ptr())
    }

    /// Stream-ordered [`Vector::assign_raw`]. Only the resize happens
    /// immediately; the copy runs when the stream reaches it.
    ///
    /// # Safety
    ///
    /// As for [`Vector::assign_raw`], and `src` must stay valid until the
    /// stream has been synchronized. This vector must not be resized or
    /// dropped before then either.
    pub unsafe fn assign_raw_async<S: MemorySpace>(&mut self, src: *const T, len: usize, stream: &Stream) -> Result<()> {
        self.resize(len)?;
        space::copy_async::<T, M, S>(src, len, self.as_mut_ptr(), stream)
    }

    /// Resize to `len` and zero every byte.
    pub fn assign_zero(&mut self, len: usize) -> Result<()> {
        self.resize(len)?;
        self.fill_bytes(0)
    }

    /// Set every byte of the live elements to `value`.
    pub fn fill_bytes(&mut self, value: u8) -> Result<()> {
        let bytes = self.size_bytes();
        // SAFETY: the first `size_bytes` bytes lie inside our own allocation.
        unsafe { M::memset(self.store.as_ptr(), value, bytes) }
    }

    /// Append without growing.
    ///
    /// Fails with [`Error::CapacityExceeded`] when `len == capacity`; earlier
    /// elements are untouched either way.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        if self.len >= self.capacity {
            return Err(Error::CapacityExceeded { capacity: self.capacity });
        }
        // SAFETY: slot `len` is inside capacity; `value` lives on this stack frame.
        unsafe { space::copy::<T, M, Host>(&value, 1, self.as_mut_ptr().add(self.len))? };
        self.len += 1;
        Ok(())
    }

    /// Exchange contents, length, capacity and ownership with `other`.
    /// Nothing is copied and both backing addresses survive.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Copy the live elements back into an ordinary `Vec`.
    pub fn to_host_vec(&self) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        // SAFETY: `out` has room for `len` elements and is distinct from `self`.
        unsafe { space::copy::<T, Host, M>(self.as_ptr(), self.len, out.as_mut_ptr())? };
        Ok(out)
    }
}

impl<T: Pod> Vector<T, Host> {
    pub fn as_slice(&self) -> &[T] {
        let ptr = NonNull::new(self.as_ptr().cast_mut()).unwrap_or(NonNull::dangling());
        // SAFETY: host storage is zero-initialized on allocation and holds at
        // least `len` elements; an empty vector uses a dangling pointer.
        unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;
        let ptr = NonNull::new(self.as_mut_ptr()).unwrap_or(NonNull::dangling());
        // SAFETY: as for `as_slice`, and `&mut self` guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), len) }
    }

    /// Element access without a bounds check.
    ///
    /// # Safety
    ///
    /// `index < self.len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len);
        &*self.as_ptr().add(index)
    }

    /// # Safety
    ///
    /// `index < self.len()`.
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        &mut *self.as_mut_ptr().add(index)
    }
}

impl<T: Pod> Vector<T, Device> {
    /// Enqueue a byte fill of the live elements on `stream`.
    ///
    /// The vector must not be resized or dropped before the stream is
    /// synchronized.
    pub fn fill_bytes_async(&mut self, value: u8, stream: &Stream) -> Result<()> {
        let bytes = self.size_bytes();
        // SAFETY: range is inside our own allocation; lifetime is the caller's contract above.
        unsafe { Device::memset_async(self.store.as_ptr(), value, bytes, stream) }
    }
}

impl<T: Pod> Deref for Vector<T, Host> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> DerefMut for Vector<T, Host> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod, M: MemorySpace> Default for Vector<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod, M: MemorySpace> fmt::Debug for Vector<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("space", &M::KIND)
            .field("type", &std::any::type_name::<T>())
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("allocated_bytes", &self.store.bytes())
            .finish()
    }
}

/// Set every byte of `vector`'s live elements to `value`.
pub fn memset<T: Pod, M: MemorySpace>(vector: &mut Vector<T, M>, value: u8) -> Result<()> {
    vector.fill_bytes(value)
}

/// Stream-ordered [`memset`] for device vectors.
pub fn memset_async<T: Pod>(vector: &mut Vector<T, Device>, value: u8, stream: &Stream) -> Result<()> {
    vector.fill_bytes_async(value, stream)
}
