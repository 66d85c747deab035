//! Memory-space strategies and the copy routines that move bytes between them
//!
//! A strategy is a zero-sized type implementing [`MemorySpace`]. It is a
//! compile-time tag: containers are generic over it and never store it.
//! There are exactly two strategies:
//!
//! - [`Host`]: page-locked host memory, directly addressable by the CPU and
//!   usable as the host side of asynchronous transfers
//! - [`Device`]: accelerator memory, reachable only through the copy and fill
//!   routines in this module

use std::fmt;
use std::time::Instant;

use bytemuck::Pod;

use crate::error::Result;
use crate::runtime;
use crate::stream::Stream;

/// Every allocation made by either space is aligned to at least this many bytes.
pub const ALLOCATION_ALIGNMENT: usize = 256;

/// Runtime name of a memory space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceKind {
    Host,
    Device,
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceKind::Host => f.write_str("host"),
            SpaceKind::Device => f.write_str("device"),
        }
    }
}

/// Direction of a copy, derived from the source and destination spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    HostToHost,
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

impl Direction {
    pub const fn between(src: SpaceKind, dst: SpaceKind) -> Self {
        match (src, dst) {
            (SpaceKind::Host, SpaceKind::Host) => Direction::HostToHost,
            (SpaceKind::Host, SpaceKind::Device) => Direction::HostToDevice,
            (SpaceKind::Device, SpaceKind::Host) => Direction::DeviceToHost,
            (SpaceKind::Device, SpaceKind::Device) => Direction::DeviceToDevice,
        }
    }

    /// Short tag used in transfer events (`H2D`, `D2H`, ...).
    pub const fn tag(self) -> &'static str {
        match self {
            Direction::HostToHost => "H2H",
            Direction::HostToDevice => "H2D",
            Direction::DeviceToHost => "D2H",
            Direction::DeviceToDevice => "D2D",
        }
    }

    pub const fn source(self) -> SpaceKind {
        match self {
            Direction::HostToHost | Direction::HostToDevice => SpaceKind::Host,
            Direction::DeviceToHost | Direction::DeviceToDevice => SpaceKind::Device,
        }
    }

    pub const fn destination(self) -> SpaceKind {
        match self {
            Direction::HostToHost | Direction::DeviceToHost => SpaceKind::Host,
            Direction::HostToDevice | Direction::DeviceToDevice => SpaceKind::Device,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Host {}
    impl Sealed for super::Device {}
}

/// Allocation, release and fill for one memory space.
///
/// Addresses returned by [`MemorySpace::allocate`] must only ever be released
/// through [`MemorySpace::free`] of the same space. Owning containers enforce
/// this by construction; the raw functions are exposed for callers that
/// manage memory themselves.
pub trait MemorySpace: sealed::Sealed + Copy + Default + fmt::Debug + Send + Sync + 'static {
    const KIND: SpaceKind;

    /// Allocate `bytes` bytes aligned to [`ALLOCATION_ALIGNMENT`]. A zero-byte
    /// request returns the null address without touching the runtime.
    fn allocate(bytes: usize) -> Result<*mut u8>;

    /// Release an address returned by [`MemorySpace::allocate`]. Null is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from `allocate` of this space and not have
    /// been freed yet. No pending asynchronous work may still use it.
    unsafe fn free(ptr: *mut u8) -> Result<()>;

    /// Synchronously set `bytes` bytes starting at `ptr` to `value`.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + bytes` must lie inside a live allocation of this space.
    unsafe fn memset(ptr: *mut u8, value: u8, bytes: usize) -> Result<()>;
}

/// Page-locked host memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Host;

/// Accelerator memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Device;

impl MemorySpace for Host {
    const KIND: SpaceKind = SpaceKind::Host;

    fn allocate(bytes: usize) -> Result<*mut u8> {
        if bytes == 0 {
            return Ok(std::ptr::null_mut());
        }
        let start = Instant::now();
        let ptr = runtime::host_alloc(bytes)?;
        gint_tracing::performance::record_allocation(bytes, "host", start.elapsed().as_micros() as u64);
        Ok(ptr)
    }

    unsafe fn free(ptr: *mut u8) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }
        runtime::host_free(ptr)
    }

    unsafe fn memset(ptr: *mut u8, value: u8, bytes: usize) -> Result<()> {
        if bytes > 0 {
            std::ptr::write_bytes(ptr, value, bytes);
        }
        Ok(())
    }
}

impl MemorySpace for Device {
    const KIND: SpaceKind = SpaceKind::Device;

    fn allocate(bytes: usize) -> Result<*mut u8> {
        if bytes == 0 {
            return Ok(std::ptr::null_mut());
        }
        let start = Instant::now();
        let ptr = runtime::device_alloc(bytes)?;
        gint_tracing::performance::record_allocation(bytes, "device", start.elapsed().as_micros() as u64);
        Ok(ptr)
    }

    unsafe fn free(ptr: *mut u8) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }
        runtime::device_free(ptr)
    }

    unsafe fn memset(ptr: *mut u8, value: u8, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        runtime::device_memset(ptr, value, bytes)
    }
}

impl Device {
    /// Enqueue a fill on `stream` and return before it completes.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + bytes` must stay a live device allocation until the stream
    /// has been synchronized.
    pub unsafe fn memset_async(ptr: *mut u8, value: u8, bytes: usize, stream: &Stream) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        runtime::device_memset_async(ptr, value, bytes, stream.raw())
    }
}

// ===== Copies =====

/// Copy `bytes` bytes from `src` in space `S` to `dst` in space `D`, blocking
/// until the copy is complete.
///
/// # Safety
///
/// Both ranges must be valid in their spaces for `bytes` bytes.
pub unsafe fn memcpy<D: MemorySpace, S: MemorySpace>(dst: *mut u8, src: *const u8, bytes: usize) -> Result<()> {
    if bytes == 0 {
        return Ok(());
    }
    let direction = Direction::between(S::KIND, D::KIND);
    let start = Instant::now();
    runtime::memcpy(dst, src, bytes, direction)?;
    gint_tracing::performance::record_transfer(bytes, direction.tag(), start.elapsed().as_micros() as u64);
    Ok(())
}

/// Enqueue a copy of `bytes` bytes on `stream`.
///
/// # Safety
///
/// Both ranges must stay valid until the stream has been synchronized. Host
/// ranges should be page-locked ([`Host`] allocations or registered with
/// [`crate::register_pointer`]) for the copy to overlap with host work.
pub unsafe fn memcpy_async<D: MemorySpace, S: MemorySpace>(
    dst: *mut u8,
    src: *const u8,
    bytes: usize,
    stream: &Stream,
) -> Result<()> {
    if bytes == 0 {
        return Ok(());
    }
    let direction = Direction::between(S::KIND, D::KIND);
    tracing::trace!(bytes, direction = direction.tag(), stream = stream.id(), "enqueue copy");
    runtime::memcpy_async(dst, src, bytes, direction, stream.raw())
}

/// Copy `n` elements from `src` (space `S`) to `dst` (space `D`).
///
/// # Safety
///
/// As for [`memcpy`], with the ranges measured in elements of `T`.
pub unsafe fn copy<T: Pod, D: MemorySpace, S: MemorySpace>(src: *const T, n: usize, dst: *mut T) -> Result<()> {
    memcpy::<D, S>(dst.cast(), src.cast(), n * std::mem::size_of::<T>())
}

/// Stream-ordered variant of [`copy`].
///
/// # Safety
///
/// As for [`memcpy_async`], with the ranges measured in elements of `T`.
pub unsafe fn copy_async<T: Pod, D: MemorySpace, S: MemorySpace>(
    src: *const T,
    n: usize,
    dst: *mut T,
    stream: &Stream,
) -> Result<()> {
    memcpy_async::<D, S>(dst.cast(), src.cast(), n * std::mem::size_of::<T>(), stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_spaces() {
        assert_eq!(Direction::between(SpaceKind::Host, SpaceKind::Device), Direction::HostToDevice);
        assert_eq!(Direction::between(SpaceKind::Device, SpaceKind::Host).tag(), "D2H");
        for direction in [
            Direction::HostToHost,
            Direction::HostToDevice,
            Direction::DeviceToHost,
            Direction::DeviceToDevice,
        ] {
            assert_eq!(Direction::between(direction.source(), direction.destination()), direction);
        }
    }

    #[test]
    fn zero_byte_allocation_is_null() {
        assert!(Host::allocate(0).unwrap().is_null());
        assert!(Device::allocate(0).unwrap().is_null());
        unsafe {
            Host::free(std::ptr::null_mut()).unwrap();
            Device::free(std::ptr::null_mut()).unwrap();
        }
    }

    #[test]
    fn allocations_are_aligned() {
        let host = Host::allocate(24).unwrap();
        let device = Device::allocate(24).unwrap();
        assert_eq!(host as usize % ALLOCATION_ALIGNMENT, 0);
        assert_eq!(device as usize % ALLOCATION_ALIGNMENT, 0);
        unsafe {
            Host::free(host).unwrap();
            Device::free(device).unwrap();
        }
    }

    #[test]
    fn typed_copy_through_device() {
        let src = [1.5f64, -2.0, 3.25];
        let bytes = std::mem::size_of_val(&src);
        let mut out = [0.0f64; 3];
        unsafe {
            let device = Device::allocate(bytes).unwrap().cast::<f64>();
            copy::<f64, Device, Host>(src.as_ptr(), src.len(), device).unwrap();
            copy::<f64, Host, Device>(device, src.len(), out.as_mut_ptr()).unwrap();
            Device::free(device.cast()).unwrap();
        }
        assert_eq!(out, src);
    }

    #[test]
    fn device_memset_fills_every_byte() {
        let mut out = [0u8; 64];
        unsafe {
            let device = Device::allocate(64).unwrap();
            Device::memset(device, 0xAB, 64).unwrap();
            memcpy::<Host, Device>(out.as_mut_ptr(), device, 64).unwrap();
            Device::free(device).unwrap();
        }
        assert!(out.iter().all(|&b| b == 0xAB));
    }
}
