//! Host-memory emulation of the accelerator runtime.
//!
//! Device allocations come from the global allocator and are tracked in an
//! address-ordered table so every device access can be bounds checked. Stream
//! operations are queued and only run when the stream (or the whole device)
//! is synchronized, or when memory they might touch is released.

use std::alloc::{self, Layout};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::record_fault;
use crate::error::{Error, Result};
use crate::space::{Direction, SpaceKind, ALLOCATION_ALIGNMENT};

pub(crate) const BACKEND_NAME: &str = "emulated";

/// Live allocations of one space: base address -> length in bytes.
type AllocationTable = Mutex<BTreeMap<usize, usize>>;

static HOST_ALLOCATIONS: AllocationTable = parking_lot::const_mutex(BTreeMap::new());
static DEVICE_ALLOCATIONS: AllocationTable = parking_lot::const_mutex(BTreeMap::new());
static MAPPED_RANGES: AllocationTable = parking_lot::const_mutex(BTreeMap::new());

fn layout(space: SpaceKind, bytes: usize) -> Result<Layout> {
    Layout::from_size_align(bytes, ALLOCATION_ALIGNMENT).map_err(|err| Error::allocation(space, bytes, err.to_string()))
}

fn allocate(table: &AllocationTable, space: SpaceKind, bytes: usize) -> Result<*mut u8> {
    let layout = layout(space, bytes)?;
    // Zeroed so copies out of a fresh device range never read uninitialized
    // bytes.
    // SAFETY: callers never request zero bytes.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(Error::allocation(space, bytes, "out of memory"));
    }
    table.lock().insert(ptr as usize, bytes);
    tracing::trace!(%space, bytes, address = ptr as usize, "allocated");
    Ok(ptr)
}

unsafe fn release(table: &AllocationTable, space: SpaceKind, ptr: *mut u8) -> Result<()> {
    let bytes = table
        .lock()
        .remove(&(ptr as usize))
        .ok_or_else(|| Error::runtime(format!("{space} free"), format!("{ptr:p} is not a live {space} allocation")))?;
    alloc::dealloc(ptr, Layout::from_size_align_unchecked(bytes, ALLOCATION_ALIGNMENT));
    Ok(())
}

/// Whether `address..address + bytes` lies inside one entry of `table`.
fn contains(table: &AllocationTable, address: usize, bytes: usize) -> bool {
    let table = table.lock();
    match table.range(..=address).next_back() {
        Some((&base, &len)) => address
            .checked_add(bytes)
            .is_some_and(|end| end <= base + len),
        None => false,
    }
}

fn check_device_range(address: usize, bytes: usize) -> std::result::Result<(), String> {
    if contains(&DEVICE_ALLOCATIONS, address, bytes) {
        Ok(())
    } else {
        Err(format!("illegal address: {bytes} bytes at {address:#x} are outside every device allocation"))
    }
}

fn check_direction(dst: usize, src: usize, bytes: usize, direction: Direction) -> std::result::Result<(), String> {
    if direction.source() == SpaceKind::Device {
        check_device_range(src, bytes)?;
    }
    if direction.destination() == SpaceKind::Device {
        check_device_range(dst, bytes)?;
    }
    Ok(())
}

// ===== Memory =====

pub(crate) fn host_alloc(bytes: usize) -> Result<*mut u8> {
    allocate(&HOST_ALLOCATIONS, SpaceKind::Host, bytes)
}

pub(crate) unsafe fn host_free(ptr: *mut u8) -> Result<()> {
    drain_all_streams();
    release(&HOST_ALLOCATIONS, SpaceKind::Host, ptr)
}

pub(crate) fn device_alloc(bytes: usize) -> Result<*mut u8> {
    allocate(&DEVICE_ALLOCATIONS, SpaceKind::Device, bytes)
}

pub(crate) unsafe fn device_free(ptr: *mut u8) -> Result<()> {
    drain_all_streams();
    release(&DEVICE_ALLOCATIONS, SpaceKind::Device, ptr)
}

pub(crate) unsafe fn device_memset(ptr: *mut u8, value: u8, bytes: usize) -> Result<()> {
    check_device_range(ptr as usize, bytes).map_err(|message| Error::runtime("device memset", message))?;
    std::ptr::write_bytes(ptr, value, bytes);
    Ok(())
}

pub(crate) unsafe fn device_memset_async(ptr: *mut u8, value: u8, bytes: usize, stream: &RawStream) -> Result<()> {
    let address = ptr as usize;
    stream.enqueue("device memset", move || {
        check_device_range(address, bytes)?;
        // SAFETY: range checked against the live device table above.
        unsafe { std::ptr::write_bytes(address as *mut u8, value, bytes) };
        Ok(())
    });
    Ok(())
}

pub(crate) unsafe fn memcpy(dst: *mut u8, src: *const u8, bytes: usize, direction: Direction) -> Result<()> {
    check_direction(dst as usize, src as usize, bytes, direction)
        .map_err(|message| Error::runtime(format!("memcpy {}", direction.tag()), message))?;
    std::ptr::copy(src, dst, bytes);
    Ok(())
}

pub(crate) unsafe fn memcpy_async(
    dst: *mut u8,
    src: *const u8,
    bytes: usize,
    direction: Direction,
    stream: &RawStream,
) -> Result<()> {
    let (dst, src) = (dst as usize, src as usize);
    stream.enqueue(direction.tag(), move || {
        check_direction(dst, src, bytes, direction)?;
        // SAFETY: device ranges checked above; host ranges are the caller's contract.
        unsafe { std::ptr::copy(src as *const u8, dst as *mut u8, bytes) };
        Ok(())
    });
    Ok(())
}

// ===== Host mapping =====

pub(crate) unsafe fn host_register(ptr: *mut u8, bytes: usize) -> Result<()> {
    MAPPED_RANGES.lock().insert(ptr as usize, bytes);
    Ok(())
}

pub(crate) unsafe fn host_unregister(ptr: *mut u8) -> Result<()> {
    MAPPED_RANGES
        .lock()
        .remove(&(ptr as usize))
        .map(|_| ())
        .ok_or_else(|| Error::runtime("host unregister", format!("{ptr:p} is not mapped")))
}

/// Emulated device addresses of mapped host memory are the host addresses.
pub(crate) fn host_device_pointer(ptr: *mut u8) -> Result<*mut u8> {
    let address = ptr as usize;
    if contains(&MAPPED_RANGES, address, 1) || contains(&HOST_ALLOCATIONS, address, 1) {
        Ok(ptr)
    } else {
        Err(Error::runtime(
            "device pointer",
            format!("{ptr:p} is not in page-locked or registered host memory"),
        ))
    }
}

// ===== Streams =====

type Operation = Box<dyn FnOnce() -> std::result::Result<(), String> + Send>;

#[derive(Default)]
struct Queue {
    pending: Mutex<VecDeque<(&'static str, Operation)>>,
}

impl Queue {
    fn drain(&self) {
        loop {
            let next = self.pending.lock().pop_front();
            let Some((label, operation)) = next else {
                break;
            };
            if let Err(message) = operation() {
                record_fault(format!("{label}: {message}"));
            }
        }
    }
}

static STREAMS: Mutex<Vec<Weak<Queue>>> = parking_lot::const_mutex(Vec::new());

fn drain_all_streams() {
    let live: Vec<Arc<Queue>> = {
        let mut streams = STREAMS.lock();
        streams.retain(|queue| queue.strong_count() > 0);
        streams.iter().filter_map(Weak::upgrade).collect()
    };
    for queue in live {
        queue.drain();
    }
}

pub(crate) struct RawStream {
    queue: Arc<Queue>,
}

impl RawStream {
    pub(crate) fn create() -> Result<Self> {
        let queue = Arc::new(Queue::default());
        STREAMS.lock().push(Arc::downgrade(&queue));
        Ok(Self { queue })
    }

    fn enqueue<F>(&self, label: &'static str, operation: F)
    where
        F: FnOnce() -> std::result::Result<(), String> + Send + 'static,
    {
        self.queue.pending.lock().push_back((label, Box::new(operation)));
    }

    pub(crate) fn synchronize(&self) -> Result<()> {
        self.queue.drain();
        Ok(())
    }
}

impl Drop for RawStream {
    fn drop(&mut self) {
        self.queue.drain();
    }
}

pub(crate) fn device_synchronize() -> Result<()> {
    drain_all_streams();
    Ok(())
}

/// Faults are only produced by queued work, which records them directly.
pub(crate) fn query_fault() -> Option<String> {
    None
}
