//! Typed numeric buffers in host and accelerator memory.
//!
//! - [`Vector<T, M>`]: resizable buffer whose backing store and release
//!   function come from the memory space `M` ([`Host`] or [`Device`])
//! - [`Stream`]: ordered queue of asynchronous copies and fills
//! - [`register_pointer`] / [`device_pointer`]: page-locking of caller-owned
//!   host memory and its accelerator-side address
//! - [`ensure_none`]: surfaces faults raised by asynchronous work
//!
//! The `cuda` feature backs the device space with the CUDA driver. Without
//! it, device memory is emulated in host memory and stream work is deferred
//! until synchronization.

pub mod error;
pub mod pinned;
mod runtime;
pub mod shared;
pub mod space;
pub mod stream;
pub mod vector;

pub use error::{ensure_none, Error, Result};
pub use pinned::{device_pointer, register_pointer, unregister_pointer, Pinned};
pub use runtime::{backend_name, synchronize};
pub use shared::{make_shared, SharedArray};
pub use space::{copy, copy_async, Device, Direction, Host, MemorySpace, SpaceKind};
pub use stream::Stream;
pub use vector::{memset, memset_async, DeviceVector, HostVector, Vector};
