//! Error types for buffer, stream and registration operations

use crate::space::SpaceKind;

/// Result type for accelerator-resource operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The memory-space allocator refused the request
    #[error("{space} allocation of {bytes} bytes failed: {reason}")]
    Allocation {
        space: SpaceKind,
        bytes: usize,
        reason: String,
    },

    /// `push_back` on a full vector
    #[error("capacity exceeded: vector holds {capacity} elements")]
    CapacityExceeded { capacity: usize },

    /// A runtime call or a previously enqueued asynchronous operation failed
    #[error("{label}: {message}")]
    Runtime { label: String, message: String },

    /// The host range starting at this address is already pinned
    #[error("host pointer {address:#x} is already registered")]
    AlreadyRegistered { address: usize },

    /// No pinned host range starts at this address
    #[error("host pointer {address:#x} is not registered")]
    NotRegistered { address: usize },

    /// Operation not available in this build
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn runtime(label: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Runtime {
            label: label.into(),
            message: message.into(),
        }
    }

    pub(crate) fn allocation(space: SpaceKind, bytes: usize, reason: impl Into<String>) -> Self {
        Error::Allocation {
            space,
            bytes,
            reason: reason.into(),
        }
    }
}

/// Surface the pending runtime fault, if any, as an error tagged with `label`.
///
/// Asynchronous work reports failures only after the fact. Call this after
/// enqueuing work (and after synchronizing when the result matters) so a
/// fault is attributed to the call site that triggered it. The pending fault
/// is cleared by the call.
pub fn ensure_none(label: &str) -> Result<()> {
    match crate::runtime::take_fault() {
        Some(message) => {
            tracing::error!(label, %message, "runtime fault surfaced");
            Err(Error::runtime(label, message))
        }
        None => Ok(()),
    }
}
