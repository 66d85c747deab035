//! Ordered queues of asynchronous accelerator work.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::runtime::{self, RawStream};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// An execution stream.
///
/// Work enqueued on one stream completes in enqueue order. Work on different
/// streams is unordered unless the host synchronizes in between. Dropping a
/// stream waits for its outstanding work.
pub struct Stream {
    raw: RawStream,
    id: u64,
}

impl Stream {
    pub fn new() -> Result<Self> {
        let raw = RawStream::create()?;
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(stream = id, backend = runtime::backend_name(), "created stream");
        Ok(Self { raw, id })
    }

    /// Process-unique identifier, used in log events.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until every operation enqueued so far has completed.
    ///
    /// Fails if a fault is pending, whether raised by this stream's work or
    /// earlier. The fault stays pending until [`crate::ensure_none`] takes it.
    #[tracing::instrument(level = "trace", skip(self), fields(stream = self.id))]
    pub fn synchronize(&self) -> Result<()> {
        self.raw.synchronize()?;
        match runtime::peek_fault() {
            Some(message) => Err(Error::runtime(format!("stream {} synchronize", self.id), message)),
            None => Ok(()),
        }
    }

    pub(crate) fn raw(&self) -> &RawStream {
        &self.raw
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("id", &self.id).finish()
    }
}
