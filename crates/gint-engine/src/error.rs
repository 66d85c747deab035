//! Error types for kernel dispatch and integral evaluation

use crate::shell::Index3;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No compiled kernel covers this parameter pair. Rebuild with higher
    /// `GINT_MAX_L` / `GINT_MAX_X` to support it.
    #[error("parameters AB={ab} X={x} exceed GINT_MAX_L={l_max} GINT_MAX_X={x_max}")]
    ParametersExceedMaximum {
        ab: usize,
        x: usize,
        l_max: usize,
        x_max: usize,
    },

    #[error("invalid shell: {0}")]
    InvalidShell(String),

    #[error("{basis} shell index {index} out of range (basis has {len} shells)")]
    IndexOutOfRange {
        basis: &'static str,
        index: usize,
        len: usize,
    },

    #[error("destination for {index:?} holds {actual} values, {required} required")]
    DestinationTooSmall {
        index: Index3,
        required: usize,
        actual: usize,
    },

    #[error(transparent)]
    Accelerator(#[from] gint_cuda::Error),
}
