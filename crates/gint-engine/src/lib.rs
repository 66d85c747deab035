//! Three-center Gaussian integrals with compile-time kernel dispatch.
//!
//! Kernels are specialized on `(AB, X)`: the summed angular momentum of the
//! primary shell pair and the auxiliary angular momentum. Every pair up to
//! the build-time ceilings [`L_MAX`] and [`X_MAX`] is instantiated ahead of
//! time (see [`dispatch`]); [`Engine3`] picks the right one per request.
//!
//! ```rust
//! use gint_engine::{Engine3, Gaussian, Shell};
//!
//! let s = Gaussian::primitive(0, 1.0)?;
//! let p = Gaussian::primitive(1, 0.5)?;
//! let engine = Engine3::new(
//!     vec![Shell::new(s.clone(), [0.0; 3]), Shell::new(p, [0.0, 0.0, 1.0])],
//!     vec![Shell::new(s, [0.0, 0.0, 0.5])],
//! );
//!
//! let mut values = [0.0; 3];
//! engine.compute([([1, 0, 0], &mut values[..])])?;
//! # Ok::<(), gint_engine::Error>(())
//! ```

mod ceilings;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod shell;

pub use dispatch::{make_kernel, CompiledTable, KernelFactory, KernelTable, L_MAX, X_MAX};
pub use engine::{Engine3, PendingBatch};
pub use error::{Error, Result};
pub use kernel::{FourCenterKernel, Overlap3, Overlap3Factory, Overlap4, Overlap4Factory, ThreeCenterKernel};
pub use shell::{cartesian_components, nbf, Double3, Gaussian, Index3, Primitive, Shell};
