//! Compile-time kernel tables indexed by (AB, X)
//!
//! A table covers every pair with `AB <= 2 * L_MAX` and `X <= X_MAX`. Each
//! cell is a monomorphized call to [`KernelFactory::build`] with `AB` and `X`
//! as const parameters, so every specialization is compiled ahead of time and
//! selecting one at runtime is a bounds-checked array lookup.
//!
//! Tables are declared with [`kernel_table!`](crate::kernel_table). The
//! crate's own [`CompiledTable`] is generated by `build.rs` from
//! `GINT_MAX_L` / `GINT_MAX_X`:
//!
//! ```rust
//! use gint_engine::dispatch::{make_kernel, KernelFactory};
//!
//! struct Pair;
//!
//! impl KernelFactory for Pair {
//!     type Kernel = (usize, usize);
//!
//!     fn build<const AB: usize, const X: usize>(&self) -> (usize, usize) {
//!         (AB, X)
//!     }
//! }
//!
//! assert_eq!(make_kernel(&Pair, 2, 1)?, (2, 1));
//! assert!(make_kernel(&Pair, 2 * gint_engine::L_MAX + 1, 0).is_err());
//! # Ok::<(), gint_engine::Error>(())
//! ```

use crate::error::Result;

pub use crate::ceilings::{CompiledTable, L_MAX, X_MAX};

/// Builds the kernel specialized for one (AB, X) pair.
pub trait KernelFactory {
    type Kernel;

    fn build<const AB: usize, const X: usize>(&self) -> Self::Kernel;
}

/// A fixed grid of factory cells.
pub trait KernelTable {
    const L_MAX: usize;
    const X_MAX: usize;
    const AB_COUNT: usize = 2 * Self::L_MAX + 1;
    const X_COUNT: usize = Self::X_MAX + 1;

    /// Build the kernel for (ab, x), or fail with
    /// [`crate::Error::ParametersExceedMaximum`] outside the grid.
    fn make_kernel<F: KernelFactory>(factory: &F, ab: usize, x: usize) -> Result<F::Kernel>;

    fn contains(ab: usize, x: usize) -> bool {
        ab < Self::AB_COUNT && x < Self::X_COUNT
    }

    fn cells() -> usize {
        Self::AB_COUNT * Self::X_COUNT
    }
}

/// Table cell body. Public for macro expansion only.
#[doc(hidden)]
pub fn instantiate<F: KernelFactory, const AB: usize, const X: usize>(factory: &F) -> F::Kernel {
    factory.build::<AB, X>()
}

/// Look up (ab, x) in [`CompiledTable`].
pub fn make_kernel<F: KernelFactory>(factory: &F, ab: usize, x: usize) -> Result<F::Kernel> {
    CompiledTable::make_kernel(factory, ab, x)
}

/// Declare a unit struct implementing [`KernelTable`] over explicit AB and X
/// lists.
///
/// The lists must be exactly `0..=2 * l_max` and `0..=x_max`; a list of the
/// wrong length or with any value out of place does not compile.
///
/// ```rust
/// gint_engine::kernel_table! {
///     pub SmallTable { l_max: 1, x_max: 0, ab: [0, 1, 2], x: [0] }
/// }
/// ```
///
/// ```compile_fail
/// gint_engine::kernel_table! {
///     pub Skipped { l_max: 1, x_max: 0, ab: [0, 1, 3], x: [0] }
/// }
/// ```
///
/// ```compile_fail
/// gint_engine::kernel_table! {
///     pub Shuffled { l_max: 0, x_max: 1, ab: [0], x: [1, 0] }
/// }
/// ```
#[macro_export]
macro_rules! kernel_table {
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident {
            l_max: $l_max:tt,
            x_max: $x_max:tt,
            ab: [$($ab:tt),+ $(,)?],
            x: $xs:tt $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        $vis struct $name;

        const _: () = {
            let ab: &[usize] = &[$($ab),+];
            let xs: &[usize] = &$xs;
            let mut i = 0;
            while i < ab.len() {
                assert!(ab[i] == i, "kernel_table!: ab list must be 0..=2 * l_max in order");
                i += 1;
            }
            let mut i = 0;
            while i < xs.len() {
                assert!(xs[i] == i, "kernel_table!: x list must be 0..=x_max in order");
                i += 1;
            }
        };

        impl $crate::dispatch::KernelTable for $name {
            const L_MAX: usize = $l_max;
            const X_MAX: usize = $x_max;

            fn make_kernel<F: $crate::dispatch::KernelFactory>(
                factory: &F,
                ab: usize,
                x: usize,
            ) -> $crate::Result<F::Kernel> {
                struct Cells<G>(::core::marker::PhantomData<G>);

                impl<G: $crate::dispatch::KernelFactory> Cells<G> {
                    const TABLE: [[fn(&G) -> G::Kernel; $x_max + 1]; 2 * $l_max + 1] =
                        [$($crate::__kernel_table_row!(G, $ab, $xs)),+];
                }

                match Cells::<F>::TABLE.get(ab).and_then(|row| row.get(x)) {
                    Some(cell) => Ok(cell(factory)),
                    None => Err($crate::Error::ParametersExceedMaximum {
                        ab,
                        x,
                        l_max: $l_max,
                        x_max: $x_max,
                    }),
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __kernel_table_row {
    ($factory:ident, $ab:tt, [$($x:tt),+ $(,)?]) => {
        [$(
            $crate::dispatch::instantiate::<$factory, $ab, $x>
                as fn(&$factory) -> <$factory as $crate::dispatch::KernelFactory>::Kernel
        ),+]
    };
}
