//! Kernel interfaces by arity.
//!
//! A kernel is specialized for one (AB, X) pair and a fixed set of shells; it
//! is then evaluated at any number of center positions. Results are laid out
//! with the last shell's components varying fastest.

mod overlap;

pub use overlap::{Overlap3, Overlap3Factory, Overlap4, Overlap4Factory};

use crate::shell::Double3;

/// Two primary shells and one auxiliary shell.
pub trait ThreeCenterKernel {
    /// Evaluate at the given centers. The returned slice is the kernel's
    /// buffer and stays valid until the next call.
    fn compute(&mut self, a: &Double3, b: &Double3, x: &Double3) -> &[f64];

    /// Results of the most recent [`ThreeCenterKernel::compute`].
    fn buffer(&self) -> &[f64];
}

/// Two primary shell pairs.
pub trait FourCenterKernel {
    fn compute(&mut self, a: &Double3, b: &Double3, c: &Double3, d: &Double3) -> &[f64];
}
