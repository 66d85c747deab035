//! Three-center integral engine.
//!
//! The engine owns two shell lists: the primary basis (indexed by `a` and `b`)
//! and the auxiliary basis (indexed by `x`). Each request names a shell triple
//! `[a, b, x]`; the engine selects the kernel for `(la + lb, lx)` from the
//! compiled table and writes `nbf(a) * nbf(b) * nbf(x)` values, `x` fastest,
//! to the request's destination.

use std::mem;
use std::time::Instant;

use gint_cuda::{ensure_none, Host, MemorySpace, Stream, Vector};
use gint_tracing::perf_span;

use crate::dispatch::make_kernel;
use crate::error::{Error, Result};
use crate::kernel::{Overlap3Factory, ThreeCenterKernel};
use crate::shell::{Index3, Shell};

pub struct Engine3 {
    basis: Vec<Shell>,
    df_basis: Vec<Shell>,
    /// Page-locked staging for batched uploads, reused across batches.
    staging: Vector<f64, Host>,
}

impl Engine3 {
    pub fn new(basis: Vec<Shell>, df_basis: Vec<Shell>) -> Self {
        tracing::debug!(basis = basis.len(), df_basis = df_basis.len(), "engine created");
        Self {
            basis,
            df_basis,
            staging: Vector::new(),
        }
    }

    pub fn basis(&self) -> &[Shell] {
        &self.basis
    }

    pub fn df_basis(&self) -> &[Shell] {
        &self.df_basis
    }

    fn shells(&self, index: Index3) -> Result<[&Shell; 3]> {
        let [a, b, x] = index;
        let primary = |i: usize| {
            self.basis.get(i).ok_or(Error::IndexOutOfRange {
                basis: "primary",
                index: i,
                len: self.basis.len(),
            })
        };
        let auxiliary = self.df_basis.get(x).ok_or(Error::IndexOutOfRange {
            basis: "auxiliary",
            index: x,
            len: self.df_basis.len(),
        })?;
        Ok([primary(a)?, primary(b)?, auxiliary])
    }

    /// Number of values written for `index`.
    pub fn integral_count(&self, index: Index3) -> Result<usize> {
        let [a, b, x] = self.shells(index)?;
        Ok(a.gaussian.nbf() * b.gaussian.nbf() * x.gaussian.nbf())
    }

    /// The kernel for one shell triple, not yet evaluated.
    pub fn kernel(&self, index: Index3) -> Result<Box<dyn ThreeCenterKernel + '_>> {
        let [a, b, x] = self.shells(index)?;
        let factory = Overlap3Factory::new(&a.gaussian, &b.gaussian, &x.gaussian);
        let (ab, lx) = factory.parameters();
        make_kernel(&factory, ab, lx)
    }

    fn evaluate_into(&self, index: Index3, destination: &mut [f64]) -> Result<usize> {
        let [a, b, x] = self.shells(index)?;
        let required = a.gaussian.nbf() * b.gaussian.nbf() * x.gaussian.nbf();
        if destination.len() < required {
            return Err(Error::DestinationTooSmall {
                index,
                required,
                actual: destination.len(),
            });
        }
        let mut kernel = self.kernel(index)?;
        let values = kernel.compute(&a.center, &b.center, &x.center);
        destination[..required].copy_from_slice(values);
        Ok(required)
    }

    /// Evaluate every `(index, destination)` request into host memory.
    ///
    /// Requests are processed in order; a failing request stops the batch and
    /// leaves earlier destinations written.
    pub fn compute<'d, I>(&self, list: I) -> Result<()>
    where
        I: IntoIterator<Item = (Index3, &'d mut [f64])>,
    {
        let _span = perf_span!("engine3_compute");
        let start = Instant::now();
        let mut written = 0;
        for (index, destination) in list {
            written += self.evaluate_into(index, destination)?;
        }
        gint_tracing::performance::record_throughput("engine3_compute", written, start.elapsed().as_micros() as u64);
        Ok(())
    }

    /// Evaluate `list` into the page-locked staging buffer and enqueue one
    /// upload of all values into `out` on `stream`.
    ///
    /// Values for request `i` start at `offsets()[i]` in `out`. The engine,
    /// `out` and `stream` stay borrowed until the batch is waited on or
    /// dropped.
    #[tracing::instrument(skip(self, list, out, stream), fields(requests = list.len(), space = %M::KIND, stream = stream.id()))]
    pub fn compute_batch<'s, M: MemorySpace>(
        &'s mut self,
        list: &[Index3],
        out: &'s mut Vector<f64, M>,
        stream: &'s Stream,
    ) -> Result<PendingBatch<'s, M>> {
        let mut offsets = Vec::with_capacity(list.len());
        let mut total = 0;
        for &index in list {
            offsets.push(total);
            total += self.integral_count(index)?;
        }

        let mut staging = mem::take(&mut self.staging);
        let evaluated = staging.resize(total).map_err(Error::from).and_then(|()| {
            list.iter()
                .zip(&offsets)
                .try_for_each(|(&index, &offset)| self.evaluate_into(index, &mut staging[offset..]).map(|_| ()))
        });
        self.staging = staging;
        evaluated?;

        // SAFETY: the staging buffer and `out` stay borrowed by the returned
        // batch, which synchronizes `stream` before releasing them.
        unsafe { out.assign_raw_async::<Host>(self.staging.as_ptr(), total, stream)? };

        // From here on an early return drops the batch, which waits for the
        // queued upload before the borrows end.
        let batch = PendingBatch {
            stream,
            _staging: &self.staging,
            _out: out,
            offsets,
            waited: false,
        };
        ensure_none("Engine3::compute_batch")?;
        Ok(batch)
    }
}

/// An upload enqueued by [`Engine3::compute_batch`].
///
/// Dropping the batch without [`PendingBatch::wait`] still synchronizes the
/// stream, logging any failure.
#[must_use = "the upload is only complete after wait()"]
pub struct PendingBatch<'s, M: MemorySpace> {
    stream: &'s Stream,
    _staging: &'s Vector<f64, Host>,
    _out: &'s mut Vector<f64, M>,
    offsets: Vec<usize>,
    waited: bool,
}

impl<M: MemorySpace> PendingBatch<'_, M> {
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Block until the upload completes and surface any fault it raised.
    /// Returns the per-request offsets into the destination vector.
    pub fn wait(mut self) -> Result<Vec<usize>> {
        self.waited = true;
        self.stream.synchronize()?;
        ensure_none("Engine3::compute_batch")?;
        Ok(mem::take(&mut self.offsets))
    }
}

impl<M: MemorySpace> Drop for PendingBatch<'_, M> {
    fn drop(&mut self) {
        if !self.waited {
            if let Err(err) = self.stream.synchronize() {
                tracing::error!(%err, stream = self.stream.id(), "pending batch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Gaussian;

    fn engine() -> Engine3 {
        let s = Gaussian::new(0, &[(1.2, 0.4), (0.3, 0.7)]).unwrap();
        let p = Gaussian::primitive(1, 0.9).unwrap();
        let d = Gaussian::primitive(2, 0.5).unwrap();
        Engine3::new(
            vec![Shell::new(s.clone(), [0.0, 0.0, 0.0]), Shell::new(p, [0.0, 0.0, 1.4])],
            vec![Shell::new(s, [0.5, 0.0, 0.7]), Shell::new(d, [0.0, 0.3, 0.7])],
        )
    }

    #[test]
    fn counts_follow_shell_sizes() {
        let engine = engine();
        assert_eq!(engine.integral_count([0, 0, 0]).unwrap(), 1);
        assert_eq!(engine.integral_count([1, 1, 1]).unwrap(), 3 * 3 * 6);
    }

    #[test]
    fn out_of_range_indices_are_reported() {
        let engine = engine();
        assert!(matches!(
            engine.integral_count([2, 0, 0]),
            Err(Error::IndexOutOfRange { basis: "primary", index: 2, len: 2 })
        ));
        assert!(matches!(
            engine.integral_count([0, 0, 5]),
            Err(Error::IndexOutOfRange { basis: "auxiliary", index: 5, len: 2 })
        ));
    }

    #[test]
    fn compute_matches_direct_kernel() {
        let engine = engine();
        let mut values = vec![0.0; 18];
        engine.compute([([1, 0, 1], values.as_mut_slice())]).unwrap();

        let mut kernel = engine.kernel([1, 0, 1]).unwrap();
        let [a, b, x] = engine.shells([1, 0, 1]).unwrap();
        assert_eq!(kernel.compute(&a.center, &b.center, &x.center), &values[..]);
    }

    #[test]
    fn short_destination_is_rejected() {
        let engine = engine();
        let mut values = vec![0.0; 2];
        let err = engine.compute([([1, 1, 0], values.as_mut_slice())]).unwrap_err();
        assert!(matches!(err, Error::DestinationTooSmall { required: 9, actual: 2, .. }));
    }
}
