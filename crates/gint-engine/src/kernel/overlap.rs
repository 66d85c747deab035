//! Host reference kernels: overlap integrals over products of three or four
//! contracted Cartesian Gaussians.
//!
//! The Gaussian product theorem collapses each primitive product onto one
//! center P with exponent p. What remains factorizes per axis into
//! `∫ Π_k (t + P - A_k)^{l_k} exp(-p t²) dt`, which is a polynomial in t
//! integrated against a Gaussian.

use std::array;

use crate::dispatch::KernelFactory;
use crate::kernel::{FourCenterKernel, ThreeCenterKernel};
use crate::shell::{cartesian_components, double_factorial, Double3, Gaussian};

/// `∫ t^n exp(-p t²) dt` over the real line.
fn gaussian_moment(n: usize, p: f64) -> f64 {
    if n % 2 == 1 {
        return 0.0;
    }
    double_factorial(n as i64 - 1) / (2.0 * p).powi((n / 2) as i32) * (std::f64::consts::PI / p).sqrt()
}

/// `∫ Π_k (t + d_k)^{l_k} exp(-p t²) dt` for `factors = (l_k, d_k)`.
/// `poly` is scratch space for the expanded coefficients.
fn overlap_1d(p: f64, poly: &mut Vec<f64>, factors: impl Iterator<Item = (usize, f64)>) -> f64 {
    poly.clear();
    poly.push(1.0);
    for (power, shift) in factors {
        for _ in 0..power {
            poly.push(0.0);
            for i in (1..poly.len()).rev() {
                poly[i] = poly[i - 1] + shift * poly[i];
            }
            poly[0] *= shift;
        }
    }
    poly.iter()
        .enumerate()
        .step_by(2)
        .map(|(n, c)| c * gaussian_moment(n, p))
        .sum()
}

fn distance_squared(a: &Double3, b: &Double3) -> f64 {
    (0..3).map(|axis| (a[axis] - b[axis]).powi(2)).sum()
}

/// Odometer step with the last digit fastest. Returns false after wrapping.
fn advance<const N: usize>(digits: &mut [usize; N], limits: &[usize; N]) -> bool {
    for k in (0..N).rev() {
        digits[k] += 1;
        if digits[k] < limits[k] {
            return true;
        }
        digits[k] = 0;
    }
    false
}

/// Overlap block over N shells.
struct OverlapBlock<'a, const N: usize> {
    shells: [&'a Gaussian; N],
    components: [Vec<[usize; 3]>; N],
    poly: Vec<f64>,
    values: Vec<f64>,
}

impl<'a, const N: usize> OverlapBlock<'a, N> {
    fn new(shells: [&'a Gaussian; N], max_degree: usize) -> Self {
        let components = shells.map(|shell| cartesian_components(shell.l()).collect::<Vec<_>>());
        let size = components.iter().map(Vec::len).product();
        Self {
            shells,
            components,
            poly: Vec::with_capacity(max_degree + 1),
            values: vec![0.0; size],
        }
    }

    fn evaluate(&mut self, centers: [&Double3; N]) -> &[f64] {
        self.values.fill(0.0);
        let primitive_counts = self.shells.map(|shell| shell.primitives().len());
        let component_counts: [usize; N] = array::from_fn(|k| self.components[k].len());

        let mut primitive = [0usize; N];
        loop {
            let alphas: [f64; N] = array::from_fn(|k| self.shells[k].primitives()[primitive[k]].exponent);
            let coefficient: f64 = (0..N)
                .map(|k| self.shells[k].primitives()[primitive[k]].coefficient)
                .product();
            let p: f64 = alphas.iter().sum();
            let center_p: Double3 =
                array::from_fn(|axis| (0..N).map(|k| alphas[k] * centers[k][axis]).sum::<f64>() / p);

            let mut exponent = 0.0;
            for i in 0..N {
                for j in i + 1..N {
                    exponent += alphas[i] * alphas[j] * distance_squared(centers[i], centers[j]);
                }
            }
            let weight = coefficient * (-exponent / p).exp();

            let mut component = [0usize; N];
            let mut index = 0;
            loop {
                let mut value = weight;
                for axis in 0..3 {
                    let factors = (0..N).map(|k| (self.components[k][component[k]][axis], center_p[axis] - centers[k][axis]));
                    value *= overlap_1d(p, &mut self.poly, factors);
                }
                self.values[index] += value;
                index += 1;
                if !advance(&mut component, &component_counts) {
                    break;
                }
            }

            if !advance(&mut primitive, &primitive_counts) {
                break;
            }
        }
        &self.values
    }
}

/// `(a b | x)` overlap, specialized for `la + lb = AB` and `lx = X`.
pub struct Overlap3<'a, const AB: usize, const X: usize> {
    block: OverlapBlock<'a, 3>,
}

impl<'a, const AB: usize, const X: usize> Overlap3<'a, AB, X> {
    pub fn new(a: &'a Gaussian, b: &'a Gaussian, x: &'a Gaussian) -> Self {
        debug_assert_eq!(a.l() + b.l(), AB);
        debug_assert_eq!(x.l(), X);
        Self {
            block: OverlapBlock::new([a, b, x], AB + X),
        }
    }
}

impl<const AB: usize, const X: usize> ThreeCenterKernel for Overlap3<'_, AB, X> {
    fn compute(&mut self, a: &Double3, b: &Double3, x: &Double3) -> &[f64] {
        self.block.evaluate([a, b, x])
    }

    fn buffer(&self) -> &[f64] {
        &self.block.values
    }
}

/// `(a b | c d)` overlap, specialized for `la + lb = AB` and `lc + ld = CD`.
pub struct Overlap4<'a, const AB: usize, const CD: usize> {
    block: OverlapBlock<'a, 4>,
}

impl<'a, const AB: usize, const CD: usize> Overlap4<'a, AB, CD> {
    pub fn new(a: &'a Gaussian, b: &'a Gaussian, c: &'a Gaussian, d: &'a Gaussian) -> Self {
        debug_assert_eq!(a.l() + b.l(), AB);
        debug_assert_eq!(c.l() + d.l(), CD);
        Self {
            block: OverlapBlock::new([a, b, c, d], AB + CD),
        }
    }
}

impl<const AB: usize, const CD: usize> FourCenterKernel for Overlap4<'_, AB, CD> {
    fn compute(&mut self, a: &Double3, b: &Double3, c: &Double3, d: &Double3) -> &[f64] {
        self.block.evaluate([a, b, c, d])
    }
}

/// Builds [`Overlap3`] kernels for one shell triple.
#[derive(Debug, Clone, Copy)]
pub struct Overlap3Factory<'a> {
    pub a: &'a Gaussian,
    pub b: &'a Gaussian,
    pub x: &'a Gaussian,
}

impl<'a> Overlap3Factory<'a> {
    pub fn new(a: &'a Gaussian, b: &'a Gaussian, x: &'a Gaussian) -> Self {
        Self { a, b, x }
    }

    /// The (AB, X) pair selecting this triple's kernel.
    pub fn parameters(&self) -> (usize, usize) {
        (self.a.l() + self.b.l(), self.x.l())
    }
}

impl<'a> KernelFactory for Overlap3Factory<'a> {
    type Kernel = Box<dyn ThreeCenterKernel + 'a>;

    fn build<const AB: usize, const X: usize>(&self) -> Self::Kernel {
        Box::new(Overlap3::<AB, X>::new(self.a, self.b, self.x))
    }
}

/// Builds [`Overlap4`] kernels for one shell quartet. Dispatch uses
/// `(la + lb, lc + ld)` as the (AB, X) pair.
#[derive(Debug, Clone, Copy)]
pub struct Overlap4Factory<'a> {
    pub a: &'a Gaussian,
    pub b: &'a Gaussian,
    pub c: &'a Gaussian,
    pub d: &'a Gaussian,
}

impl<'a> Overlap4Factory<'a> {
    pub fn new(a: &'a Gaussian, b: &'a Gaussian, c: &'a Gaussian, d: &'a Gaussian) -> Self {
        Self { a, b, c, d }
    }

    pub fn parameters(&self) -> (usize, usize) {
        (self.a.l() + self.b.l(), self.c.l() + self.d.l())
    }
}

impl<'a> KernelFactory for Overlap4Factory<'a> {
    type Kernel = Box<dyn FourCenterKernel + 'a>;

    fn build<const AB: usize, const CD: usize>(&self) -> Self::Kernel {
        Box::new(Overlap4::<AB, CD>::new(self.a, self.b, self.c, self.d))
    }
}
