//! Contracted Cartesian Gaussian shells.

use crate::error::{Error, Result};

/// A point in space.
pub type Double3 = [f64; 3];
/// Shell indices `[a, b, x]`: two primary shells and one auxiliary shell.
pub type Index3 = [usize; 3];

/// Number of Cartesian functions in a shell of angular momentum `l`.
pub const fn nbf(l: usize) -> usize {
    (l + 1) * (l + 2) / 2
}

/// Cartesian exponents `[lx, ly, lz]` of a shell, in canonical order
/// (x-major: `xx, xy, xz, yy, yz, zz` for `l = 2`).
pub fn cartesian_components(l: usize) -> impl Iterator<Item = [usize; 3]> {
    (0..=l).flat_map(move |i| (0..=i).map(move |j| [l - i, i - j, j]))
}

/// `n!!`, with `(-1)!! = 0!! = 1`.
pub(crate) fn double_factorial(n: i64) -> f64 {
    let mut result = 1.0;
    let mut k = n;
    while k > 1 {
        result *= k as f64;
        k -= 2;
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub exponent: f64,
    /// Contraction coefficient with primitive and contraction normalization
    /// folded in.
    pub coefficient: f64,
}

/// A contracted Gaussian shell of angular momentum `l`.
///
/// Coefficients are normalized so the axis-aligned component (`x^l`) has
/// unit self-overlap; mixed components share the same scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    l: usize,
    primitives: Vec<Primitive>,
}

impl Gaussian {
    /// Build a normalized shell from `(exponent, coefficient)` pairs.
    pub fn new(l: usize, primitives: &[(f64, f64)]) -> Result<Self> {
        if primitives.is_empty() {
            return Err(Error::InvalidShell("shell has no primitives".into()));
        }
        if let Some(&(exponent, coefficient)) = primitives
            .iter()
            .find(|(e, c)| !(e.is_finite() && *e > 0.0 && c.is_finite()))
        {
            return Err(Error::InvalidShell(format!(
                "primitive (exponent={exponent}, coefficient={coefficient}) must have a positive finite exponent and a finite coefficient"
            )));
        }

        let mut scaled: Vec<Primitive> = primitives
            .iter()
            .map(|&(exponent, coefficient)| Primitive {
                exponent,
                coefficient: coefficient * primitive_norm(exponent, l),
            })
            .collect();

        let self_overlap = contracted_self_overlap(&scaled, l);
        if !(self_overlap.is_finite() && self_overlap > 0.0) {
            return Err(Error::InvalidShell(format!("contraction has self-overlap {self_overlap}")));
        }
        let scale = self_overlap.sqrt().recip();
        for primitive in &mut scaled {
            primitive.coefficient *= scale;
        }

        Ok(Self { l, primitives: scaled })
    }

    /// A single normalized primitive.
    pub fn primitive(l: usize, exponent: f64) -> Result<Self> {
        Self::new(l, &[(exponent, 1.0)])
    }

    pub fn l(&self) -> usize {
        self.l
    }

    pub fn nbf(&self) -> usize {
        nbf(self.l)
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }
}

/// Normalization of `x^l exp(-a r^2)`.
fn primitive_norm(exponent: f64, l: usize) -> f64 {
    let l = l as i32;
    (2.0 * exponent / std::f64::consts::PI).powf(0.75) * (4.0 * exponent).powf(l as f64 / 2.0)
        / double_factorial(2 * l as i64 - 1).sqrt()
}

fn contracted_self_overlap(primitives: &[Primitive], l: usize) -> f64 {
    let mut sum = 0.0;
    for pi in primitives {
        for pj in primitives {
            let p = pi.exponent + pj.exponent;
            sum += pi.coefficient * pj.coefficient * (std::f64::consts::PI / p).powf(1.5)
                * double_factorial(2 * l as i64 - 1)
                / (2.0 * p).powi(l as i32);
        }
    }
    sum
}

/// A shell placed at a center.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub gaussian: Gaussian,
    pub center: Double3,
}

impl Shell {
    pub fn new(gaussian: Gaussian, center: Double3) -> Self {
        Self { gaussian, center }
    }
}

impl From<(Gaussian, Double3)> for Shell {
    fn from((gaussian, center): (Gaussian, Double3)) -> Self {
        Self { gaussian, center }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_counts_and_order() {
        for l in 0..6 {
            assert_eq!(cartesian_components(l).count(), nbf(l));
            assert!(cartesian_components(l).all(|c| c.iter().sum::<usize>() == l));
        }
        let d: Vec<_> = cartesian_components(2).collect();
        assert_eq!(d, vec![[2, 0, 0], [1, 1, 0], [1, 0, 1], [0, 2, 0], [0, 1, 1], [0, 0, 2]]);
    }

    #[test]
    fn double_factorials() {
        assert_eq!(double_factorial(-1), 1.0);
        assert_eq!(double_factorial(0), 1.0);
        assert_eq!(double_factorial(5), 15.0);
        assert_eq!(double_factorial(6), 48.0);
    }

    #[test]
    fn single_primitive_matches_closed_form() {
        let s = Gaussian::primitive(0, 1.3).unwrap();
        let expected = (2.0 * 1.3 / std::f64::consts::PI).powf(0.75);
        assert!((s.primitives()[0].coefficient - expected).abs() < 1e-12);
    }

    #[test]
    fn contraction_is_unit_normalized() {
        let g = Gaussian::new(1, &[(3.0, 0.2), (0.8, 0.5), (0.2, 0.4)]).unwrap();
        assert!((contracted_self_overlap(g.primitives(), 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_primitives() {
        assert!(matches!(Gaussian::new(0, &[]), Err(Error::InvalidShell(_))));
        assert!(matches!(Gaussian::new(0, &[(-1.0, 1.0)]), Err(Error::InvalidShell(_))));
        assert!(matches!(Gaussian::new(0, &[(1.0, f64::NAN)]), Err(Error::InvalidShell(_))));
        assert!(matches!(Gaussian::new(0, &[(1.0, 0.0)]), Err(Error::InvalidShell(_))));
    }
}
