//! Float checks shared by flow integration and tests.

use crate::{KernelError, KernelResult};

/// Bounds for comparing two inventories that went through different but
/// equivalent arithmetic (e.g. summing flows in another order).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerances {
    pub const STRICT: Self = Self::new(1e-12, 1e-9);

    pub const fn new(abs: f64, rel: f64) -> Self {
        Self { abs, rel }
    }

    /// True when `a` and `b` agree within the absolute or the relative bound.
    pub fn accepts(&self, a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        diff <= self.abs || diff <= self.rel * a.abs().max(b.abs())
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self::STRICT
    }
}

pub fn nearly_equal(a: f64, b: f64, tol: Tolerances) -> bool {
    tol.accepts(a, b)
}

/// Pass `value` through, or fail with `NonFinite` naming the field path.
pub fn ensure_finite(value: f64, what: &str) -> KernelResult<f64> {
    if value.is_finite() {
        return Ok(value);
    }
    Err(KernelError::NonFinite {
        what: what.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_bound_scales_with_magnitude() {
        let tol = Tolerances::new(1e-9, 1e-6);
        assert!(tol.accepts(1e6, 1e6 + 0.5));
        assert!(!tol.accepts(1.0, 1.5));
        assert!(nearly_equal(0.1 + 0.2, 0.3, Tolerances::default()));
        assert!(!nearly_equal(0.0, 1e-6, Tolerances::STRICT));
    }

    #[test]
    fn non_finite_names_the_field() {
        assert_eq!(ensure_finite(2.5, "Store(1).a").unwrap(), 2.5);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = ensure_finite(bad, "Store(1).a").unwrap_err();
            assert!(matches!(err, KernelError::NonFinite { ref what, .. } if what == "Store(1).a"));
        }
    }
}
