/// Tolerances for comparisons of knot coordinates and weight sums.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Absolute tolerance (in parameter units)
    pub absolute: f64,
    /// Relative tolerance, scaled by the magnitude of the compared values
    pub relative: f64,
}

impl Tolerance {
    pub const DEFAULT_ABSOLUTE: f64 = 1e-12;
    pub const DEFAULT_RELATIVE: f64 = 1e-10;

    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    pub fn default_precision() -> Self {
        Self {
            absolute: Self::DEFAULT_ABSOLUTE,
            relative: Self::DEFAULT_RELATIVE,
        }
    }

    pub fn loose() -> Self {
        Self {
            absolute: 1e-8,
            relative: 1e-6,
        }
    }

    pub fn tight() -> Self {
        Self {
            absolute: 1e-14,
            relative: 1e-13,
        }
    }

    /// Check if two values are equal within the absolute or relative tolerance
    pub fn approx_eq(self, a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        diff <= self.absolute || diff <= self.relative * a.abs().max(b.abs())
    }

    /// Check if a value is zero within absolute tolerance
    pub fn is_zero(self, v: f64) -> bool {
        v.abs() <= self.absolute
    }

    /// Check that `b` is strictly greater than `a` by more than the tolerance
    pub fn strictly_less(self, a: f64, b: f64) -> bool {
        b > a && !self.approx_eq(a, b)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::default_precision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_relative() {
        let tol = Tolerance::default();
        assert!(tol.approx_eq(1e6, 1e6 + 1e-6));
        assert!(!tol.approx_eq(1.0, 1.0 + 1e-6));
    }

    #[test]
    fn test_strictly_less() {
        let tol = Tolerance::default();
        assert!(tol.strictly_less(0.0, 1.0));
        assert!(!tol.strictly_less(1.0, 1.0 + 1e-15));
        assert!(!tol.strictly_less(2.0, 1.0));
    }
}
