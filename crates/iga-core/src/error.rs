use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IgaError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid knots: {0}")]
    InvalidKnots(String),

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Index out of range for {what}: {index} not in [0, {bound})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("Degenerate weight field: rational denominator {value} is not strictly positive")]
    DegenerateWeight { value: f64 },

    #[error("Degenerate geometry map: Jacobian determinant {value} at a quadrature point")]
    DegenerateMap { value: f64 },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),
}

impl IgaError {
    /// Shorthand for a range check failure.
    pub fn out_of_range(what: &'static str, index: usize, bound: usize) -> Self {
        Self::IndexOutOfRange { what, index, bound }
    }

    pub fn mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    /// Whether the error marks a feature gap rather than bad input.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented(_))
    }
}

/// Fail with `IndexOutOfRange` unless `index < bound`.
pub fn check_range(what: &'static str, index: usize, bound: usize) -> Result<()> {
    if index < bound {
        Ok(())
    } else {
        Err(IgaError::out_of_range(what, index, bound))
    }
}

pub type Result<T> = std::result::Result<T, IgaError>;
