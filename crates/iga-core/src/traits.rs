use crate::error::Result;

/// Validate the structural invariants of a grid, space or table.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}
