//! Cartesian grids for tensor-product spline spaces.

pub mod element;
pub mod grid;
pub mod refinement;

pub use element::{ElementHandle, ElementIter, GridElement};
pub use grid::{Grid, GridId};
pub use refinement::{RefinementEvent, RefinementListener};
