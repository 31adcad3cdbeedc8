//! Refinement notification contract between a grid and the objects built on it.

use std::sync::Arc;

use iga_core::Result;

use crate::grid::Grid;

/// Description of one h-refinement step.
#[derive(Debug, Clone)]
pub struct RefinementEvent<const DIM: usize> {
    directions: [bool; DIM],
    subdivisions: [usize; DIM],
    previous: Arc<Grid<DIM>>,
    inserted: [Vec<f64>; DIM],
}

impl<const DIM: usize> RefinementEvent<DIM> {
    /// Describe the step from `previous` to `refined`.
    pub fn new(
        directions: [bool; DIM],
        subdivisions: [usize; DIM],
        previous: Arc<Grid<DIM>>,
        refined: &Grid<DIM>,
    ) -> Self {
        let inserted = std::array::from_fn(|d| {
            let old = &previous.knots()[d];
            refined.knots()[d]
                .iter()
                .copied()
                .filter(|x| old.binary_search_by(|k| k.total_cmp(x)).is_err())
                .collect()
        });
        Self {
            directions,
            subdivisions,
            previous,
            inserted,
        }
    }

    pub fn directions(&self) -> [bool; DIM] {
        self.directions
    }

    pub fn subdivisions(&self) -> [usize; DIM] {
        self.subdivisions
    }

    /// The grid as it was before refinement.
    pub fn previous(&self) -> &Arc<Grid<DIM>> {
        &self.previous
    }

    /// Knots added in direction `dir`, ascending.
    pub fn inserted_knots(&self, dir: usize) -> &[f64] {
        &self.inserted[dir]
    }
}

/// Receives refinement notifications for a grid it depends on.
///
/// Listeners rebuild whatever they derived from the old grid; `grid` is the
/// refined grid they must switch to.
pub trait RefinementListener<const DIM: usize> {
    fn on_refinement(&mut self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<()>;
}
