//! Declarative description of a grid and a B-spline space.

use std::sync::Arc;

use iga_core::{IgaError, Result, Tolerance};
use iga_grid::Grid;
use iga_math::BBox;
use serde::{Deserialize, Serialize};

use crate::bspline_space::BSplineSpace;
use crate::spline_space::{EndBehaviour, InteriorReg, SplineSpace};

/// Space configuration, outer vectors indexed by component then direction.
///
/// ```json
/// {
///   "knots": [[0.0, 0.5, 1.0], [0.0, 1.0]],
///   "degrees": [[2, 1]],
///   "regularity": "maximum",
///   "end_behaviour": [["interpolatory", "periodic"]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceConfig {
    /// Explicit knot coordinates per direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knots: Option<Vec<Vec<f64>>>,
    /// Number of equally spaced knots on `[0,1]` per direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform_knots: Option<Vec<usize>>,
    pub degrees: Vec<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicities: Option<Vec<Vec<Vec<usize>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regularity: Option<InteriorReg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_behaviour: Option<Vec<Vec<EndBehaviour>>>,
    /// Minimum knot spacing accepted by the grid; defaults to [`Tolerance::default`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<Tolerance>,
}

fn to_array<T, const DIM: usize>(what: &str, items: Vec<T>) -> Result<[T; DIM]> {
    let found = items.len();
    items
        .try_into()
        .map_err(|_| IgaError::mismatch(what.to_string(), DIM, found))
}

impl SpaceConfig {
    pub fn build_grid<const DIM: usize>(&self) -> Result<Grid<DIM>> {
        match (&self.knots, &self.uniform_knots) {
            (Some(knots), None) => Grid::from_knots_with_tolerance(
                to_array("knot directions", knots.clone())?,
                self.tolerance.unwrap_or_default(),
            ),
            (None, Some(n)) => Grid::uniform_in_with_tolerance(
                &BBox::unit(),
                to_array("uniform knot counts", n.clone())?,
                self.tolerance.unwrap_or_default(),
            ),
            _ => Err(IgaError::Configuration(
                "exactly one of `knots` and `uniform_knots` must be given".into(),
            )),
        }
    }

    pub fn build_space<const DIM: usize>(&self, grid: Arc<Grid<DIM>>) -> Result<BSplineSpace<DIM>> {
        let degree = self
            .degrees
            .iter()
            .map(|d| to_array("degree directions", d.clone()))
            .collect::<Result<Vec<[usize; DIM]>>>()?;
        let n_comp = degree.len();

        let interior_mult = match (&self.multiplicities, self.regularity) {
            (Some(_), Some(_)) => {
                return Err(IgaError::Configuration(
                    "`multiplicities` and `regularity` are mutually exclusive".into(),
                ))
            }
            (Some(mults), None) => {
                if mults.len() != n_comp {
                    return Err(IgaError::mismatch("multiplicity components", n_comp, mults.len()));
                }
                mults
                    .iter()
                    .map(|m| to_array("multiplicity directions", m.clone()))
                    .collect::<Result<Vec<_>>>()?
            }
            (None, reg) => SplineSpace::multiplicity_table(&grid, &degree, reg.unwrap_or(InteriorReg::Maximum)),
        };

        let end_behaviour = match &self.end_behaviour {
            Some(ends) => ends
                .iter()
                .map(|e| to_array("end behaviour directions", e.clone()))
                .collect::<Result<Vec<_>>>()?,
            None => vec![std::array::from_fn(|_| EndBehaviour::Interpolatory); n_comp],
        };

        BSplineSpace::new(SplineSpace::new(grid, degree, interior_mult, end_behaviour)?)
    }

    /// Grid and space in one go.
    pub fn build<const DIM: usize>(&self) -> Result<BSplineSpace<DIM>> {
        let grid = Arc::new(self.build_grid::<DIM>()?);
        self.build_space(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ReferenceBasis;

    fn config() -> SpaceConfig {
        SpaceConfig {
            knots: None,
            uniform_knots: Some(vec![4, 3]),
            degrees: vec![vec![2, 1]],
            multiplicities: None,
            regularity: None,
            end_behaviour: None,
            tolerance: None,
        }
    }

    #[test]
    fn test_defaults_give_maximum_regularity() {
        let space = config().build::<2>().unwrap();
        assert_eq!(space.num_basis(), 5 * 3);
    }

    #[test]
    fn test_dimension_checked() {
        assert!(matches!(
            config().build::<3>(),
            Err(IgaError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_grid_source_exclusive() {
        let mut cfg = config();
        cfg.knots = Some(vec![vec![0.0, 1.0], vec![0.0, 1.0]]);
        assert!(matches!(cfg.build_grid::<2>(), Err(IgaError::Configuration(_))));
        cfg.uniform_knots = None;
        assert!(cfg.build_grid::<2>().is_ok());
    }

    #[test]
    fn test_tolerance_limits_knot_spacing() {
        let mut cfg = config();
        cfg.tolerance = Some(Tolerance::new(0.4, 0.0));
        // spacing 1/3 on the first direction is below the tolerance
        assert!(matches!(cfg.build_grid::<2>(), Err(IgaError::InvalidKnots(_))));
        cfg.uniform_knots = Some(vec![2, 3]);
        assert!(cfg.build_grid::<2>().is_ok());

        cfg.uniform_knots = None;
        cfg.knots = Some(vec![vec![0.0, 0.3, 1.0], vec![0.0, 1.0]]);
        assert!(matches!(cfg.build_grid::<2>(), Err(IgaError::InvalidKnots(_))));
        cfg.tolerance = None;
        assert!(cfg.build_grid::<2>().is_ok());
    }

    #[test]
    fn test_regularity_and_multiplicities_exclusive() {
        let mut cfg = config();
        cfg.regularity = Some(InteriorReg::Minimum);
        cfg.multiplicities = Some(vec![vec![vec![1, 1], vec![1]]]);
        assert!(matches!(cfg.build::<2>(), Err(IgaError::Configuration(_))));
    }
}
