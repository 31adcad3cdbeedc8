//! Tensor-product Cartesian grid: one strictly increasing knot sequence per direction.

use std::collections::BTreeMap;
use std::sync::Arc;

use iga_core::error::check_range;
use iga_core::traits::Validate;
use iga_core::{EntityId, IgaError, Result, Tolerance};
use iga_math::{BBox, TensorIndex, TensorSize, TensorSizedContainer};
use log::debug;

use crate::element::{ElementHandle, ElementIter, GridElement};
use crate::refinement::RefinementEvent;

/// Identity shared by a grid and all grids obtained from it by refinement.
pub type GridId = EntityId;

/// Grid in `DIM`-dimensional parameter space with Cartesian-product structure.
///
/// Knots are stored without repetition. Elements are the products of the
/// intervals between consecutive knots and are numbered row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<const DIM: usize> {
    id: GridId,
    revision: u64,
    knots: [Vec<f64>; DIM],
    elements: TensorSizedContainer<DIM>,
}

impl<const DIM: usize> Grid<DIM> {
    /// Uniform grid of `[0,1]^DIM` with `n_knots[d]` equally spaced knots in direction `d`.
    pub fn uniform(n_knots: [usize; DIM]) -> Result<Self> {
        Self::uniform_in(&BBox::unit(), n_knots)
    }

    /// Uniform grid of the box `bbox` with `n_knots[d]` equally spaced knots in direction `d`.
    pub fn uniform_in(bbox: &BBox<DIM>, n_knots: [usize; DIM]) -> Result<Self> {
        Self::uniform_in_with_tolerance(bbox, n_knots, Tolerance::default())
    }

    /// As [`Grid::uniform_in`], with the knot spacing checked against `tol`.
    pub fn uniform_in_with_tolerance(bbox: &BBox<DIM>, n_knots: [usize; DIM], tol: Tolerance) -> Result<Self> {
        let mut knots: [Vec<f64>; DIM] = std::array::from_fn(|_| Vec::new());
        for d in 0..DIM {
            let n = n_knots[d];
            if n < 2 {
                return Err(IgaError::InvalidKnots(format!(
                    "direction {} needs at least 2 knots, got {}",
                    d, n
                )));
            }
            let (a, b) = (bbox.min[d], bbox.max[d]);
            let h = (b - a) / (n - 1) as f64;
            knots[d] = (0..n)
                .map(|i| if i == n - 1 { b } else { a + i as f64 * h })
                .collect();
        }
        Self::from_knots_with_tolerance(knots, tol)
    }

    /// Grid from explicit knot coordinates, checked with the default tolerance.
    pub fn from_knots(knots: [Vec<f64>; DIM]) -> Result<Self> {
        Self::from_knots_with_tolerance(knots, Tolerance::default())
    }

    /// Grid from explicit knot coordinates.
    ///
    /// Each direction must hold at least two strictly increasing knots
    /// (consecutive knots closer than `tol` count as duplicates).
    pub fn from_knots_with_tolerance(knots: [Vec<f64>; DIM], tol: Tolerance) -> Result<Self> {
        check_knots(&knots, tol)?;
        let elements = TensorSizedContainer::new(intervals_of(&knots));
        let grid = Self {
            id: GridId::new(),
            revision: 0,
            knots,
            elements,
        };
        debug!(
            "grid {} created with {:?} intervals",
            grid.id,
            grid.num_intervals().as_array()
        );
        Ok(grid)
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    /// Number of refinements applied since construction.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether `other` is this grid at the same refinement level.
    pub fn same_as(&self, other: &Self) -> bool {
        self.id == other.id && self.revision == other.revision
    }

    pub fn dim(&self) -> usize {
        DIM
    }

    pub fn knots(&self) -> &[Vec<f64>; DIM] {
        &self.knots
    }

    pub fn knot_coordinates(&self, dir: usize) -> Result<&[f64]> {
        check_range("direction", dir, DIM)?;
        Ok(&self.knots[dir])
    }

    pub fn num_knots_dim(&self) -> TensorSize<DIM> {
        TensorSize(std::array::from_fn(|d| self.knots[d].len()))
    }

    /// Number of intervals along each direction.
    pub fn num_intervals(&self) -> TensorSize<DIM> {
        self.elements.tensor_size()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.flat_size()
    }

    pub fn interval_length(&self, dir: usize, interval: usize) -> Result<f64> {
        check_range("direction", dir, DIM)?;
        check_range("interval", interval, self.knots[dir].len() - 1)?;
        Ok(self.knots[dir][interval + 1] - self.knots[dir][interval])
    }

    /// Interval lengths along each direction.
    pub fn element_lengths(&self) -> [Vec<f64>; DIM] {
        std::array::from_fn(|d| self.knots[d].windows(2).map(|w| w[1] - w[0]).collect())
    }

    pub fn bounding_box(&self) -> BBox<DIM> {
        BBox {
            min: std::array::from_fn(|d| self.knots[d][0]),
            max: std::array::from_fn(|d| self.knots[d][self.knots[d].len() - 1]),
        }
    }

    pub fn tensor_to_flat(&self, index: &TensorIndex<DIM>) -> Result<usize> {
        self.elements.tensor_to_flat(index)
    }

    pub fn flat_to_tensor(&self, flat: usize) -> Result<TensorIndex<DIM>> {
        self.elements.flat_to_tensor(flat)
    }

    /// Handle of the element with flat index `flat`.
    pub fn element_handle(&self, flat: usize) -> Result<ElementHandle<DIM>> {
        let tensor = self.elements.flat_to_tensor(flat)?;
        Ok(ElementHandle { flat, tensor })
    }

    pub fn element(&self, flat: usize) -> Result<GridElement<'_, DIM>> {
        Ok(GridElement::new(self, self.element_handle(flat)?))
    }

    pub fn element_at(&self, tensor: &TensorIndex<DIM>) -> Result<GridElement<'_, DIM>> {
        let flat = self.elements.tensor_to_flat(tensor)?;
        Ok(GridElement::new(
            self,
            ElementHandle {
                flat,
                tensor: *tensor,
            },
        ))
    }

    /// Iterate over all elements in flat order; call again to restart.
    pub fn elements(&self) -> ElementIter<'_, DIM> {
        ElementIter::new(self)
    }

    /// Group points by the element containing them.
    ///
    /// Returns, per flat element index, the point indices together with the
    /// point's coordinates in the element's reference cell `[0,1]^DIM`.
    /// Points on an interior knot belong to the element on its right.
    pub fn find_elements_of_points(
        &self,
        points: &[[f64; DIM]],
    ) -> Result<BTreeMap<usize, Vec<(usize, [f64; DIM])>>> {
        let bbox = self.bounding_box();
        let mut map: BTreeMap<usize, Vec<(usize, [f64; DIM])>> = BTreeMap::new();
        for (ip, p) in points.iter().enumerate() {
            if !bbox.contains_point(p) {
                return Err(IgaError::Configuration(format!(
                    "point {} ({:?}) lies outside the grid domain",
                    ip, p
                )));
            }
            let mut tensor = [0; DIM];
            let mut reference = [0.0; DIM];
            for d in 0..DIM {
                let k = &self.knots[d];
                let last = k.len() - 2;
                let interval = k.partition_point(|&x| x <= p[d]).saturating_sub(1).min(last);
                tensor[d] = interval;
                reference[d] = ((p[d] - k[interval]) / (k[interval + 1] - k[interval])).clamp(0.0, 1.0);
            }
            let flat = self.elements.tensor_to_flat(&tensor)?;
            map.entry(flat).or_default().push((ip, reference));
        }
        Ok(map)
    }

    /// The grid obtained by splitting every interval of each flagged direction
    /// into `subdivisions[d]` equal parts.
    ///
    /// The result keeps this grid's id and bumps its revision.
    pub fn refined(&self, directions: [bool; DIM], subdivisions: [usize; DIM]) -> Result<Self> {
        let mut knots = self.knots.clone();
        for d in 0..DIM {
            if !directions[d] {
                continue;
            }
            let n_sub = subdivisions[d];
            if n_sub < 1 {
                return Err(IgaError::Configuration(format!(
                    "direction {} refined with {} subdivisions",
                    d, n_sub
                )));
            }
            let old = &self.knots[d];
            let mut new = Vec::with_capacity((old.len() - 1) * n_sub + 1);
            for w in old.windows(2) {
                let h = (w[1] - w[0]) / n_sub as f64;
                new.extend((0..n_sub).map(|j| w[0] + j as f64 * h));
            }
            new.push(old[old.len() - 1]);
            knots[d] = new;
        }
        let elements = TensorSizedContainer::new(intervals_of(&knots));
        let grid = Self {
            id: self.id,
            revision: self.revision + 1,
            knots,
            elements,
        };
        debug!(
            "grid {} refined (directions {:?}, subdivisions {:?}): {:?} -> {:?} intervals",
            self.id,
            directions,
            subdivisions,
            self.num_intervals().as_array(),
            grid.num_intervals().as_array()
        );
        Ok(grid)
    }

    /// Refine a shared grid and describe the refinement for listeners.
    pub fn refine_directions(
        self: &Arc<Self>,
        directions: [bool; DIM],
        subdivisions: [usize; DIM],
    ) -> Result<(Arc<Self>, RefinementEvent<DIM>)> {
        let refined = Arc::new(self.refined(directions, subdivisions)?);
        let event = RefinementEvent::new(directions, subdivisions, Arc::clone(self), &refined);
        Ok((refined, event))
    }

    /// Refine all directions with the same number of subdivisions.
    pub fn refine(self: &Arc<Self>, subdivisions: usize) -> Result<(Arc<Self>, RefinementEvent<DIM>)> {
        self.refine_directions([true; DIM], [subdivisions; DIM])
    }
}

impl<const DIM: usize> Validate for Grid<DIM> {
    fn validate(&self) -> Result<()> {
        check_knots(&self.knots, Tolerance::default())?;
        let expected = intervals_of(&self.knots);
        if expected != self.elements.tensor_size() {
            return Err(IgaError::mismatch(
                "grid element count",
                expected.flat_size(),
                self.elements.flat_size(),
            ));
        }
        Ok(())
    }
}

fn intervals_of<const DIM: usize>(knots: &[Vec<f64>; DIM]) -> TensorSize<DIM> {
    TensorSize(std::array::from_fn(|d| knots[d].len().saturating_sub(1)))
}

fn check_knots<const DIM: usize>(knots: &[Vec<f64>; DIM], tol: Tolerance) -> Result<()> {
    for (d, k) in knots.iter().enumerate() {
        if k.len() < 2 {
            return Err(IgaError::InvalidKnots(format!(
                "direction {} needs at least 2 knots, got {}",
                d,
                k.len()
            )));
        }
        if let Some(x) = k.iter().find(|x| !x.is_finite()) {
            return Err(IgaError::InvalidKnots(format!(
                "direction {} has non-finite knot {}",
                d, x
            )));
        }
        for (i, w) in k.windows(2).enumerate() {
            if !tol.strictly_less(w[0], w[1]) {
                return Err(IgaError::InvalidKnots(format!(
                    "direction {}: knots {} and {} at positions {} and {} are not strictly increasing",
                    d,
                    w[0],
                    w[1],
                    i,
                    i + 1
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_grid() {
        let grid = Grid::<2>::uniform([4, 3]).unwrap();
        assert_eq!(grid.num_intervals().as_array(), [3, 2]);
        assert_eq!(grid.num_elements(), 6);
        assert_relative_eq!(grid.interval_length(0, 1).unwrap(), 1.0 / 3.0);
        assert_eq!(grid.knot_coordinates(1).unwrap(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_non_increasing_knots_rejected() {
        let err = Grid::<1>::from_knots([vec![0.0, 1.0, 1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, IgaError::InvalidKnots(_)));
        assert!(Grid::<1>::from_knots([vec![0.0, 2.0, 1.0]]).is_err());
        assert!(Grid::<1>::from_knots([vec![0.0, 1e-14]]).is_err());
        assert!(Grid::<2>::from_knots([vec![0.0, 1.0], vec![0.0]]).is_err());
    }

    #[test]
    fn test_interval_length_out_of_range() {
        let grid = Grid::<1>::uniform([3]).unwrap();
        assert!(matches!(
            grid.interval_length(0, 2),
            Err(IgaError::IndexOutOfRange { index: 2, bound: 2, .. })
        ));
        assert!(grid.interval_length(1, 0).is_err());
    }

    #[test]
    fn test_refine_inserts_equally_spaced_knots() {
        let grid = Arc::new(Grid::<2>::from_knots([vec![0.0, 1.0, 3.0], vec![0.0, 1.0]]).unwrap());
        let (refined, event) = grid.refine_directions([true, false], [2, 5]).unwrap();
        assert_eq!(refined.knots()[0], vec![0.0, 0.5, 1.0, 2.0, 3.0]);
        assert_eq!(refined.knots()[1], vec![0.0, 1.0]);
        assert_eq!(refined.id(), grid.id());
        assert_eq!(refined.revision(), 1);
        assert!(!refined.same_as(&grid));
        assert!(event.previous().same_as(&grid));
        assert_eq!(event.inserted_knots(0), &[0.5, 2.0]);
        assert!(event.inserted_knots(1).is_empty());
        refined.validate().unwrap();
    }

    #[test]
    fn test_find_elements_of_points() {
        let grid = Grid::<2>::uniform([3, 3]).unwrap();
        let map = grid
            .find_elements_of_points(&[[0.25, 0.75], [0.5, 0.5], [1.0, 1.0], [0.1, 0.2]])
            .unwrap();
        assert_eq!(map[&1].len(), 1);
        assert_eq!(map[&1][0].0, 0);
        assert_relative_eq!(map[&1][0].1[0], 0.5);
        // interior knot goes right, last knot stays in the last element
        assert_eq!(map[&3].iter().map(|e| e.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(map[&0][0].0, 3);
        assert!(grid.find_elements_of_points(&[[1.5, 0.0]]).is_err());
    }
}
