//! Lightweight element handles and borrowed element accessors.

use iga_math::{BBox, TensorIndex};

use crate::grid::Grid;

/// Flat and tensor index of a grid element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle<const DIM: usize> {
    pub flat: usize,
    pub tensor: TensorIndex<DIM>,
}

/// An element together with the grid it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct GridElement<'g, const DIM: usize> {
    grid: &'g Grid<DIM>,
    handle: ElementHandle<DIM>,
}

impl<'g, const DIM: usize> GridElement<'g, DIM> {
    pub(crate) fn new(grid: &'g Grid<DIM>, handle: ElementHandle<DIM>) -> Self {
        Self { grid, handle }
    }

    pub fn grid(&self) -> &'g Grid<DIM> {
        self.grid
    }

    pub fn handle(&self) -> ElementHandle<DIM> {
        self.handle
    }

    pub fn flat_index(&self) -> usize {
        self.handle.flat
    }

    pub fn tensor_index(&self) -> TensorIndex<DIM> {
        self.handle.tensor
    }

    /// The element as a box in parameter space.
    pub fn bounding_box(&self) -> BBox<DIM> {
        let knots = self.grid.knots();
        let t = self.handle.tensor;
        BBox {
            min: std::array::from_fn(|d| knots[d][t[d]]),
            max: std::array::from_fn(|d| knots[d][t[d] + 1]),
        }
    }

    pub fn lengths(&self) -> [f64; DIM] {
        self.bounding_box().extents()
    }

    pub fn measure(&self) -> f64 {
        self.bounding_box().measure()
    }

    pub fn center(&self) -> [f64; DIM] {
        self.bounding_box().center()
    }

    /// Vertex `i` of the element, with bit `d` of `i` (counted from the
    /// last direction) selecting the upper end of direction `d`.
    pub fn vertex(&self, i: usize) -> [f64; DIM] {
        let bbox = self.bounding_box();
        std::array::from_fn(|d| {
            if (i >> (DIM - 1 - d)) & 1 == 1 {
                bbox.max[d]
            } else {
                bbox.min[d]
            }
        })
    }

    /// Map reference coordinates in `[0,1]^DIM` to parameter coordinates.
    pub fn map_reference_point(&self, reference: &[f64; DIM]) -> [f64; DIM] {
        let bbox = self.bounding_box();
        std::array::from_fn(|d| bbox.min[d] + reference[d] * (bbox.max[d] - bbox.min[d]))
    }

    /// Whether the element touches the boundary of the grid.
    pub fn is_boundary(&self) -> bool {
        let n = self.grid.num_intervals();
        (0..DIM).any(|d| self.handle.tensor[d] == 0 || self.handle.tensor[d] + 1 == n[d])
    }

    /// Whether the element touches face `face` of the patch.
    ///
    /// Face `2d` is the lower side of direction `d`, face `2d + 1` the upper side.
    pub fn is_boundary_face(&self, face: usize) -> bool {
        let dir = face / 2;
        if dir >= DIM {
            return false;
        }
        let n = self.grid.num_intervals();
        if face % 2 == 0 {
            self.handle.tensor[dir] == 0
        } else {
            self.handle.tensor[dir] + 1 == n[dir]
        }
    }

    /// Whether `point` lies strictly inside the element.
    pub fn is_point_inside(&self, point: &[f64; DIM]) -> bool {
        let bbox = self.bounding_box();
        (0..DIM).all(|d| point[d] > bbox.min[d] && point[d] < bbox.max[d])
    }
}

/// Forward iterator over the elements of a grid.
#[derive(Debug, Clone)]
pub struct ElementIter<'g, const DIM: usize> {
    grid: &'g Grid<DIM>,
    next: usize,
}

impl<'g, const DIM: usize> ElementIter<'g, DIM> {
    pub(crate) fn new(grid: &'g Grid<DIM>) -> Self {
        Self { grid, next: 0 }
    }
}

impl<'g, const DIM: usize> Iterator for ElementIter<'g, DIM> {
    type Item = GridElement<'g, DIM>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.grid.element_handle(self.next).ok()?;
        self.next += 1;
        Some(GridElement::new(self.grid, handle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.grid.num_elements().saturating_sub(self.next);
        (rest, Some(rest))
    }
}

impl<'g, const DIM: usize> ExactSizeIterator for ElementIter<'g, DIM> {}
