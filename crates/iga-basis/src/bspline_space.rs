//! Tensor-product B-spline space evaluated through Bernstein extraction.

use std::sync::Arc;

use iga_core::{check_range, IgaError, Result};
use iga_grid::{ElementHandle, Grid, RefinementEvent, RefinementListener};
use iga_math::{TensorIndex, TensorProductQuadrature};
use nalgebra::DMatrix;

use crate::bernstein::bernstein_tables;
use crate::boundary::Face;
use crate::cache::ElementBasisCache;
use crate::dofs::{DofDistribution, DofProperty};
use crate::evaluator::{check_derivative_order, fill_tensor_product, ReferenceBasis};
use crate::extraction::BernsteinExtraction;
use crate::spline_space::{DegreeTable, EndBehaviour, InteriorReg, SplineSpace};

#[derive(Debug, Clone)]
pub struct BSplineSpace<const DIM: usize> {
    space: SplineSpace<DIM>,
    extraction: BernsteinExtraction<DIM>,
    dofs: DofDistribution<DIM>,
}

impl<const DIM: usize> BSplineSpace<DIM> {
    pub fn new(space: SplineSpace<DIM>) -> Result<Self> {
        let extraction = BernsteinExtraction::new(&space)?;
        let dofs = DofDistribution::new(&space);
        Ok(Self {
            space,
            extraction,
            dofs,
        })
    }

    /// Scalar space with maximum regularity and interpolatory ends.
    pub fn scalar(grid: Arc<Grid<DIM>>, degree: [usize; DIM]) -> Result<Self> {
        Self::new(SplineSpace::scalar(grid, degree)?)
    }

    pub fn with_regularity(grid: Arc<Grid<DIM>>, degree: DegreeTable<DIM>, reg: InteriorReg) -> Result<Self> {
        Self::new(SplineSpace::with_regularity(grid, degree, reg)?)
    }

    pub fn spline_space(&self) -> &SplineSpace<DIM> {
        &self.space
    }

    pub fn extraction(&self) -> &BernsteinExtraction<DIM> {
        &self.extraction
    }

    pub fn dof_distribution(&self) -> &DofDistribution<DIM> {
        &self.dofs
    }

    pub fn degree(&self) -> &DegreeTable<DIM> {
        self.space.degree()
    }

    pub fn n_components(&self) -> usize {
        self.space.n_components()
    }

    /// 1-D B-spline tables of component `comp` on `element`.
    ///
    /// Entry `[d][r]` is the `(p_d + 1) x n_q[d]` matrix of `r`-th physical
    /// derivatives of the local functions of direction `d`.
    pub fn univariate_tables(
        &self,
        comp: usize,
        element: &TensorIndex<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<[Vec<DMatrix<f64>>; DIM]> {
        let operators = self.extraction.element_operators(comp, element)?;
        let degree = self.space.component_degree(comp)?;
        let grid = self.space.grid();
        let mut tables: [Vec<DMatrix<f64>>; DIM] = std::array::from_fn(|_| Vec::new());
        for d in 0..DIM {
            let h = grid.interval_length(d, element[d])?;
            let bernstein = bernstein_tables(degree[d], max_order, quadrature.points_direction(d));
            tables[d] = bernstein
                .iter()
                .enumerate()
                .map(|(r, b)| operators[d].scale_action(h.powi(-(r as i32)), b))
                .collect();
        }
        Ok(tables)
    }

    /// The same space over the refined grid.
    pub fn refined(&self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<Self> {
        Self::new(self.space.refined(grid, event)?)
    }
}

impl<const DIM: usize> ReferenceBasis<DIM> for BSplineSpace<DIM> {
    fn grid(&self) -> &Arc<Grid<DIM>> {
        self.space.grid()
    }

    fn num_basis(&self) -> usize {
        self.space.num_basis()
    }

    fn num_element_basis(&self) -> usize {
        self.space.num_element_basis()
    }

    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        self.dofs.local_to_global(&element.tensor, property)
    }

    /// Only interpolatory ends are supported: there the functions on a face
    /// are exactly those whose tensor index lies on it.
    fn face_dofs(&self, face: Face) -> Result<Vec<usize>> {
        check_range("face direction", face.direction, DIM)?;
        for (comp, ends) in self.space.end_behaviour().iter().enumerate() {
            if let EndBehaviour::EndKnots { .. } = ends[face.direction] {
                return Err(IgaError::NotImplemented(format!(
                    "face dofs with end knots (component {}, direction {})",
                    comp, face.direction
                )));
            }
        }
        self.dofs.face_dofs(face)
    }

    fn fill_cache(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<ElementBasisCache<DIM>> {
        check_derivative_order(max_order)?;
        let grid = self.space.grid();
        let geometry = grid.element_at(&element.tensor)?;
        if geometry.flat_index() != element.flat {
            return Err(IgaError::Configuration(format!(
                "element handle {:?} has inconsistent flat and tensor indices",
                element
            )));
        }

        let mut components = Vec::with_capacity(self.num_element_basis());
        for comp in 0..self.n_components() {
            let n = self.space.num_element_basis_component(comp)?;
            components.extend(std::iter::repeat(comp).take(n));
        }
        let mut cache = ElementBasisCache::new(*element, quadrature, max_order, components);

        let measure = geometry.measure();
        for (q, idx) in quadrature.layout().indices().enumerate() {
            cache.points_mut()[q] = geometry.map_reference_point(&quadrature.point_at(&idx));
        }
        for (w_measure, w) in cache.w_measures_mut().iter_mut().zip(quadrature.flat_weights()) {
            *w_measure = w * measure;
        }

        let mut offset = 0;
        for comp in 0..self.n_components() {
            let tables = self.univariate_tables(comp, &element.tensor, quadrature, max_order)?;
            fill_tensor_product(&mut cache, offset, &tables, quadrature.layout());
            offset += self.space.num_element_basis_component(comp)?;
        }
        Ok(cache)
    }
}

impl<const DIM: usize> RefinementListener<DIM> for BSplineSpace<DIM> {
    fn on_refinement(&mut self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<()> {
        *self = self.refined(grid, event)?;
        Ok(())
    }
}
