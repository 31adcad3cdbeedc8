//! Element matrices by direction-by-direction contraction of 1-D tables.
//!
//! A local matrix entry of a tensor-product basis is
//! `A[i, j] = Σ_q c(q) Π_d B_d[i_d, q_d] B_d[j_d, q_d]`. Contracting the
//! quadrature axes one at a time with the pair tables
//! `P_d[(i_d, j_d), q_d] = B_d[i_d, q_d] B_d[j_d, q_d]` never forms the
//! full `function x point` table.

use std::sync::Arc;

use iga_basis::refine::apply_along_axis;
use iga_basis::{BSplineSpace, DofProperty, NurbsSpace, ReferenceBasis};
use iga_core::{IgaError, Result};
use iga_grid::{ElementHandle, Grid};
use iga_math::{DynamicMultiArray, TensorProductQuadrature, TensorSize, TensorSizedContainer};
use nalgebra::DMatrix;

use crate::integrator::{BilinearForm, Coefficient, ElementIntegrator};

/// 1-D tables of one component: `tables[d][r]` holds the `r`-th derivatives
/// of the local functions of direction `d` (rows) at the 1-D points (columns).
pub type UnivariateTables<const DIM: usize> = [Vec<DMatrix<f64>>; DIM];

/// Contract `scale`, given on the quadrature points, against the pair tables
/// of `tables` with the derivative orders `orders`.
///
/// Returns the dense `n x n` matrix over the component's local functions in
/// row-major tensor order.
pub fn contract<const DIM: usize>(
    tables: &UnivariateTables<DIM>,
    orders: [usize; DIM],
    scale: &DynamicMultiArray<f64, DIM>,
) -> Result<DMatrix<f64>> {
    let mut current = scale.clone();
    for d in 0..DIM {
        let b = tables[d]
            .get(orders[d])
            .ok_or_else(|| IgaError::out_of_range("derivative order", orders[d], tables[d].len()))?;
        let n = b.nrows();
        let pairs = DMatrix::from_fn(n * n, b.ncols(), |row, q| b[(row / n, q)] * b[(row % n, q)]);
        current = apply_along_axis(&pairs, &current, d)?;
    }

    let local = TensorSizedContainer::<DIM>::new(TensorSize(std::array::from_fn(|d| tables[d][0].nrows())));
    let extents = local.tensor_size();
    let n = local.flat_size();
    let mut out = DMatrix::zeros(n, n);
    for (fi, i) in local.indices().enumerate() {
        for (fj, j) in local.indices().enumerate() {
            let pair = std::array::from_fn(|d| i[d] * extents[d] + j[d]);
            out[(fi, fj)] = *current.get(&pair)?;
        }
    }
    Ok(out)
}

/// Values at the quadrature points of the function with local coefficients
/// `coefs`, by the same direction-wise contraction.
pub fn interpolate<const DIM: usize>(
    tables: &UnivariateTables<DIM>,
    coefs: &DynamicMultiArray<f64, DIM>,
) -> Result<DynamicMultiArray<f64, DIM>> {
    let mut current = coefs.clone();
    for (d, table) in tables.iter().enumerate() {
        current = apply_along_axis(&table[0].transpose(), &current, d)?;
    }
    Ok(current)
}

#[derive(Debug, Clone, Copy)]
enum Basis<'a, const DIM: usize> {
    BSpline(&'a BSplineSpace<DIM>),
    Nurbs(&'a NurbsSpace<DIM>),
}

/// Sum-factorized integrator over a B-spline or NURBS space.
///
/// Supports the mass and stiffness forms on the active functions. NURBS
/// spaces support the mass form, integrated as `w_i w_j ∫ c N_i N_j / W²`.
pub struct SumFactorizedIntegrator<'a, const DIM: usize> {
    basis: Basis<'a, DIM>,
    quadrature: &'a TensorProductQuadrature<DIM>,
    coefficient: Option<Coefficient<'a, DIM>>,
}

impl<'a, const DIM: usize> SumFactorizedIntegrator<'a, DIM> {
    pub fn new(space: &'a BSplineSpace<DIM>, quadrature: &'a TensorProductQuadrature<DIM>) -> Self {
        Self {
            basis: Basis::BSpline(space),
            quadrature,
            coefficient: None,
        }
    }

    pub fn nurbs(space: &'a NurbsSpace<DIM>, quadrature: &'a TensorProductQuadrature<DIM>) -> Self {
        Self {
            basis: Basis::Nurbs(space),
            quadrature,
            coefficient: None,
        }
    }

    /// Multiply the integrand by `coefficient`; the default is one.
    pub fn with_coefficient(mut self, coefficient: Coefficient<'a, DIM>) -> Self {
        self.coefficient = Some(coefficient);
        self
    }

    fn bspline(&self) -> &'a BSplineSpace<DIM> {
        match self.basis {
            Basis::BSpline(s) => s,
            Basis::Nurbs(s) => s.bspline_space(),
        }
    }

    /// Coefficient times quadrature weight times element measure, per point.
    fn point_scale(&self, element: &ElementHandle<DIM>) -> Result<DynamicMultiArray<f64, DIM>> {
        let geometry = self.grid().element_at(&element.tensor)?;
        let measure = geometry.measure();
        let layout = self.quadrature.layout();
        let weights = self.quadrature.flat_weights();
        let data = layout
            .indices()
            .zip(weights)
            .map(|(idx, w)| {
                let c = match self.coefficient {
                    Some(f) => f(&geometry.map_reference_point(&self.quadrature.point_at(&idx))),
                    None => 1.0,
                };
                c * w * measure
            })
            .collect();
        DynamicMultiArray::from_vec(layout.tensor_size(), data)
    }

    fn component_block(
        &self,
        comp: usize,
        element: &ElementHandle<DIM>,
        form: BilinearForm,
        scale: &DynamicMultiArray<f64, DIM>,
    ) -> Result<DMatrix<f64>> {
        let tables = self
            .bspline()
            .univariate_tables(comp, &element.tensor, self.quadrature, form.derivative_order())?;
        match (self.basis, form) {
            (Basis::BSpline(_), BilinearForm::Mass) => contract(&tables, [0; DIM], scale),
            (Basis::BSpline(_), BilinearForm::Stiffness) => {
                let mut block = contract(&tables, unit_orders(0), scale)?;
                for a in 1..DIM {
                    block += contract(&tables, unit_orders(a), scale)?;
                }
                Ok(block)
            }
            (Basis::Nurbs(nurbs), BilinearForm::Mass) => {
                let weights = nurbs.element_weights(comp, element)?;
                let local = TensorSize(std::array::from_fn(|d| tables[d][0].nrows()));
                let w_field = interpolate(&tables, &DynamicMultiArray::from_vec(local, weights.clone())?)?;
                let mut rational = scale.clone();
                for (s, &w) in rational.as_mut_slice().iter_mut().zip(w_field.as_slice()) {
                    if !w.is_finite() || w <= 0.0 {
                        return Err(IgaError::DegenerateWeight { value: w });
                    }
                    *s /= w * w;
                }
                let mut block = contract(&tables, [0; DIM], &rational)?;
                for (i, wi) in weights.iter().enumerate() {
                    for (j, wj) in weights.iter().enumerate() {
                        block[(i, j)] *= wi * wj;
                    }
                }
                Ok(block)
            }
            (Basis::Nurbs(_), BilinearForm::Stiffness) => Err(IgaError::NotImplemented(
                "sum-factorized stiffness for rational spaces".into(),
            )),
            (_, BilinearForm::Hessian) => Err(IgaError::NotImplemented(
                "sum-factorized integration of the hessian form".into(),
            )),
        }
    }
}

fn unit_orders<const DIM: usize>(axis: usize) -> [usize; DIM] {
    let mut orders = [0; DIM];
    orders[axis] = 1;
    orders
}

impl<const DIM: usize> ElementIntegrator<DIM> for SumFactorizedIntegrator<'_, DIM> {
    fn grid(&self) -> &Arc<Grid<DIM>> {
        self.bspline().grid()
    }

    fn num_dofs(&self) -> usize {
        self.bspline().num_basis()
    }

    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        self.bspline().local_to_global(element, property)
    }

    fn element_matrix(
        &self,
        element: &ElementHandle<DIM>,
        form: BilinearForm,
        property: DofProperty,
    ) -> Result<DMatrix<f64>> {
        if property != DofProperty::Active {
            return Err(IgaError::NotImplemented(format!(
                "sum-factorized integration restricted to {:?} functions",
                property
            )));
        }
        if form == BilinearForm::Hessian {
            return Err(IgaError::NotImplemented(
                "sum-factorized integration of the hessian form".into(),
            ));
        }
        let space = self.bspline();
        let scale = self.point_scale(element)?;
        let n = space.num_element_basis();
        let mut local = DMatrix::zeros(n, n);
        let mut offset = 0;
        for comp in 0..space.n_components() {
            let block = self.component_block(comp, element, form, &scale)?;
            let m = block.nrows();
            local.view_mut((offset, offset), (m, m)).copy_from(&block);
            offset += m;
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_element_matrices() {
        let grid = Arc::new(Grid::<1>::from_knots([vec![0.0, 0.5]]).unwrap());
        let space = BSplineSpace::scalar(grid, [1]).unwrap();
        let quad = TensorProductQuadrature::<1>::gauss_uniform(2).unwrap();
        let integrator = SumFactorizedIntegrator::new(&space, &quad);
        let handle = space.grid().element_handle(0).unwrap();

        let mass = integrator.element_matrix(&handle, BilinearForm::Mass, DofProperty::Active).unwrap();
        let h = 0.5;
        assert_relative_eq!(mass[(0, 0)], h / 3.0, epsilon = 1e-15);
        assert_relative_eq!(mass[(0, 1)], h / 6.0, epsilon = 1e-15);
        assert_relative_eq!(mass[(1, 1)], h / 3.0, epsilon = 1e-15);

        let stiff = integrator
            .element_matrix(&handle, BilinearForm::Stiffness, DofProperty::Active)
            .unwrap();
        assert_relative_eq!(stiff[(0, 0)], 1.0 / h, epsilon = 1e-14);
        assert_relative_eq!(stiff[(0, 1)], -1.0 / h, epsilon = 1e-14);
    }

    #[test]
    fn test_interpolate_constant() {
        let grid = Arc::new(Grid::<2>::uniform([3, 4]).unwrap());
        let space = BSplineSpace::scalar(grid, [2, 1]).unwrap();
        let quad = TensorProductQuadrature::<2>::gauss([3, 2]).unwrap();
        let tables = space.univariate_tables(0, &[1, 2], &quad, 0).unwrap();
        let ones = DynamicMultiArray::filled(TensorSize([3, 2]), 2.5);
        let w = interpolate(&tables, &ones).unwrap();
        assert_eq!(w.tensor_size().as_array(), [3, 2]);
        for v in w.as_slice() {
            assert_relative_eq!(*v, 2.5, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_feature_gaps_reported() {
        let grid = Arc::new(Grid::<2>::uniform([3, 3]).unwrap());
        let space = BSplineSpace::scalar(grid, [2, 2]).unwrap();
        let quad = TensorProductQuadrature::<2>::gauss_uniform(3).unwrap();
        let integrator = SumFactorizedIntegrator::new(&space, &quad);
        let handle = space.grid().element_handle(0).unwrap();
        let hessian = integrator.element_matrix(&handle, BilinearForm::Hessian, DofProperty::Active);
        assert!(hessian.unwrap_err().is_not_implemented());
        let interior = integrator.element_matrix(&handle, BilinearForm::Mass, DofProperty::Interior);
        assert!(interior.unwrap_err().is_not_implemented());

        let nurbs = NurbsSpace::unit_weights(space.clone()).unwrap();
        let integrator = SumFactorizedIntegrator::nurbs(&nurbs, &quad);
        let stiff = integrator.element_matrix(&handle, BilinearForm::Stiffness, DofProperty::Active);
        assert!(stiff.unwrap_err().is_not_implemented());
    }
}
