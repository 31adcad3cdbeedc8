//! Element matrices by a plain loop over quadrature points and function pairs.

use std::sync::Arc;

use iga_basis::{DofProperty, ElementBasisCache, ReferenceBasis};
use iga_core::{IgaError, Result};
use iga_grid::{ElementHandle, Grid};
use iga_math::TensorProductQuadrature;
use nalgebra::DMatrix;

use crate::integrator::{BilinearForm, Coefficient, ElementIntegrator};

/// Reference integrator working on the full element cache of any basis.
///
/// Handles every form and DOF property; used to check the sum-factorized
/// integrator and for rational stiffness matrices.
pub struct QuadratureLoopIntegrator<'a, const DIM: usize, B: ReferenceBasis<DIM> + Sync + ?Sized> {
    basis: &'a B,
    quadrature: &'a TensorProductQuadrature<DIM>,
    coefficient: Option<Coefficient<'a, DIM>>,
}

impl<'a, const DIM: usize, B: ReferenceBasis<DIM> + Sync + ?Sized> QuadratureLoopIntegrator<'a, DIM, B> {
    pub fn new(basis: &'a B, quadrature: &'a TensorProductQuadrature<DIM>) -> Self {
        Self {
            basis,
            quadrature,
            coefficient: None,
        }
    }

    pub fn with_coefficient(mut self, coefficient: Coefficient<'a, DIM>) -> Self {
        self.coefficient = Some(coefficient);
        self
    }

    /// Positions of the `property` functions among the active ones.
    fn local_rows(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        let active = self.basis.local_to_global(element, DofProperty::Active)?;
        if property == DofProperty::Active {
            return Ok((0..active.len()).collect());
        }
        self.basis
            .local_to_global(element, property)?
            .iter()
            .map(|dof| {
                active.iter().position(|a| a == dof).ok_or_else(|| {
                    IgaError::Configuration(format!(
                        "{:?} dof {} is not active on element {}",
                        property, dof, element.flat
                    ))
                })
            })
            .collect()
    }
}

fn pair_product<const DIM: usize>(
    cache: &ElementBasisCache<DIM>,
    form: BilinearForm,
    i: usize,
    j: usize,
    q: usize,
) -> Result<f64> {
    Ok(match form {
        BilinearForm::Mass => cache.values()[(i, q)] * cache.values()[(j, q)],
        BilinearForm::Stiffness => {
            let grads = cache.gradients()?;
            (0..DIM).map(|a| grads[(i, q)][a] * grads[(j, q)][a]).sum()
        }
        BilinearForm::Hessian => {
            let hess = cache.hessians()?;
            let (hi, hj) = (&hess[(i, q)], &hess[(j, q)]);
            (0..DIM)
                .flat_map(|a| (0..DIM).map(move |b| (a, b)))
                .map(|(a, b)| hi[a][b] * hj[a][b])
                .sum()
        }
    })
}

impl<const DIM: usize, B: ReferenceBasis<DIM> + Sync + ?Sized> ElementIntegrator<DIM>
    for QuadratureLoopIntegrator<'_, DIM, B>
{
    fn grid(&self) -> &Arc<Grid<DIM>> {
        self.basis.grid()
    }

    fn num_dofs(&self) -> usize {
        self.basis.num_basis()
    }

    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        self.basis.local_to_global(element, property)
    }

    fn element_matrix(
        &self,
        element: &ElementHandle<DIM>,
        form: BilinearForm,
        property: DofProperty,
    ) -> Result<DMatrix<f64>> {
        let cache = self.basis.fill_cache(element, self.quadrature, form.derivative_order())?;
        let rows = self.local_rows(element, property)?;
        let scale: Vec<f64> = match self.coefficient {
            Some(f) => cache.points().iter().zip(cache.w_measures()).map(|(x, w)| f(x) * w).collect(),
            None => cache.w_measures().to_vec(),
        };
        let components = cache.components();

        let n = rows.len();
        let mut local = DMatrix::zeros(n, n);
        for (li, &i) in rows.iter().enumerate() {
            for (lj, &j) in rows.iter().enumerate() {
                // forms act component by component
                if components[i] != components[j] {
                    continue;
                }
                let mut sum = 0.0;
                for (q, s) in scale.iter().enumerate() {
                    sum += s * pair_product(&cache, form, i, j, q)?;
                }
                local[(li, lj)] = sum;
            }
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use iga_basis::BSplineSpace;

    #[test]
    fn test_boundary_rows_selected() {
        let grid = Arc::new(Grid::<1>::uniform([4]).unwrap());
        let space = BSplineSpace::scalar(grid, [2]).unwrap();
        let quad = TensorProductQuadrature::<1>::gauss_uniform(3).unwrap();
        let integrator = QuadratureLoopIntegrator::new(&space, &quad);
        let handle = space.grid().element_handle(0).unwrap();

        let full = integrator.element_matrix(&handle, BilinearForm::Mass, DofProperty::Active).unwrap();
        let boundary = integrator
            .element_matrix(&handle, BilinearForm::Mass, DofProperty::Boundary)
            .unwrap();
        assert_eq!(integrator.local_to_global(&handle, DofProperty::Boundary).unwrap(), vec![0]);
        assert_eq!(boundary.shape(), (1, 1));
        assert_relative_eq!(boundary[(0, 0)], full[(0, 0)], epsilon = 1e-15);
    }

    #[test]
    fn test_hessian_of_quadratics() {
        // second derivatives of the three Bernstein quadratics on [0, 1] are 2, -4, 2
        let grid = Arc::new(Grid::<1>::uniform([2]).unwrap());
        let space = BSplineSpace::scalar(grid, [2]).unwrap();
        let quad = TensorProductQuadrature::<1>::gauss_uniform(2).unwrap();
        let integrator = QuadratureLoopIntegrator::new(&space, &quad);
        let handle = space.grid().element_handle(0).unwrap();
        let h = integrator
            .element_matrix(&handle, BilinearForm::Hessian, DofProperty::Active)
            .unwrap();
        assert_relative_eq!(h[(0, 0)], 4.0, epsilon = 1e-12);
        assert_relative_eq!(h[(0, 1)], -8.0, epsilon = 1e-12);
        assert_relative_eq!(h[(1, 1)], 16.0, epsilon = 1e-12);
    }
}
