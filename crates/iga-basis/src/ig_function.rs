//! Spline functions: coefficients over the global numbering of a B-spline space.

use std::sync::Arc;

use iga_core::Result;
use iga_grid::{Grid, RefinementEvent, RefinementListener};
use iga_math::TensorProductQuadrature;

use crate::bspline_space::BSplineSpace;
use crate::dofs::{check_len, DofProperty};
use crate::evaluator::ReferenceBasis;
use crate::refine::refine_coefficients;

/// Values of a function at the quadrature points of one element, indexed `[point][component]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IgFunctionValues<const DIM: usize> {
    pub values: Vec<Vec<f64>>,
    pub gradients: Option<Vec<Vec<[f64; DIM]>>>,
    pub hessians: Option<Vec<Vec<[[f64; DIM]; DIM]>>>,
}

#[derive(Debug, Clone)]
pub struct IgFunction<const DIM: usize> {
    space: BSplineSpace<DIM>,
    coefficients: Vec<f64>,
}

impl<const DIM: usize> IgFunction<DIM> {
    pub fn new(space: BSplineSpace<DIM>, coefficients: Vec<f64>) -> Result<Self> {
        check_len("function coefficients", space.dof_distribution(), coefficients.len())?;
        Ok(Self { space, coefficients })
    }

    pub fn space(&self) -> &BSplineSpace<DIM> {
        &self.space
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn grid(&self) -> &Arc<Grid<DIM>> {
        self.space.grid()
    }

    /// Values and derivatives up to `max_order` on element `element`.
    pub fn evaluate_element(
        &self,
        element: usize,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<IgFunctionValues<DIM>> {
        let handle = self.grid().element_handle(element)?;
        let cache = self.space.fill_cache(&handle, quadrature, max_order)?;
        let dofs = self.space.local_to_global(&handle, DofProperty::Active)?;
        let n_comp = self.space.n_components();
        let n_points = cache.n_points();
        let components = cache.components();

        let mut values = vec![vec![0.0; n_comp]; n_points];
        for (i, &dof) in dofs.iter().enumerate() {
            let c = self.coefficients[dof];
            for (q, v) in cache.values().function_view(i).iter().enumerate() {
                values[q][components[i]] += c * v;
            }
        }

        let gradients = if max_order >= 1 {
            let table = cache.gradients()?;
            let mut out = vec![vec![[0.0; DIM]; n_comp]; n_points];
            for (i, &dof) in dofs.iter().enumerate() {
                let c = self.coefficients[dof];
                for (q, g) in table.function_view(i).iter().enumerate() {
                    for a in 0..DIM {
                        out[q][components[i]][a] += c * g[a];
                    }
                }
            }
            Some(out)
        } else {
            None
        };

        let hessians = if max_order >= 2 {
            let table = cache.hessians()?;
            let mut out = vec![vec![[[0.0; DIM]; DIM]; n_comp]; n_points];
            for (i, &dof) in dofs.iter().enumerate() {
                let c = self.coefficients[dof];
                for (q, h) in table.function_view(i).iter().enumerate() {
                    for a in 0..DIM {
                        for b in 0..DIM {
                            out[q][components[i]][a][b] += c * h[a][b];
                        }
                    }
                }
            }
            Some(out)
        } else {
            None
        };

        Ok(IgFunctionValues {
            values,
            gradients,
            hessians,
        })
    }

    /// Values at physical points, indexed `[point][component]`.
    pub fn evaluate_at_points(&self, points: &[[f64; DIM]]) -> Result<Vec<Vec<f64>>> {
        let mut out = vec![Vec::new(); points.len()];
        for (element, located) in self.grid().find_elements_of_points(points)? {
            for (ip, reference) in located {
                let quad = TensorProductQuadrature::from_points(std::array::from_fn(|d| vec![reference[d]]))?;
                let mut vals = self.evaluate_element(element, &quad, 0)?.values;
                out[ip] = vals.swap_remove(0);
            }
        }
        Ok(out)
    }

    /// The same function on the refined space; coefficients are refined by knot insertion.
    pub fn refined(&self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<Self> {
        let coefficients = refine_coefficients(self.space.spline_space(), event, &self.coefficients)?;
        Self::new(self.space.refined(grid, event)?, coefficients)
    }
}

impl<const DIM: usize> RefinementListener<DIM> for IgFunction<DIM> {
    fn on_refinement(&mut self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<()> {
        *self = self.refined(grid, event)?;
        Ok(())
    }
}
