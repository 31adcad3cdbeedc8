//! NURBS spaces: B-spline spaces with a positive weight field.

use std::sync::Arc;

use iga_core::{IgaError, Result, Tolerance};
use iga_grid::{ElementHandle, Grid, RefinementEvent, RefinementListener};
use iga_math::{DynamicMultiArray, TensorProductQuadrature};
use log::warn;

use crate::boundary::Face;
use crate::bspline_space::BSplineSpace;
use crate::cache::ElementBasisCache;
use crate::dofs::DofProperty;
use crate::evaluator::ReferenceBasis;
use crate::refine::refine_component_coefficients;

/// Turn B-spline values and derivatives at one point into rational ones.
///
/// `weights`, `values` and (when present) `gradients`/`hessians` hold one
/// entry per function of a single component. With
/// `W = sum_j w_j N_j`, `R_i = w_i N_i / W` and the derivatives follow from
/// the quotient rule. Hessians require gradients.
pub fn rational_correction<const DIM: usize>(
    weights: &[f64],
    values: &mut [f64],
    gradients: Option<&mut [[f64; DIM]]>,
    hessians: Option<&mut [[[f64; DIM]; DIM]]>,
) -> Result<()> {
    let n = values.len();
    if weights.len() != n {
        return Err(IgaError::mismatch("weights at a point", n, weights.len()));
    }
    if let Some(g) = gradients.as_ref().filter(|g| g.len() != n) {
        return Err(IgaError::mismatch("gradients at a point", n, g.len()));
    }
    if let Some(h) = hessians.as_ref().filter(|h| h.len() != n) {
        return Err(IgaError::mismatch("hessians at a point", n, h.len()));
    }
    if hessians.is_some() && gradients.is_none() {
        return Err(IgaError::Configuration("rational hessians need the gradients".into()));
    }

    let w_sum: f64 = weights.iter().zip(values.iter()).map(|(w, v)| w * v).sum();
    if !w_sum.is_finite() || w_sum <= 0.0 {
        return Err(IgaError::DegenerateWeight { value: w_sum });
    }
    if w_sum < Tolerance::default().absolute {
        warn!("rational denominator {:e} is close to zero", w_sum);
    }

    let old_values = values.to_vec();
    let old_grads: Option<Vec<[f64; DIM]>> = gradients.as_deref().map(<[_]>::to_vec);
    let grad_w: [f64; DIM] = match &old_grads {
        Some(g) => std::array::from_fn(|a| weights.iter().zip(g).map(|(w, g)| w * g[a]).sum()),
        None => [0.0; DIM],
    };
    let w2 = w_sum * w_sum;

    if let (Some(hess), Some(g)) = (hessians, old_grads.as_ref()) {
        let hess_w: [[f64; DIM]; DIM] = std::array::from_fn(|a| {
            std::array::from_fn(|b| weights.iter().zip(hess.iter()).map(|(w, h)| w * h[a][b]).sum())
        });
        let w3 = w2 * w_sum;
        for i in 0..n {
            let (w, v) = (weights[i], old_values[i]);
            for a in 0..DIM {
                for b in 0..DIM {
                    hess[i][a][b] = w
                        * (hess[i][a][b] / w_sum
                            - (g[i][a] * grad_w[b] + g[i][b] * grad_w[a]) / w2
                            - v * hess_w[a][b] / w2
                            + 2.0 * v * grad_w[a] * grad_w[b] / w3);
                }
            }
        }
    }

    if let (Some(grads), Some(g)) = (gradients, old_grads.as_ref()) {
        for i in 0..n {
            for a in 0..DIM {
                grads[i][a] = weights[i] * (g[i][a] * w_sum - old_values[i] * grad_w[a]) / w2;
            }
        }
    }

    for (v, w) in values.iter_mut().zip(weights) {
        *v *= w / w_sum;
    }
    Ok(())
}

/// Rational space `R_i = w_i N_i / W` over a B-spline space.
#[derive(Debug, Clone)]
pub struct NurbsSpace<const DIM: usize> {
    bspline: BSplineSpace<DIM>,
    weights: Vec<DynamicMultiArray<f64, DIM>>,
}

impl<const DIM: usize> NurbsSpace<DIM> {
    /// Weights per component, shaped like the component's basis.
    pub fn new(bspline: BSplineSpace<DIM>, weights: Vec<DynamicMultiArray<f64, DIM>>) -> Result<Self> {
        let table = bspline.spline_space().num_basis_table();
        if weights.len() != table.len() {
            return Err(IgaError::mismatch("weight components", table.len(), weights.len()));
        }
        for (c, (w, size)) in weights.iter().zip(table).enumerate() {
            for d in 0..DIM {
                if w.tensor_size()[d] != size[d] {
                    return Err(IgaError::mismatch(
                        format!("weights of component {} in direction {}", c, d),
                        size[d],
                        w.tensor_size()[d],
                    ));
                }
            }
            if let Some(bad) = w.as_slice().iter().find(|x| !x.is_finite()) {
                return Err(IgaError::Configuration(format!(
                    "weight {} of component {} is not finite",
                    bad, c
                )));
            }
        }
        Ok(Self { bspline, weights })
    }

    /// Weights in the global numbering of the B-spline space.
    pub fn from_flat_weights(bspline: BSplineSpace<DIM>, weights: &[f64]) -> Result<Self> {
        let table = bspline.spline_space().num_basis_table().to_vec();
        let total: usize = table.iter().map(|s| s.flat_size()).sum();
        if weights.len() != total {
            return Err(IgaError::mismatch("weights", total, weights.len()));
        }
        let mut start = 0;
        let mut per_comp = Vec::with_capacity(table.len());
        for size in table {
            let n = size.flat_size();
            per_comp.push(DynamicMultiArray::from_vec(size, weights[start..start + n].to_vec())?);
            start += n;
        }
        Self::new(bspline, per_comp)
    }

    /// All weights equal to one; the rational basis equals the B-spline basis.
    pub fn unit_weights(bspline: BSplineSpace<DIM>) -> Result<Self> {
        let weights = bspline
            .spline_space()
            .num_basis_table()
            .iter()
            .map(|size| DynamicMultiArray::filled(*size, 1.0))
            .collect();
        Self::new(bspline, weights)
    }

    pub fn bspline_space(&self) -> &BSplineSpace<DIM> {
        &self.bspline
    }

    pub fn weights(&self) -> &[DynamicMultiArray<f64, DIM>] {
        &self.weights
    }

    /// Weights of component `comp` for the functions active on `element`, in local order.
    pub fn element_weights(&self, comp: usize, element: &ElementHandle<DIM>) -> Result<Vec<f64>> {
        self.bspline
            .dof_distribution()
            .element_basis_indices(comp, &element.tensor)?
            .iter()
            .map(|idx| self.weights[comp].get(idx).copied())
            .collect()
    }

    /// The same space over the refined grid, weights refined by knot insertion.
    pub fn refined(&self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<Self> {
        let space = self.bspline.spline_space();
        let weights = self
            .weights
            .iter()
            .enumerate()
            .map(|(c, w)| refine_component_coefficients(space, c, event, w))
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.bspline.refined(grid, event)?, weights)
    }
}

impl<const DIM: usize> ReferenceBasis<DIM> for NurbsSpace<DIM> {
    fn grid(&self) -> &Arc<Grid<DIM>> {
        self.bspline.grid()
    }

    fn num_basis(&self) -> usize {
        self.bspline.num_basis()
    }

    fn num_element_basis(&self) -> usize {
        self.bspline.num_element_basis()
    }

    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        self.bspline.local_to_global(element, property)
    }

    fn face_dofs(&self, face: Face) -> Result<Vec<usize>> {
        self.bspline.face_dofs(face)
    }

    fn fill_cache(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<ElementBasisCache<DIM>> {
        let mut cache = self.bspline.fill_cache(element, quadrature, max_order)?;
        let n_points = cache.n_points();
        let mut offset = 0;
        for comp in 0..self.bspline.n_components() {
            let weights = self.element_weights(comp, element)?;
            let rows = offset..offset + weights.len();
            let (values, mut gradients, mut hessians) = cache.tables_mut();
            for q in 0..n_points {
                let mut v: Vec<f64> = rows.clone().map(|i| values[(i, q)]).collect();
                let mut g: Option<Vec<[f64; DIM]>> =
                    gradients.as_deref().map(|t| rows.clone().map(|i| t[(i, q)]).collect());
                let mut h: Option<Vec<[[f64; DIM]; DIM]>> =
                    hessians.as_deref().map(|t| rows.clone().map(|i| t[(i, q)]).collect());
                rational_correction(&weights, &mut v, g.as_deref_mut(), h.as_deref_mut())?;
                for (k, i) in rows.clone().enumerate() {
                    values[(i, q)] = v[k];
                    if let (Some(t), Some(g)) = (gradients.as_deref_mut(), g.as_ref()) {
                        t[(i, q)] = g[k];
                    }
                    if let (Some(t), Some(h)) = (hessians.as_deref_mut(), h.as_ref()) {
                        t[(i, q)] = h[k];
                    }
                }
            }
            offset = rows.end;
        }
        Ok(cache)
    }
}

impl<const DIM: usize> RefinementListener<DIM> for NurbsSpace<DIM> {
    fn on_refinement(&mut self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<()> {
        *self = self.refined(grid, event)?;
        Ok(())
    }
}
