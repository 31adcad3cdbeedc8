//! Bases pushed forward to the physical domain of a geometry map.
//!
//! Values are kept (`u(x(xi)) = u_hat(xi)`), gradients become
//! `J^{-T} grad_xi` and hessians
//! `J^{-T} (H_xi - sum_k (du/dx_k) H_k) J^{-1}`, where `H_k` is the second
//! derivative of the `k`-th map coordinate. Quadrature measures pick up `|det J|`.

use std::sync::Arc;

use iga_core::{IgaError, Result, Tolerance};
use iga_grid::{ElementHandle, Grid};
use iga_math::TensorProductQuadrature;
use nalgebra::DMatrix;

use crate::boundary::Face;
use crate::cache::ElementBasisCache;
use crate::dofs::DofProperty;
use crate::evaluator::{check_derivative_order, ReferenceBasis};
use crate::mapping::GeometryMap;

/// A reference basis composed with a geometry map on the same grid.
#[derive(Debug, Clone)]
pub struct PhysicalSpace<const DIM: usize, B, M> {
    basis: B,
    map: M,
}

impl<const DIM: usize, B: ReferenceBasis<DIM>, M: GeometryMap<DIM>> PhysicalSpace<DIM, B, M> {
    pub fn new(basis: B, map: M) -> Result<Self> {
        if !basis.grid().same_as(map.grid()) {
            return Err(IgaError::GridMismatch(format!(
                "basis on grid {} (rev {}), map on grid {} (rev {})",
                basis.grid().id(),
                basis.grid().revision(),
                map.grid().id(),
                map.grid().revision()
            )));
        }
        Ok(Self { basis, map })
    }

    pub fn reference_basis(&self) -> &B {
        &self.basis
    }

    pub fn map(&self) -> &M {
        &self.map
    }
}

/// Determinant and inverse of a Jacobian.
fn invert<const DIM: usize>(jacobian: &[[f64; DIM]; DIM]) -> Result<(f64, [[f64; DIM]; DIM])> {
    let m = DMatrix::from_fn(DIM, DIM, |a, b| jacobian[a][b]);
    let det = m.determinant();
    if !det.is_finite() || det.abs() <= Tolerance::default().absolute {
        return Err(IgaError::DegenerateMap { value: det });
    }
    let inv = m.try_inverse().ok_or(IgaError::DegenerateMap { value: det })?;
    Ok((det, std::array::from_fn(|a| std::array::from_fn(|b| inv[(a, b)]))))
}

impl<const DIM: usize, B: ReferenceBasis<DIM>, M: GeometryMap<DIM>> ReferenceBasis<DIM> for PhysicalSpace<DIM, B, M> {
    fn grid(&self) -> &Arc<Grid<DIM>> {
        self.basis.grid()
    }

    fn num_basis(&self) -> usize {
        self.basis.num_basis()
    }

    fn num_element_basis(&self) -> usize {
        self.basis.num_element_basis()
    }

    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        self.basis.local_to_global(element, property)
    }

    fn face_dofs(&self, face: Face) -> Result<Vec<usize>> {
        self.basis.face_dofs(face)
    }

    fn fill_cache(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<ElementBasisCache<DIM>> {
        check_derivative_order(max_order)?;
        let mut cache = self.basis.fill_cache(element, quadrature, max_order)?;
        let mapped = self.map.evaluate(element, quadrature, max_order.max(1))?;
        let n_points = cache.n_points();

        let mut inverses = Vec::with_capacity(n_points);
        for (q, w_measure) in cache.w_measures_mut().iter_mut().enumerate() {
            let (det, inv) = invert(&mapped.jacobians[q])?;
            *w_measure *= det.abs();
            inverses.push(inv);
        }

        let (_, gradients, mut hessians) = cache.tables_mut();
        if let Some(grads) = gradients {
            for i in 0..grads.n_functions() {
                for (q, g) in grads.function_view_mut(i).iter_mut().enumerate() {
                    let inv = &inverses[q];
                    let g_hat = *g;
                    let g_x: [f64; DIM] = std::array::from_fn(|a| (0..DIM).map(|b| inv[b][a] * g_hat[b]).sum());
                    if let (Some(hess), Some(map_hess)) = (hessians.as_deref_mut(), mapped.hessians.as_ref()) {
                        let h_hat = hess[(i, q)];
                        let corrected: [[f64; DIM]; DIM] = std::array::from_fn(|b| {
                            std::array::from_fn(|c| {
                                h_hat[b][c] - (0..DIM).map(|k| g_x[k] * map_hess[q][k][b][c]).sum::<f64>()
                            })
                        });
                        hess[(i, q)] = std::array::from_fn(|a| {
                            std::array::from_fn(|e| {
                                let mut sum = 0.0;
                                for b in 0..DIM {
                                    for c in 0..DIM {
                                        sum += inv[b][a] * corrected[b][c] * inv[c][e];
                                    }
                                }
                                sum
                            })
                        });
                    }
                    *g = g_x;
                }
            }
        }

        cache.points_mut().copy_from_slice(&mapped.points);
        cache.set_jacobians(mapped.jacobians);
        Ok(cache)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bspline_space::BSplineSpace;
    use crate::mapping::{LinearMap, SplineMap};
    use crate::nurbs::NurbsSpace;
    use approx::assert_relative_eq;

    pub(crate) type Annulus = PhysicalSpace<2, NurbsSpace<2>, SplineMap<2, NurbsSpace<2>>>;

    /// Quarter annulus with radii 1 and 2: linear in the radius (direction 0),
    /// exact quadratic arcs in the angle (direction 1).
    pub(crate) fn annulus() -> Annulus {
        let grid = Arc::new(Grid::<2>::uniform([2, 2]).unwrap());
        let bspline = BSplineSpace::scalar(grid, [1, 2]).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let nurbs = NurbsSpace::from_flat_weights(bspline, &[1.0, s, 1.0, 1.0, s, 1.0]).unwrap();
        let control_points = [1.0, 2.0]
            .iter()
            .flat_map(|&r| [[r, 0.0], [r, r], [0.0, r]])
            .collect();
        let map = SplineMap::new(nurbs.clone(), control_points).unwrap();
        PhysicalSpace::new(nurbs, map).unwrap()
    }

    #[test]
    fn test_affine_map_scales_measures_and_gradients() {
        let grid = Arc::new(Grid::<2>::uniform([3, 3]).unwrap());
        let space = BSplineSpace::scalar(grid.clone(), [2, 1]).unwrap();
        let map = LinearMap::new(grid.clone(), [[2.0, 0.0], [0.0, 3.0]], [1.0, -1.0]);
        let physical = PhysicalSpace::new(space.clone(), map).unwrap();
        let quad = TensorProductQuadrature::<2>::gauss_uniform(3).unwrap();

        let mut area = 0.0;
        for elem in 0..grid.num_elements() {
            let handle = grid.element_handle(elem).unwrap();
            let reference = space.fill_cache(&handle, &quad, 2).unwrap();
            let mapped = physical.fill_cache(&handle, &quad, 2).unwrap();
            assert_eq!(mapped.jacobians().unwrap()[0], [[2.0, 0.0], [0.0, 3.0]]);
            area += mapped.w_measures().iter().sum::<f64>();
            for q in 0..mapped.n_points() {
                let xi = reference.points()[q];
                assert_relative_eq!(mapped.points()[q][0], 2.0 * xi[0] + 1.0, epsilon = 1e-15);
                assert_relative_eq!(mapped.points()[q][1], 3.0 * xi[1] - 1.0, epsilon = 1e-15);
                for i in 0..mapped.n_basis() {
                    let g = reference.gradients().unwrap()[(i, q)];
                    let h = reference.hessians().unwrap()[(i, q)];
                    assert_eq!(mapped.values()[(i, q)], reference.values()[(i, q)]);
                    assert_relative_eq!(mapped.gradients().unwrap()[(i, q)][0], g[0] / 2.0, epsilon = 1e-13);
                    assert_relative_eq!(mapped.gradients().unwrap()[(i, q)][1], g[1] / 3.0, epsilon = 1e-13);
                    assert_relative_eq!(mapped.hessians().unwrap()[(i, q)][0][0], h[0][0] / 4.0, epsilon = 1e-12);
                    assert_relative_eq!(mapped.hessians().unwrap()[(i, q)][0][1], h[0][1] / 6.0, epsilon = 1e-12);
                }
            }
        }
        assert_relative_eq!(area, 6.0, epsilon = 1e-13);
    }

    #[test]
    fn test_identity_spline_map_changes_nothing() {
        let grid = Arc::new(Grid::<2>::from_knots([vec![0.0, 0.4, 1.0], vec![0.0, 1.0, 2.5]]).unwrap());
        let space = BSplineSpace::scalar(grid.clone(), [2, 2]).unwrap();
        let map = SplineMap::identity(space.clone()).unwrap();
        let physical = PhysicalSpace::new(space.clone(), map).unwrap();
        let quad = TensorProductQuadrature::<2>::gauss_uniform(2).unwrap();
        for elem in 0..grid.num_elements() {
            let handle = grid.element_handle(elem).unwrap();
            let reference = space.fill_cache(&handle, &quad, 2).unwrap();
            let mapped = physical.fill_cache(&handle, &quad, 2).unwrap();
            for q in 0..mapped.n_points() {
                assert_relative_eq!(mapped.w_measures()[q], reference.w_measures()[q], epsilon = 1e-13);
                for i in 0..mapped.n_basis() {
                    for a in 0..2 {
                        assert_relative_eq!(
                            mapped.gradients().unwrap()[(i, q)][a],
                            reference.gradients().unwrap()[(i, q)][a],
                            epsilon = 1e-11
                        );
                        for b in 0..2 {
                            assert_relative_eq!(
                                mapped.hessians().unwrap()[(i, q)][a][b],
                                reference.hessians().unwrap()[(i, q)][a][b],
                                epsilon = 1e-9
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_degenerate_and_mismatched_maps() {
        let grid = Arc::new(Grid::<2>::uniform([2, 2]).unwrap());
        let space = BSplineSpace::scalar(grid.clone(), [1, 1]).unwrap();
        let flat = LinearMap::new(grid.clone(), [[1.0, 2.0], [2.0, 4.0]], [0.0, 0.0]);
        let physical = PhysicalSpace::new(space.clone(), flat).unwrap();
        let quad = TensorProductQuadrature::<2>::gauss_uniform(1).unwrap();
        let handle = grid.element_handle(0).unwrap();
        assert!(matches!(
            physical.fill_cache(&handle, &quad, 0),
            Err(IgaError::DegenerateMap { .. })
        ));

        let other = LinearMap::identity(Arc::new(Grid::<2>::uniform([2, 2]).unwrap()));
        assert!(matches!(PhysicalSpace::new(space, other), Err(IgaError::GridMismatch(_))));
    }

    #[test]
    fn test_annulus_area_and_coordinate_derivatives() {
        let physical = annulus();
        let control_points = physical.map().control_points().to_vec();
        let quad = TensorProductQuadrature::<2>::gauss_uniform(10).unwrap();
        let handle = physical.grid().element_handle(0).unwrap();
        let cache = physical.fill_cache(&handle, &quad, 2).unwrap();
        let dofs = physical.local_to_global(&handle, DofProperty::Active).unwrap();

        let area: f64 = cache.w_measures().iter().sum();
        assert_relative_eq!(area, 0.75 * std::f64::consts::PI, epsilon = 1e-9);

        // u = x_0 has gradient (1, 0) and no curvature in physical space
        let grads = cache.gradients().unwrap();
        let hess = cache.hessians().unwrap();
        for q in 0..cache.n_points() {
            let mut g = [0.0; 2];
            let mut h = [[0.0; 2]; 2];
            for (i, &dof) in dofs.iter().enumerate() {
                let c = control_points[dof][0];
                for a in 0..2 {
                    g[a] += c * grads[(i, q)][a];
                    for b in 0..2 {
                        h[a][b] += c * hess[(i, q)][a][b];
                    }
                }
            }
            assert_relative_eq!(g[0], 1.0, epsilon = 1e-11);
            assert_relative_eq!(g[1], 0.0, epsilon = 1e-11);
            for row in h {
                for entry in row {
                    assert_relative_eq!(entry, 0.0, epsilon = 1e-9);
                }
            }
            let x = cache.points()[q];
            let r = (x[0] * x[0] + x[1] * x[1]).sqrt();
            assert!((1.0 - 1e-12..=2.0 + 1e-12).contains(&r));
        }
    }
}
