//! Geometry maps from the parametric grid domain to the physical domain.
//!
//! A map is evaluated element by element at the points of a quadrature rule,
//! giving the physical points, the Jacobians `J[a][b] = dx_a / dxi_b` and,
//! from derivative order 2, the second derivatives
//! `H[a][b][c] = d^2 x_a / dxi_b dxi_c`. Derivatives are taken with respect to
//! the grid coordinates `xi`.

use std::sync::Arc;

use iga_core::{IgaError, Result};
use iga_grid::{ElementHandle, Grid};
use iga_math::TensorProductQuadrature;

use crate::bspline_space::BSplineSpace;
use crate::dofs::DofProperty;
use crate::evaluator::{check_derivative_order, ReferenceBasis};

/// Map data at the quadrature points of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedPoints<const DIM: usize> {
    pub points: Vec<[f64; DIM]>,
    pub jacobians: Vec<[[f64; DIM]; DIM]>,
    pub hessians: Option<Vec<[[[f64; DIM]; DIM]; DIM]>>,
}

/// A map `x(xi)` over the elements of a grid.
pub trait GeometryMap<const DIM: usize> {
    fn grid(&self) -> &Arc<Grid<DIM>>;

    /// Points and Jacobians, plus second derivatives when `max_order >= 2`.
    fn evaluate(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<MappedPoints<DIM>>;
}

/// Affine map `x = A xi + b`.
#[derive(Debug, Clone)]
pub struct LinearMap<const DIM: usize> {
    grid: Arc<Grid<DIM>>,
    a: [[f64; DIM]; DIM],
    b: [f64; DIM],
}

impl<const DIM: usize> LinearMap<DIM> {
    pub fn new(grid: Arc<Grid<DIM>>, a: [[f64; DIM]; DIM], b: [f64; DIM]) -> Self {
        Self { grid, a, b }
    }

    pub fn identity(grid: Arc<Grid<DIM>>) -> Self {
        let a = std::array::from_fn(|i| std::array::from_fn(|j| if i == j { 1.0 } else { 0.0 }));
        Self::new(grid, a, [0.0; DIM])
    }
}

impl<const DIM: usize> GeometryMap<DIM> for LinearMap<DIM> {
    fn grid(&self) -> &Arc<Grid<DIM>> {
        &self.grid
    }

    fn evaluate(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<MappedPoints<DIM>> {
        check_derivative_order(max_order)?;
        let geometry = self.grid.element_at(&element.tensor)?;
        let points = quadrature
            .layout()
            .indices()
            .map(|idx| {
                let xi = geometry.map_reference_point(&quadrature.point_at(&idx));
                std::array::from_fn(|a| self.b[a] + (0..DIM).map(|b| self.a[a][b] * xi[b]).sum::<f64>())
            })
            .collect::<Vec<[f64; DIM]>>();
        let n = points.len();
        Ok(MappedPoints {
            points,
            jacobians: vec![self.a; n],
            hessians: (max_order >= 2).then(|| vec![[[[0.0; DIM]; DIM]; DIM]; n]),
        })
    }
}

/// Map `x = sum_i P_i N_i(xi)` with control points `P_i` over a scalar basis.
///
/// With a NURBS basis this represents conic sections exactly.
#[derive(Debug, Clone)]
pub struct SplineMap<const DIM: usize, B> {
    basis: B,
    control_points: Vec<[f64; DIM]>,
}

impl<const DIM: usize, B: ReferenceBasis<DIM>> SplineMap<DIM, B> {
    /// One control point per function of `basis`, in its global numbering.
    pub fn new(basis: B, control_points: Vec<[f64; DIM]>) -> Result<Self> {
        if control_points.len() != basis.num_basis() {
            return Err(IgaError::mismatch("control points", basis.num_basis(), control_points.len()));
        }
        if let Some(p) = control_points.iter().find(|p| p.iter().any(|x| !x.is_finite())) {
            return Err(IgaError::Configuration(format!("control point {:?} is not finite", p)));
        }
        Ok(Self { basis, control_points })
    }

    pub fn basis(&self) -> &B {
        &self.basis
    }

    pub fn control_points(&self) -> &[[f64; DIM]] {
        &self.control_points
    }
}

impl<const DIM: usize> SplineMap<DIM, BSplineSpace<DIM>> {
    /// The identity map of a scalar B-spline space, with the control points
    /// at the Greville abscissae. Needs degree at least 1 in every direction.
    pub fn identity(space: BSplineSpace<DIM>) -> Result<Self> {
        if space.n_components() != 1 {
            return Err(IgaError::Configuration(format!(
                "a geometry map needs a scalar space, got {} components",
                space.n_components()
            )));
        }
        if let Some(d) = (0..DIM).find(|&d| space.degree()[0][d] == 0) {
            return Err(IgaError::Configuration(format!(
                "degree 0 in direction {} cannot represent the identity",
                d
            )));
        }
        let greville = (0..DIM)
            .map(|d| space.spline_space().greville_abscissae(0, d))
            .collect::<Result<Vec<_>>>()?;
        let control_points = (0..space.num_basis())
            .map(|flat| {
                let (_, idx) = space.dof_distribution().basis_flat_to_tensor(flat)?;
                Ok(std::array::from_fn(|d| greville[d][idx[d]]))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(space, control_points)
    }
}

impl<const DIM: usize, B: ReferenceBasis<DIM>> GeometryMap<DIM> for SplineMap<DIM, B> {
    fn grid(&self) -> &Arc<Grid<DIM>> {
        self.basis.grid()
    }

    fn evaluate(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<MappedPoints<DIM>> {
        check_derivative_order(max_order)?;
        let cache = self.basis.fill_cache(element, quadrature, max_order.max(1))?;
        if let Some(&c) = cache.components().iter().find(|&&c| c != 0) {
            return Err(IgaError::Configuration(format!(
                "geometry map basis has a component {} function",
                c
            )));
        }
        let dofs = self.basis.local_to_global(element, DofProperty::Active)?;
        let n_points = cache.n_points();
        let grads = cache.gradients()?;

        let mut points = vec![[0.0; DIM]; n_points];
        let mut jacobians = vec![[[0.0; DIM]; DIM]; n_points];
        for (i, &dof) in dofs.iter().enumerate() {
            let p = self.control_points[dof];
            for q in 0..n_points {
                let v = cache.values()[(i, q)];
                let g = grads[(i, q)];
                for a in 0..DIM {
                    points[q][a] += p[a] * v;
                    for b in 0..DIM {
                        jacobians[q][a][b] += p[a] * g[b];
                    }
                }
            }
        }

        let hessians = if max_order >= 2 {
            let table = cache.hessians()?;
            let mut out = vec![[[[0.0; DIM]; DIM]; DIM]; n_points];
            for (i, &dof) in dofs.iter().enumerate() {
                let p = self.control_points[dof];
                for (q, h) in table.function_view(i).iter().enumerate() {
                    for a in 0..DIM {
                        for b in 0..DIM {
                            for c in 0..DIM {
                                out[q][a][b][c] += p[a] * h[b][c];
                            }
                        }
                    }
                }
            }
            Some(out)
        } else {
            None
        };

        Ok(MappedPoints {
            points,
            jacobians,
            hessians,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::NurbsSpace;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_map_points_and_jacobian() {
        let grid = Arc::new(Grid::<2>::uniform([3, 2]).unwrap());
        let map = LinearMap::new(grid.clone(), [[2.0, 0.0], [1.0, 3.0]], [0.0, 1.0]);
        let quad = TensorProductQuadrature::<2>::from_points([vec![0.5], vec![0.0]]).unwrap();
        let mapped = map.evaluate(&grid.element_handle(1).unwrap(), &quad, 2).unwrap();
        // element 1 is [0.5, 1] x [0, 1]
        assert_eq!(mapped.points, vec![[1.5, 1.75]]);
        assert_eq!(mapped.jacobians[0], [[2.0, 0.0], [1.0, 3.0]]);
        assert_eq!(mapped.hessians.unwrap()[0], [[[0.0; 2]; 2]; 2]);
    }

    #[test]
    fn test_greville_identity_reproduces_points() {
        let grid = Arc::new(Grid::<2>::from_knots([vec![0.0, 0.3, 1.0], vec![-1.0, 0.5, 2.0]]).unwrap());
        let space = BSplineSpace::scalar(grid.clone(), [2, 3]).unwrap();
        let map = SplineMap::identity(space).unwrap();
        let quad = TensorProductQuadrature::<2>::gauss_uniform(3).unwrap();
        for elem in 0..grid.num_elements() {
            let handle = grid.element_handle(elem).unwrap();
            let mapped = map.evaluate(&handle, &quad, 2).unwrap();
            let geometry = grid.element(elem).unwrap();
            for (q, idx) in quad.layout().indices().enumerate() {
                let xi = geometry.map_reference_point(&quad.point_at(&idx));
                for a in 0..2 {
                    assert_relative_eq!(mapped.points[q][a], xi[a], epsilon = 1e-13);
                    for b in 0..2 {
                        let delta = if a == b { 1.0 } else { 0.0 };
                        assert_relative_eq!(mapped.jacobians[q][a][b], delta, epsilon = 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn test_spline_map_checks() {
        let grid = Arc::new(Grid::<1>::uniform([3]).unwrap());
        let space = BSplineSpace::scalar(grid.clone(), [1]).unwrap();
        assert!(matches!(
            SplineMap::new(space.clone(), vec![[0.0]; 2]),
            Err(IgaError::DimensionMismatch { .. })
        ));
        assert!(SplineMap::new(space, vec![[0.0], [f64::NAN], [1.0]]).is_err());
        let flat = BSplineSpace::scalar(grid, [0]).unwrap();
        assert!(matches!(SplineMap::identity(flat), Err(IgaError::Configuration(_))));
    }

    #[test]
    fn test_quarter_circle_points_on_arc() {
        let grid = Arc::new(Grid::<1>::uniform([2]).unwrap());
        let bspline = BSplineSpace::scalar(grid.clone(), [2]).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let nurbs = NurbsSpace::from_flat_weights(bspline, &[1.0, s, 1.0]).unwrap();
        // a 1-D map only sees the first coordinate of the arc
        let map = SplineMap::new(nurbs, vec![[1.0], [1.0], [0.0]]).unwrap();
        let quad = TensorProductQuadrature::<1>::from_points([vec![0.0, 0.5, 1.0]]).unwrap();
        let mapped = map.evaluate(&grid.element_handle(0).unwrap(), &quad, 1).unwrap();
        assert_relative_eq!(mapped.points[0][0], 1.0, epsilon = 1e-15);
        assert_relative_eq!(mapped.points[1][0], s, epsilon = 1e-14);
        assert_relative_eq!(mapped.points[2][0], 0.0, epsilon = 1e-15);
    }
}
