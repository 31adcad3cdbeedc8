//! Per-element tables of basis values and derivatives at quadrature points.

use std::ops::{Index, IndexMut};

use iga_core::{IgaError, Result};
use iga_grid::ElementHandle;
use iga_math::{QuadratureId, TensorProductQuadrature};

/// Dense `function x point` table, stored function by function.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable<T> {
    n_functions: usize,
    n_points: usize,
    data: Vec<T>,
}

impl<T: Clone> ValueTable<T> {
    pub fn filled(n_functions: usize, n_points: usize, value: T) -> Self {
        Self {
            n_functions,
            n_points,
            data: vec![value; n_functions * n_points],
        }
    }
}

impl<T> ValueTable<T> {
    pub fn n_functions(&self) -> usize {
        self.n_functions
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Values of function `function` at every point.
    pub fn function_view(&self, function: usize) -> &[T] {
        let start = function * self.n_points;
        &self.data[start..start + self.n_points]
    }

    pub fn function_view_mut(&mut self, function: usize) -> &mut [T] {
        let start = function * self.n_points;
        &mut self.data[start..start + self.n_points]
    }

    /// Values of every function at point `point`.
    pub fn point_values(&self, point: usize) -> impl Iterator<Item = &T> + '_ {
        self.data.iter().skip(point).step_by(self.n_points.max(1)).take(self.n_functions)
    }
}

impl<T> Index<(usize, usize)> for ValueTable<T> {
    type Output = T;

    fn index(&self, (function, point): (usize, usize)) -> &T {
        &self.data[function * self.n_points + point]
    }
}

impl<T> IndexMut<(usize, usize)> for ValueTable<T> {
    fn index_mut(&mut self, (function, point): (usize, usize)) -> &mut T {
        &mut self.data[function * self.n_points + point]
    }
}

/// Basis values and derivatives of the functions active on one element.
///
/// Local functions are ordered component by component, each component in
/// row-major order of its local tensor index. Gradients are filled from
/// derivative order 1 and hessians from order 2, all in physical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBasisCache<const DIM: usize> {
    element: ElementHandle<DIM>,
    quadrature: QuadratureId,
    max_order: usize,
    components: Vec<usize>,
    values: ValueTable<f64>,
    gradients: Option<ValueTable<[f64; DIM]>>,
    hessians: Option<ValueTable<[[f64; DIM]; DIM]>>,
    points: Vec<[f64; DIM]>,
    w_measures: Vec<f64>,
    jacobians: Option<Vec<[[f64; DIM]; DIM]>>,
}

impl<const DIM: usize> ElementBasisCache<DIM> {
    /// Zeroed cache for `components.len()` local functions.
    pub fn new(
        element: ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
        components: Vec<usize>,
    ) -> Self {
        let n_basis = components.len();
        let n_points = quadrature.num_points();
        Self {
            element,
            quadrature: quadrature.id(),
            max_order,
            components,
            values: ValueTable::filled(n_basis, n_points, 0.0),
            gradients: (max_order >= 1).then(|| ValueTable::filled(n_basis, n_points, [0.0; DIM])),
            hessians: (max_order >= 2).then(|| ValueTable::filled(n_basis, n_points, [[0.0; DIM]; DIM])),
            points: vec![[0.0; DIM]; n_points],
            w_measures: vec![0.0; n_points],
            jacobians: None,
        }
    }

    pub fn element(&self) -> ElementHandle<DIM> {
        self.element
    }

    pub fn quadrature_id(&self) -> QuadratureId {
        self.quadrature
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    pub fn n_basis(&self) -> usize {
        self.components.len()
    }

    pub fn n_points(&self) -> usize {
        self.w_measures.len()
    }

    /// Component of every local function.
    pub fn components(&self) -> &[usize] {
        &self.components
    }

    pub fn values(&self) -> &ValueTable<f64> {
        &self.values
    }

    pub fn gradients(&self) -> Result<&ValueTable<[f64; DIM]>> {
        self.gradients
            .as_ref()
            .ok_or_else(|| IgaError::out_of_range("cached derivative order", 1, self.max_order + 1))
    }

    pub fn hessians(&self) -> Result<&ValueTable<[[f64; DIM]; DIM]>> {
        self.hessians
            .as_ref()
            .ok_or_else(|| IgaError::out_of_range("cached derivative order", 2, self.max_order + 1))
    }

    /// Divergence of each vector-valued local function.
    ///
    /// A function of component `c` has a single non-zero entry, so its
    /// divergence is its `c`-th partial derivative.
    pub fn divergences(&self) -> Result<ValueTable<f64>> {
        let grads = self.gradients()?;
        if let Some(&c) = self.components.iter().find(|&&c| c >= DIM) {
            return Err(IgaError::mismatch("components for a divergence", DIM, c + 1));
        }
        let mut div = ValueTable::filled(self.n_basis(), self.n_points(), 0.0);
        for (i, &c) in self.components.iter().enumerate() {
            for q in 0..self.n_points() {
                div[(i, q)] = grads[(i, q)][c];
            }
        }
        Ok(div)
    }

    /// Physical coordinates of the quadrature points.
    pub fn points(&self) -> &[[f64; DIM]] {
        &self.points
    }

    /// Quadrature weight times element measure, per point.
    pub fn w_measures(&self) -> &[f64] {
        &self.w_measures
    }

    /// Jacobians `J[a][b] = dx_a / dxi_b` of the geometry map, when the
    /// cache was filled through one.
    pub fn jacobians(&self) -> Option<&[[[f64; DIM]; DIM]]> {
        self.jacobians.as_deref()
    }

    pub(crate) fn set_jacobians(&mut self, jacobians: Vec<[[f64; DIM]; DIM]>) {
        self.jacobians = Some(jacobians);
    }

    pub(crate) fn tables_mut(
        &mut self,
    ) -> (
        &mut ValueTable<f64>,
        Option<&mut ValueTable<[f64; DIM]>>,
        Option<&mut ValueTable<[[f64; DIM]; DIM]>>,
    ) {
        (&mut self.values, self.gradients.as_mut(), self.hessians.as_mut())
    }

    pub(crate) fn points_mut(&mut self) -> &mut [[f64; DIM]] {
        &mut self.points
    }

    pub(crate) fn w_measures_mut(&mut self) -> &mut [f64] {
        &mut self.w_measures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_table_layout() {
        let mut t = ValueTable::filled(3, 2, 0.0);
        t[(1, 0)] = 4.0;
        t[(2, 1)] = 5.0;
        assert_eq!(t.function_view(1), &[4.0, 0.0]);
        assert_eq!(t.point_values(1).copied().collect::<Vec<_>>(), vec![0.0, 0.0, 5.0]);
        t.function_view_mut(0)[1] = 1.0;
        assert_eq!(t[(0, 1)], 1.0);
    }

    #[test]
    fn test_cache_tables_follow_order() {
        let quad = TensorProductQuadrature::<2>::gauss_uniform(2).unwrap();
        let handle = ElementHandle { flat: 0, tensor: [0, 0] };
        let cache = ElementBasisCache::new(handle, &quad, 1, vec![0, 0, 1]);
        assert_eq!(cache.n_basis(), 3);
        assert_eq!(cache.n_points(), 4);
        assert!(cache.gradients().is_ok());
        assert!(matches!(
            cache.hessians(),
            Err(IgaError::IndexOutOfRange { index: 2, bound: 2, .. })
        ));
        assert_eq!(cache.divergences().unwrap().n_functions(), 3);

        let scalar = ElementBasisCache::new(handle, &quad, 0, vec![0]);
        assert!(scalar.gradients().is_err());
    }
}
