//! The element-integration interface shared by the integrators.

use std::sync::Arc;

use iga_basis::DofProperty;
use iga_core::Result;
use iga_grid::{ElementHandle, Grid};
use nalgebra::DMatrix;

/// Bilinear forms with tensor-product structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BilinearForm {
    /// `∫ c u v`
    Mass,
    /// `∫ c ∇u · ∇v`
    Stiffness,
    /// `∫ c ∇²u : ∇²v`
    Hessian,
}

impl BilinearForm {
    /// Derivative order the basis has to be evaluated to.
    pub fn derivative_order(self) -> usize {
        match self {
            Self::Mass => 0,
            Self::Stiffness => 1,
            Self::Hessian => 2,
        }
    }
}

/// Scalar coefficient of a bilinear form, evaluated at physical points.
pub type Coefficient<'a, const DIM: usize> = &'a (dyn Fn(&[f64; DIM]) -> f64 + Sync);

/// Computes local element matrices; shared across threads during assembly.
pub trait ElementIntegrator<const DIM: usize>: Sync {
    fn grid(&self) -> &Arc<Grid<DIM>>;

    /// Size of the global matrix.
    fn num_dofs(&self) -> usize;

    /// Global indices of the rows and columns of the element matrix.
    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>>;

    fn element_matrix(
        &self,
        element: &ElementHandle<DIM>,
        form: BilinearForm,
        property: DofProperty,
    ) -> Result<DMatrix<f64>>;
}
