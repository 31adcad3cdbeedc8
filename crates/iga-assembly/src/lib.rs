//! Element integration for spline spaces: sum-factorized and reference
//! quadrature-loop integrators, and parallel global assembly.

pub mod global;
pub mod integrator;
pub mod quadrature_loop;
pub mod sum_factorization;

pub use global::{assemble_matrix, element_matrices, ElementMatrix};
pub use integrator::{BilinearForm, Coefficient, ElementIntegrator};
pub use quadrature_loop::QuadratureLoopIntegrator;
pub use sum_factorization::SumFactorizedIntegrator;
