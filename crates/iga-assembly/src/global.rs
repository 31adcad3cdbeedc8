//! Parallel computation of element matrices and their scatter into a global matrix.

use iga_basis::DofProperty;
use iga_core::Result;
use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::integrator::{BilinearForm, ElementIntegrator};

/// An element matrix together with the global indices of its rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMatrix {
    pub element: usize,
    pub dofs: Vec<usize>,
    pub matrix: DMatrix<f64>,
}

/// Element matrices of every element, computed in parallel, in element order.
pub fn element_matrices<const DIM: usize, I>(
    integrator: &I,
    form: BilinearForm,
    property: DofProperty,
) -> Result<Vec<ElementMatrix>>
where
    I: ElementIntegrator<DIM> + ?Sized,
{
    let grid = integrator.grid();
    (0..grid.num_elements())
        .into_par_iter()
        .map(|element| {
            let handle = grid.element_handle(element)?;
            Ok(ElementMatrix {
                element,
                dofs: integrator.local_to_global(&handle, property)?,
                matrix: integrator.element_matrix(&handle, form, property)?,
            })
        })
        .collect()
}

/// Dense global matrix of `form` over all elements.
pub fn assemble_matrix<const DIM: usize, I>(
    integrator: &I,
    form: BilinearForm,
    property: DofProperty,
) -> Result<DMatrix<f64>>
where
    I: ElementIntegrator<DIM> + ?Sized,
{
    let locals = element_matrices(integrator, form, property)?;
    let n = integrator.num_dofs();
    let mut global = DMatrix::zeros(n, n);
    for local in &locals {
        for (li, &gi) in local.dofs.iter().enumerate() {
            for (lj, &gj) in local.dofs.iter().enumerate() {
                global[(gi, gj)] += local.matrix[(li, lj)];
            }
        }
    }
    debug!(
        "assembled {:?} matrix: {} elements, {} dofs",
        form,
        locals.len(),
        n
    );
    Ok(global)
}
