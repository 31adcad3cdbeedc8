//! Global numbering of the basis functions of a spline space.
//!
//! Components are numbered one after the other; inside a component the
//! basis functions follow their tensor index in row-major order.

use std::ops::Range;

use iga_core::{check_range, IgaError, Result};
use iga_math::{TensorIndex, TensorSize, TensorSizedContainer};
use serde::{Deserialize, Serialize};

use crate::boundary::{Face, Side};
use crate::spline_space::{DegreeTable, SplineSpace};

/// Subset of the degrees of freedom of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DofProperty {
    /// Every basis function with support on the element.
    Active,
    /// Functions whose tensor index is not on the patch boundary.
    Interior,
    /// Functions whose tensor index is on the patch boundary.
    Boundary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DofDistribution<const DIM: usize> {
    layouts: Vec<TensorSizedContainer<DIM>>,
    offsets: Vec<usize>,
    degree: DegreeTable<DIM>,
    first_basis: Vec<[Vec<usize>; DIM]>,
    periodic: Vec<[bool; DIM]>,
}

impl<const DIM: usize> DofDistribution<DIM> {
    pub fn new(space: &SplineSpace<DIM>) -> Self {
        let layouts: Vec<_> = space
            .num_basis_table()
            .iter()
            .map(|size| TensorSizedContainer::new(*size))
            .collect();
        let mut offsets = Vec::with_capacity(layouts.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for layout in &layouts {
            total += layout.flat_size();
            offsets.push(total);
        }
        let n_comp = space.n_components();
        let first_basis = (0..n_comp)
            .map(|c| {
                std::array::from_fn(|d| {
                    let mut acc = space.accumulated_multiplicities(c, d);
                    acc.pop();
                    acc
                })
            })
            .collect();
        let periodic = (0..n_comp)
            .map(|c| std::array::from_fn(|d| space.is_periodic(c, d)))
            .collect();
        Self {
            layouts,
            offsets,
            degree: space.degree().clone(),
            first_basis,
            periodic,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn n_components(&self) -> usize {
        self.layouts.len()
    }

    /// Global indices of the functions of component `comp`.
    pub fn component_range(&self, comp: usize) -> Result<Range<usize>> {
        check_range("component", comp, self.n_components())?;
        Ok(self.offsets[comp]..self.offsets[comp + 1])
    }

    pub fn num_basis_component(&self, comp: usize) -> Result<TensorSize<DIM>> {
        check_range("component", comp, self.n_components())?;
        Ok(self.layouts[comp].tensor_size())
    }

    /// Global index of the function of component `comp` with tensor index `index`.
    pub fn basis_tensor_to_flat(&self, comp: usize, index: &TensorIndex<DIM>) -> Result<usize> {
        check_range("component", comp, self.n_components())?;
        Ok(self.offsets[comp] + self.layouts[comp].tensor_to_flat(index)?)
    }

    /// Component and tensor index of the global function `dof`.
    pub fn basis_flat_to_tensor(&self, dof: usize) -> Result<(usize, TensorIndex<DIM>)> {
        check_range("dof", dof, self.num_dofs())?;
        let comp = self.offsets.partition_point(|&o| o <= dof) - 1;
        let index = self.layouts[comp].flat_to_tensor(dof - self.offsets[comp])?;
        Ok((comp, index))
    }

    /// Whether the function lies on the boundary of a non-periodic direction.
    pub fn is_boundary_basis(&self, comp: usize, index: &TensorIndex<DIM>) -> bool {
        let size = self.layouts[comp].tensor_size();
        (0..DIM).any(|d| !self.periodic[comp][d] && (index[d] == 0 || index[d] + 1 == size[d]))
    }

    /// Tensor indices (within component `comp`) of the functions active on
    /// `element`, in local row-major order over the `(p_d + 1)` extents.
    pub fn element_basis_indices(&self, comp: usize, element: &TensorIndex<DIM>) -> Result<Vec<TensorIndex<DIM>>> {
        check_range("component", comp, self.n_components())?;
        for d in 0..DIM {
            check_range("element interval", element[d], self.first_basis[comp][d].len())?;
        }
        let size = self.layouts[comp].tensor_size();
        let first: [usize; DIM] = std::array::from_fn(|d| self.first_basis[comp][d][element[d]]);
        let local = TensorSizedContainer::<DIM>::new(TensorSize(std::array::from_fn(|d| self.degree[comp][d] + 1)));
        Ok(local
            .indices()
            .map(|k| {
                std::array::from_fn(|d| {
                    let i = first[d] + k[d];
                    if self.periodic[comp][d] {
                        i % size[d]
                    } else {
                        i
                    }
                })
            })
            .collect())
    }

    /// Global indices of the element's functions with the given property,
    /// component by component in local order.
    pub fn local_to_global(&self, element: &TensorIndex<DIM>, property: DofProperty) -> Result<Vec<usize>> {
        let mut dofs = Vec::new();
        for comp in 0..self.n_components() {
            for index in self.element_basis_indices(comp, element)? {
                let keep = match property {
                    DofProperty::Active => true,
                    DofProperty::Boundary => self.is_boundary_basis(comp, &index),
                    DofProperty::Interior => !self.is_boundary_basis(comp, &index),
                };
                if keep {
                    dofs.push(self.offsets[comp] + self.layouts[comp].tensor_to_flat(&index)?);
                }
            }
        }
        Ok(dofs)
    }

    /// Global indices of the functions whose tensor index lies on `face`,
    /// component by component, ascending.
    pub fn face_dofs(&self, face: Face) -> Result<Vec<usize>> {
        let dir = face.direction;
        check_range("face direction", dir, DIM)?;
        let mut out = Vec::new();
        for (comp, layout) in self.layouts.iter().enumerate() {
            if self.periodic[comp][dir] {
                return Err(IgaError::Configuration(format!(
                    "direction {} of component {} is periodic and has no faces",
                    dir, comp
                )));
            }
            let last = layout.tensor_size()[dir] - 1;
            let on_face = match face.side {
                Side::Lower => 0,
                Side::Upper => last,
            };
            for (flat, index) in layout.indices().enumerate() {
                if index[dir] == on_face {
                    out.push(self.offsets[comp] + flat);
                }
            }
        }
        Ok(out)
    }

    /// All global indices with the given property, ascending.
    pub fn dofs(&self, property: DofProperty) -> Vec<usize> {
        let mut out = Vec::new();
        for (comp, layout) in self.layouts.iter().enumerate() {
            for (flat, index) in layout.indices().enumerate() {
                let keep = match property {
                    DofProperty::Active => true,
                    DofProperty::Boundary => self.is_boundary_basis(comp, &index),
                    DofProperty::Interior => !self.is_boundary_basis(comp, &index),
                };
                if keep {
                    out.push(self.offsets[comp] + flat);
                }
            }
        }
        out
    }
}

/// Fail unless `dofs` has one entry per function of the distribution.
pub(crate) fn check_len<const DIM: usize>(what: &str, dofs: &DofDistribution<DIM>, len: usize) -> Result<()> {
    if len != dofs.num_dofs() {
        return Err(IgaError::mismatch(what, dofs.num_dofs(), len));
    }
    Ok(())
}
