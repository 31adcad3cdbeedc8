//! Patch faces and L2 projection of boundary data onto face dofs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use iga_core::{IgaError, Result};
use iga_math::{gauss_legendre, TensorProductQuadrature};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::dofs::DofProperty;
use crate::evaluator::ReferenceBasis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Lower,
    Upper,
}

impl Side {
    /// Reference coordinate of this side of an element.
    pub fn coordinate(self) -> f64 {
        match self {
            Side::Lower => 0.0,
            Side::Upper => 1.0,
        }
    }
}

/// A face of the patch: the lower or upper end of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    pub direction: usize,
    pub side: Side,
}

impl Face {
    pub fn new(direction: usize, side: Side) -> Self {
        Self { direction, side }
    }

    /// `2 * direction` for the lower side, `2 * direction + 1` for the upper.
    pub fn index(&self) -> usize {
        2 * self.direction + usize::from(self.side == Side::Upper)
    }

    pub fn from_index(index: usize) -> Self {
        let side = if index % 2 == 0 { Side::Lower } else { Side::Upper };
        Self::new(index / 2, side)
    }

    /// The `2 * dim` faces of a `dim`-dimensional patch, by index.
    pub fn all(dim: usize) -> impl Iterator<Item = Face> {
        (0..2 * dim).map(Face::from_index)
    }
}

/// `sqrt(det(J_f^T J_f))` with `J_f` the Jacobian without column `dir`.
fn surface_stretch<const DIM: usize>(jacobian: Option<&[[f64; DIM]; DIM]>, dir: usize) -> f64 {
    match jacobian {
        Some(j) if DIM > 1 => {
            let cols: Vec<usize> = (0..DIM).filter(|&b| b != dir).collect();
            let jf = DMatrix::from_fn(DIM, DIM - 1, |a, k| j[a][cols[k]]);
            (jf.transpose() * jf).determinant().max(0.0).sqrt()
        }
        _ => 1.0,
    }
}

/// L2 projection of `data` onto the dofs of `faces`.
///
/// `data(x, comp)` is evaluated at the points the basis reports, so a
/// mapped basis receives physical coordinates. Each face is integrated with
/// an `n_points` Gauss rule per tangential direction. The result maps every
/// global dof on the union of the faces to its coefficient.
pub fn project_boundary_values<const DIM: usize, B, F>(
    basis: &B,
    faces: &[Face],
    n_points: usize,
    data: F,
) -> Result<BTreeMap<usize, f64>>
where
    B: ReferenceBasis<DIM> + ?Sized,
    F: Fn(&[f64; DIM], usize) -> f64,
{
    let mut face_dofs = BTreeSet::new();
    for face in faces {
        face_dofs.extend(basis.face_dofs(*face)?);
    }
    if face_dofs.is_empty() {
        return Ok(BTreeMap::new());
    }
    let row_of: HashMap<usize, usize> = face_dofs.iter().enumerate().map(|(row, &dof)| (dof, row)).collect();
    let n = face_dofs.len();
    let mut mass = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);

    let (gauss_points, gauss_weights) = gauss_legendre(n_points)?;
    let grid = basis.grid();
    for face in faces {
        let dir = face.direction;
        let quadrature = TensorProductQuadrature::<DIM>::new(
            std::array::from_fn(|a| {
                if a == dir {
                    vec![face.side.coordinate()]
                } else {
                    gauss_points.clone()
                }
            }),
            std::array::from_fn(|a| if a == dir { vec![1.0] } else { gauss_weights.clone() }),
        )?;
        let weights = quadrature.flat_weights();

        for element in grid.elements().filter(|e| e.is_boundary_face(face.index())) {
            let handle = element.handle();
            let lengths = element.lengths();
            let face_measure: f64 = (0..DIM).filter(|&a| a != dir).map(|a| lengths[a]).product();
            let cache = basis.fill_cache(&handle, &quadrature, 0)?;
            let dofs = basis.local_to_global(&handle, DofProperty::Active)?;
            let values = cache.values();
            let components = cache.components();

            for q in 0..cache.n_points() {
                let w = weights[q] * face_measure * surface_stretch(cache.jacobians().map(|j| &j[q]), dir);
                let x = &cache.points()[q];
                for (i, dof_i) in dofs.iter().enumerate() {
                    let row = match row_of.get(dof_i) {
                        Some(&row) => row,
                        None => continue,
                    };
                    let comp = components[i];
                    let v_i = values[(i, q)];
                    rhs[row] += w * data(x, comp) * v_i;
                    for (j, dof_j) in dofs.iter().enumerate() {
                        if components[j] != comp {
                            continue;
                        }
                        if let Some(&col) = row_of.get(dof_j) {
                            mass[(row, col)] += w * v_i * values[(j, q)];
                        }
                    }
                }
            }
        }
    }

    let cholesky = mass.cholesky().ok_or_else(|| {
        IgaError::Configuration(format!("boundary mass matrix on {} face dofs is singular", n))
    })?;
    let coefficients = cholesky.solve(&rhs);
    Ok(face_dofs.into_iter().zip(coefficients.iter().copied()).collect())
}
