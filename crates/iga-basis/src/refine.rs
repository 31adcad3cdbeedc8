//! Transfer of spline coefficients to a refined space by knot insertion.

use iga_core::{IgaError, Result};
use iga_grid::RefinementEvent;
use iga_math::{DynamicMultiArray, TensorSize};
use nalgebra::DMatrix;

use crate::knot::knot_insertion_matrix;
use crate::spline_space::SplineSpace;

/// Multiply `matrix` into `array` along `axis`.
pub fn apply_along_axis<const DIM: usize>(
    matrix: &DMatrix<f64>,
    array: &DynamicMultiArray<f64, DIM>,
    axis: usize,
) -> Result<DynamicMultiArray<f64, DIM>> {
    let size = array.tensor_size();
    if matrix.ncols() != size[axis] {
        return Err(IgaError::mismatch(format!("coefficients along axis {}", axis), matrix.ncols(), size[axis]));
    }
    let mut new_size = size.as_array();
    new_size[axis] = matrix.nrows();
    let mut out = DynamicMultiArray::filled(TensorSize(new_size), 0.0);
    let indices: Vec<_> = out.layout().indices().collect();
    for (flat, idx) in indices.into_iter().enumerate() {
        let mut src = idx;
        let mut sum = 0.0;
        for j in 0..matrix.ncols() {
            let t = matrix[(idx[axis], j)];
            if t != 0.0 {
                src[axis] = j;
                sum += t * *array.get(&src)?;
            }
        }
        out[flat] = sum;
    }
    Ok(out)
}

/// Coefficients of component `comp` of `space` expressed on the refined space.
///
/// New knots are inserted once each, which is how [`SplineSpace::refined`]
/// builds the refined multiplicities, so the represented function is unchanged.
pub fn refine_component_coefficients<const DIM: usize>(
    space: &SplineSpace<DIM>,
    comp: usize,
    event: &RefinementEvent<DIM>,
    coefficients: &DynamicMultiArray<f64, DIM>,
) -> Result<DynamicMultiArray<f64, DIM>> {
    let degree = space.component_degree(comp)?;
    let knots = space.knots_with_repetition();
    let mut current = coefficients.clone();
    for d in 0..DIM {
        let inserted = event.inserted_knots(d);
        if inserted.is_empty() {
            continue;
        }
        if space.is_periodic(comp, d) {
            return Err(IgaError::NotImplemented(format!(
                "coefficient refinement in periodic direction {} of component {}",
                d, comp
            )));
        }
        let t = knot_insertion_matrix(degree[d], &knots[comp][d], inserted)?;
        current = apply_along_axis(&t, &current, d)?;
    }
    Ok(current)
}

/// Refine coefficients given in the global numbering of `space`.
pub fn refine_coefficients<const DIM: usize>(
    space: &SplineSpace<DIM>,
    event: &RefinementEvent<DIM>,
    coefficients: &[f64],
) -> Result<Vec<f64>> {
    if coefficients.len() != space.num_basis() {
        return Err(IgaError::mismatch("coefficients", space.num_basis(), coefficients.len()));
    }
    let mut out = Vec::new();
    let mut start = 0;
    for (comp, size) in space.num_basis_table().iter().enumerate() {
        let n = size.flat_size();
        let block = DynamicMultiArray::from_vec(*size, coefficients[start..start + n].to_vec())?;
        out.extend(refine_component_coefficients(space, comp, event, &block)?.into_vec());
        start += n;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_along_axis() {
        let array = DynamicMultiArray::from_vec(TensorSize([2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        // keep both ends along axis 1 and insert their midpoint
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.5, 0.5, 0.0, 1.0]);
        let out = apply_along_axis(&m, &array, 1).unwrap();
        assert_eq!(out.tensor_size().as_array(), [2, 3]);
        assert_eq!(out.as_slice(), &[1.0, 1.5, 2.0, 3.0, 3.5, 4.0]);
        assert!(apply_along_axis(&m, &out, 1).is_err());
    }
}
