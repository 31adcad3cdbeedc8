//! Knot insertion (Boehm) on knot vectors with repetition.

use iga_core::{IgaError, Result};
use nalgebra::DMatrix;

/// Insert `x` once into `knots`, updating the coefficients `coefs` (Boehm's algorithm).
///
/// `x` must lie strictly inside the valid parameter range `(knots[p], knots[n])`.
pub fn insert_knot(degree: usize, knots: &[f64], coefs: &[f64], x: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    let p = degree;
    let n = coefs.len();
    if knots.len() != n + p + 1 {
        return Err(IgaError::mismatch("knot vector length", n + p + 1, knots.len()));
    }
    if !(x > knots[p] && x < knots[n]) {
        return Err(IgaError::Configuration(format!(
            "inserted knot {} outside the open parameter range ({}, {})",
            x, knots[p], knots[n]
        )));
    }
    // last span starting at or before `x`
    let k = knots[..n].partition_point(|&u| u <= x) - 1;

    let mut new_coefs = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let c = if i + p <= k {
            coefs[i]
        } else if i > k {
            coefs[i - 1]
        } else {
            let alpha = (x - knots[i]) / (knots[i + p] - knots[i]);
            alpha * coefs[i] + (1.0 - alpha) * coefs[i - 1]
        };
        new_coefs.push(c);
    }

    let mut new_knots = Vec::with_capacity(knots.len() + 1);
    new_knots.extend_from_slice(&knots[..=k]);
    new_knots.push(x);
    new_knots.extend_from_slice(&knots[k + 1..]);

    Ok((new_knots, new_coefs))
}

/// Matrix `T` mapping coefficients on `knots` to coefficients on the knot
/// vector with all of `inserted` added, so that `c_new = T * c_old`.
pub fn knot_insertion_matrix(degree: usize, knots: &[f64], inserted: &[f64]) -> Result<DMatrix<f64>> {
    let n_old = knots.len().checked_sub(degree + 1).ok_or_else(|| {
        IgaError::mismatch("knot vector length", degree + 1, knots.len())
    })?;
    let n_new = n_old + inserted.len();
    let mut t = DMatrix::zeros(n_new, n_old);
    for col in 0..n_old {
        let mut coefs = vec![0.0; n_old];
        coefs[col] = 1.0;
        let mut current = knots.to_vec();
        for &x in inserted {
            let (k, c) = insert_knot(degree, &current, &coefs, x)?;
            current = k;
            coefs = c;
        }
        for (row, c) in coefs.into_iter().enumerate() {
            t[(row, col)] = c;
        }
    }
    Ok(t)
}
