//! Bernstein (Bezier) extraction operators.
//!
//! On every knot span the `p + 1` non-vanishing B-splines of degree `p` are
//! linear combinations of the degree `p` Bernstein polynomials of the span's
//! reference coordinate: `N = M * B`, rows of `M` indexing the local B-splines
//! in increasing global order and columns the Bernstein polynomials.

use iga_core::{check_range, IgaError, Result};
use log::debug;
use nalgebra::DMatrix;

use crate::spline_space::SplineSpace;

/// Square change-of-basis matrix of one span.
#[derive(Debug, Clone, PartialEq)]
pub struct BernsteinOperator {
    matrix: DMatrix<f64>,
}

impl BernsteinOperator {
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() || matrix.nrows() == 0 {
            return Err(IgaError::mismatch("Bernstein operator columns", matrix.nrows(), matrix.ncols()));
        }
        Ok(Self { matrix })
    }

    pub fn identity(size: usize) -> Self {
        Self {
            matrix: DMatrix::identity(size, size),
        }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn degree(&self) -> usize {
        self.matrix.nrows() - 1
    }

    /// B-spline values from Bernstein values (one column per point).
    pub fn apply(&self, bernstein: &DMatrix<f64>) -> DMatrix<f64> {
        &self.matrix * bernstein
    }

    /// `scale * M * B`, used to carry reference derivatives to physical ones.
    pub fn scale_action(&self, scale: f64, bernstein: &DMatrix<f64>) -> DMatrix<f64> {
        (&self.matrix * bernstein) * scale
    }
}

/// Span-sweep extraction for a clamped knot vector (first and last knot
/// repeated `p + 1` times).
///
/// Each span's operator is obtained by inserting knots until the span's
/// right end has multiplicity `p`, and hands its trailing coefficients to the
/// next span.
#[allow(clippy::needless_range_loop)]
pub fn extract_by_knot_insertion(p: usize, knots: &[f64]) -> Result<Vec<BernsteinOperator>> {
    if knots.len() < 2 * (p + 1) {
        return Err(IgaError::mismatch("clamped knot vector length", 2 * (p + 1), knots.len()));
    }
    if p == 0 {
        return Ok((1..knots.len()).map(|_| BernsteinOperator::identity(1)).collect());
    }

    let m = knots.len() - p - 1;
    let mut operators = Vec::new();
    let mut current = DMatrix::<f64>::identity(p + 1, p + 1);
    let mut alphas = vec![0.0; p];
    let mut a = p;
    let mut b = p + 1;

    while b < m {
        let mut next = DMatrix::<f64>::identity(p + 1, p + 1);
        let i = b;
        while b < m && knots[b + 1] == knots[b] {
            b += 1;
        }
        let mult = b - i + 1;
        if mult > p {
            return Err(IgaError::Configuration(format!(
                "interior knot {} has multiplicity {} above degree {}",
                knots[b], mult, p
            )));
        }
        if mult < p {
            let numer = knots[b] - knots[a];
            for j in (mult + 1..=p).rev() {
                alphas[j - mult - 1] = numer / (knots[a + j] - knots[a]);
            }
            let r = p - mult;
            for j in 1..=r {
                let save = r - j;
                let s = mult + j;
                for k in (s..=p).rev() {
                    let alpha = alphas[k - s];
                    for row in 0..=p {
                        current[(row, k)] = alpha * current[(row, k)] + (1.0 - alpha) * current[(row, k - 1)];
                    }
                }
                if b < m {
                    for l in 0..=j {
                        next[(save + l, save)] = current[(p - j + l, p)];
                    }
                }
            }
        }
        operators.push(BernsteinOperator { matrix: current });
        current = next;
        if b < m {
            a = b;
            b += 1;
        }
    }
    operators.push(BernsteinOperator { matrix: current });
    Ok(operators)
}

/// Degree-recursion extraction, valid for any knot vector.
///
/// Runs Cox-de Boor's recursion `N_{i,q} = w_{i,q} N_{i,q-1} + (1 - w_{i+1,q}) N_{i+1,q-1}`
/// on Bernstein coefficients of span `[knots[s], knots[s+1]]`, for each `s` in `spans`.
pub fn extract_by_degree_recursion(p: usize, knots: &[f64], spans: &[usize]) -> Result<Vec<BernsteinOperator>> {
    spans
        .iter()
        .map(|&s| {
            if s < p || s + p.max(1) >= knots.len() {
                return Err(IgaError::out_of_range("knot span", s, knots.len().saturating_sub(p)));
            }
            let (a, b) = (knots[s], knots[s + 1]);
            if b <= a {
                return Err(IgaError::InvalidKnots(format!("span {} has zero length", s)));
            }
            // row r of a degree q table holds N_{s-q+r, q}
            let mut table = DMatrix::<f64>::from_element(1, 1, 1.0);
            for q in 1..=p {
                let mut next = DMatrix::<f64>::zeros(q + 1, q + 1);
                let qf = q as f64;
                for r in 0..=q {
                    let i = s + r - q;
                    if r >= 1 {
                        let (f0, f1) = ramp(knots, i, q, a, b);
                        raise_degree(&table, r - 1, f0, f1, qf, &mut next, r);
                    }
                    if r < q {
                        let (g0, g1) = ramp(knots, i + 1, q, a, b);
                        raise_degree(&table, r, 1.0 - g0, 1.0 - g1, qf, &mut next, r);
                    }
                }
                table = next;
            }
            Ok(BernsteinOperator { matrix: table })
        })
        .collect()
}

/// `(x - U_i) / (U_{i+q} - U_i)` at `x = a` and `x = b`, zero for a vanishing denominator.
fn ramp(knots: &[f64], i: usize, q: usize, a: f64, b: f64) -> (f64, f64) {
    let den = knots[i + q] - knots[i];
    if den > 0.0 {
        ((a - knots[i]) / den, (b - knots[i]) / den)
    } else {
        (0.0, 0.0)
    }
}

/// Add `f * table[src]` to `out[dst]`, where `f` is linear with values `f0`
/// at `t = 0` and `f1` at `t = 1`, raising the Bernstein degree by one.
fn raise_degree(table: &DMatrix<f64>, src: usize, f0: f64, f1: f64, q: f64, out: &mut DMatrix<f64>, dst: usize) {
    let n = table.ncols();
    for k in 0..=n {
        let kf = k as f64;
        let mut v = 0.0;
        if k < n {
            v += f0 * (q - kf) / q * table[(src, k)];
        }
        if k >= 1 {
            v += f1 * kf / q * table[(src, k - 1)];
        }
        out[(dst, k)] += v;
    }
}

/// Operators of one direction: sweep for clamped vectors, degree recursion otherwise.
///
/// `accumulated` are the accumulated interior multiplicities (one entry per
/// grid knot); the knot vector must hold exactly `accumulated.last() + 2(p+1)` knots.
pub fn direction_operators(
    p: usize,
    knots: &[f64],
    accumulated: &[usize],
    clamped: bool,
) -> Result<Vec<BernsteinOperator>> {
    let n_intervals = accumulated.len().saturating_sub(1);
    if n_intervals == 0 {
        return Err(IgaError::Configuration("a direction needs at least one interval".into()));
    }
    let total = accumulated[n_intervals];
    if knots.len() != total + 2 * (p + 1) {
        return Err(IgaError::mismatch("knots with repetition", total + 2 * (p + 1), knots.len()));
    }
    let operators = if clamped {
        extract_by_knot_insertion(p, knots)?
    } else {
        let spans: Vec<usize> = accumulated[..n_intervals].iter().map(|acc| p + acc).collect();
        extract_by_degree_recursion(p, knots, &spans)?
    };
    if operators.len() != n_intervals {
        return Err(IgaError::mismatch("extraction operators", n_intervals, operators.len()));
    }
    Ok(operators)
}

/// Extraction operators of a spline space, indexed by component, direction
/// and interval along the direction.
#[derive(Debug, Clone, PartialEq)]
pub struct BernsteinExtraction<const DIM: usize> {
    operators: Vec<[Vec<BernsteinOperator>; DIM]>,
}

impl<const DIM: usize> BernsteinExtraction<DIM> {
    pub fn new(space: &SplineSpace<DIM>) -> Result<Self> {
        let knots = space.knots_with_repetition();
        let mut operators = Vec::with_capacity(space.n_components());
        for (c, deg) in space.degree().iter().enumerate() {
            let mut per_dir: [Vec<BernsteinOperator>; DIM] = std::array::from_fn(|_| Vec::new());
            for d in 0..DIM {
                let clamped = space.end_behaviour()[c][d].is_interpolatory();
                let acc = space.accumulated_multiplicities(c, d);
                per_dir[d] = direction_operators(deg[d], &knots[c][d], &acc, clamped)?;
                debug!(
                    "extraction: component {} direction {} degree {}: {} operators ({})",
                    c,
                    d,
                    deg[d],
                    per_dir[d].len(),
                    if clamped { "sweep" } else { "degree recursion" }
                );
            }
            operators.push(per_dir);
        }
        Ok(Self { operators })
    }

    pub fn n_components(&self) -> usize {
        self.operators.len()
    }

    /// Operator of interval `interval` along direction `dir` for component `comp`.
    pub fn operator(&self, dir: usize, interval: usize, comp: usize) -> Result<&BernsteinOperator> {
        check_range("component", comp, self.operators.len())?;
        check_range("direction", dir, DIM)?;
        let ops = &self.operators[comp][dir];
        ops.get(interval)
            .ok_or_else(|| IgaError::out_of_range("interval", interval, ops.len()))
    }

    /// Per-direction operators of the element with tensor index `element`.
    pub fn element_operators(&self, comp: usize, element: &[usize; DIM]) -> Result<[&BernsteinOperator; DIM]> {
        check_range("component", comp, self.operators.len())?;
        for d in 0..DIM {
            check_range("interval", element[d], self.operators[comp][d].len())?;
        }
        Ok(std::array::from_fn(|d| &self.operators[comp][d][element[d]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_uniform_operators() {
        let knots = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        let ops = extract_by_knot_insertion(2, &knots).unwrap();
        assert_eq!(ops.len(), 3);
        let first = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.5, 0.0, 0.0, 0.5]);
        assert_relative_eq!(ops[0].matrix(), &first, epsilon = 1e-14);
        let middle = DMatrix::from_row_slice(3, 3, &[0.5, 0.0, 0.0, 0.5, 1.0, 0.5, 0.0, 0.0, 0.5]);
        assert_relative_eq!(ops[1].matrix(), &middle, epsilon = 1e-14);
    }

    #[test]
    fn test_sweep_and_recursion_agree() {
        let knots = [0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 2.0, 3.5, 4.0, 4.0, 4.0, 4.0];
        let p = 3;
        let sweep = extract_by_knot_insertion(p, &knots).unwrap();
        let spans = [3, 4, 6, 7, 8];
        let rec = extract_by_degree_recursion(p, &knots, &spans).unwrap();
        assert_eq!(sweep.len(), rec.len());
        for (s, r) in sweep.iter().zip(&rec) {
            assert_relative_eq!(s.matrix(), r.matrix(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degree_zero_is_identity() {
        let knots = [0.0, 1.0, 2.5, 3.0];
        let ops = extract_by_knot_insertion(0, &knots).unwrap();
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().all(|op| *op == BernsteinOperator::identity(1)));
        let rec = extract_by_degree_recursion(0, &knots, &[0, 1, 2]).unwrap();
        assert!(rec.iter().all(|op| *op == BernsteinOperator::identity(1)));
    }

    #[test]
    fn test_direction_operators_count_check() {
        let knots = [0.0, 0.0, 1.0, 2.0, 2.0];
        assert!(direction_operators(1, &knots, &[0, 1, 1], true).is_ok());
        assert!(matches!(
            direction_operators(1, &knots, &[0, 2, 2], true),
            Err(IgaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_operator_lookup_ranges() {
        let grid = std::sync::Arc::new(iga_grid::Grid::<2>::uniform([3, 4]).unwrap());
        let space = SplineSpace::scalar(grid, [2, 1]).unwrap();
        let ext = BernsteinExtraction::new(&space).unwrap();
        assert_eq!(ext.operator(0, 1, 0).unwrap().degree(), 2);
        assert_eq!(ext.operator(1, 2, 0).unwrap().degree(), 1);
        assert!(ext.operator(0, 2, 0).is_err());
        assert!(ext.operator(2, 0, 0).is_err());
        assert!(ext.operator(0, 0, 1).is_err());
        let ops = ext.element_operators(0, &[1, 2]).unwrap();
        assert_eq!(ops[0].degree(), 2);
        assert!(ext.element_operators(0, &[2, 0]).is_err());
    }
}
