//! Bernstein polynomials on the reference interval `[0,1]`.

use nalgebra::DMatrix;

/// Values of the `p + 1` Bernstein polynomials of degree `p` at `t`.
pub fn bernstein_values(p: usize, t: f64) -> Vec<f64> {
    let mut b = vec![0.0; p + 1];
    b[0] = 1.0;
    let s = 1.0 - t;
    for q in 1..=p {
        // B_{k,q} = (1-t) B_{k,q-1} + t B_{k-1,q-1}, updated in place from the top
        for k in (1..=q).rev() {
            b[k] = s * b[k] + t * b[k - 1];
        }
        b[0] *= s;
    }
    b
}

/// `order`-th derivatives of the degree `p` Bernstein polynomials at `t`.
///
/// Uses `d^r B_{k,p} = p!/(p-r)! * sum_j (-1)^(r-j) C(r,j) B_{k-j,p-r}`;
/// all derivatives above `p` vanish.
pub fn bernstein_derivatives(p: usize, order: usize, t: f64) -> Vec<f64> {
    if order == 0 {
        return bernstein_values(p, t);
    }
    let mut out = vec![0.0; p + 1];
    if order > p {
        return out;
    }
    let lower = bernstein_values(p - order, t);
    let falling: f64 = (p - order + 1..=p).map(|x| x as f64).product();
    for (k, value) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        let mut binom = 1.0;
        for j in 0..=order {
            if j > 0 {
                binom = binom * (order + 1 - j) as f64 / j as f64;
            }
            if j <= k && k - j <= p - order {
                let sign = if (order - j) % 2 == 0 { 1.0 } else { -1.0 };
                sum += sign * binom * lower[k - j];
            }
        }
        *value = falling * sum;
    }
    out
}

/// Tables of Bernstein derivatives of orders `0..=max_order` at `points`.
///
/// Entry `[r]` is a `(p+1) x points.len()` matrix whose row `k` holds
/// `d^r B_{k,p}` at every point.
pub fn bernstein_tables(p: usize, max_order: usize, points: &[f64]) -> Vec<DMatrix<f64>> {
    (0..=max_order)
        .map(|r| {
            let mut m = DMatrix::zeros(p + 1, points.len());
            for (q, &t) in points.iter().enumerate() {
                for (k, v) in bernstein_derivatives(p, r, t).into_iter().enumerate() {
                    m[(k, q)] = v;
                }
            }
            m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partition_of_unity_and_positivity() {
        for p in 0..=6 {
            for &t in &[0.0, 0.13, 0.5, 0.77, 1.0] {
                let b = bernstein_values(p, t);
                assert_relative_eq!(b.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
                assert!(b.iter().all(|&v| v >= 0.0));
            }
        }
    }

    #[test]
    fn test_closed_form_cubic() {
        let t: f64 = 0.3;
        let s = 1.0 - t;
        let b = bernstein_values(3, t);
        let expected = [s.powi(3), 3.0 * t * s * s, 3.0 * t * t * s, t.powi(3)];
        for k in 0..4 {
            assert_relative_eq!(b[k], expected[k], epsilon = 1e-15);
        }
    }

    #[test]
    fn test_derivatives_against_closed_form() {
        let t: f64 = 0.3;
        let s = 1.0 - t;
        let d1 = bernstein_derivatives(2, 1, t);
        // B = [s^2, 2ts, t^2]
        assert_relative_eq!(d1[0], -2.0 * s, epsilon = 1e-14);
        assert_relative_eq!(d1[1], 2.0 * (s - t), epsilon = 1e-14);
        assert_relative_eq!(d1[2], 2.0 * t, epsilon = 1e-14);
        let d2 = bernstein_derivatives(2, 2, t);
        assert_relative_eq!(d2[0], 2.0, epsilon = 1e-14);
        assert_relative_eq!(d2[1], -4.0, epsilon = 1e-14);
        assert_relative_eq!(d2[2], 2.0, epsilon = 1e-14);
        assert_eq!(bernstein_derivatives(2, 3, t), vec![0.0; 3]);
    }

    #[test]
    fn test_degree_zero() {
        assert_eq!(bernstein_values(0, 0.4), vec![1.0]);
        assert_eq!(bernstein_derivatives(0, 1, 0.4), vec![0.0]);
    }

    #[test]
    fn test_tables_shape() {
        let tables = bernstein_tables(3, 2, &[0.1, 0.5]);
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].shape(), (4, 2));
        assert_relative_eq!(tables[1].column(0).sum(), 0.0, epsilon = 1e-13);
    }
}
