//! Cox-de Boor evaluation straight from the recursive definition, used as an
//! independent reference for the extraction-based bases.

/// Derivative `order` of the polynomial piece of `N_{i,p}` on knot span `span`.
///
/// The degree 0 functions are taken as the indicator of `span` itself, so the
/// result at either end of the span is the one-sided limit from inside it.
pub fn piece(knots: &[f64], span: usize, i: usize, p: usize, order: usize, t: f64) -> f64 {
    if p == 0 {
        return if order == 0 && i == span { 1.0 } else { 0.0 };
    }
    let ratio = |num: f64, den: f64| if den == 0.0 { 0.0 } else { num / den };
    let left = knots[i + p] - knots[i];
    let right = knots[i + p + 1] - knots[i + 1];
    if order == 0 {
        ratio(t - knots[i], left) * piece(knots, span, i, p - 1, 0, t)
            + ratio(knots[i + p + 1] - t, right) * piece(knots, span, i + 1, p - 1, 0, t)
    } else {
        p as f64
            * (ratio(piece(knots, span, i, p - 1, order - 1, t), left)
                - ratio(piece(knots, span, i + 1, p - 1, order - 1, t), right))
    }
}

/// The `p + 1` functions non-zero on `span`, in increasing global order.
pub fn active(knots: &[f64], p: usize, span: usize, order: usize, t: f64) -> Vec<f64> {
    (span - p..=span).map(|i| piece(knots, span, i, p, order, t)).collect()
}
