mod common;

use approx::assert_relative_eq;
use iga_basis::bernstein::bernstein_values;
use iga_basis::extraction::{extract_by_degree_recursion, extract_by_knot_insertion};
use iga_basis::BernsteinOperator;
use nalgebra::DMatrix;

fn check_against_cox_de_boor(p: usize, knots: &[f64], spans: &[usize], ops: &[BernsteinOperator]) {
    assert_eq!(spans.len(), ops.len());
    for (op, &s) in ops.iter().zip(spans) {
        let (a, b) = (knots[s], knots[s + 1]);
        for &t in &[0.0, 0.2, 0.5, 0.9, 1.0] {
            let x = a + t * (b - a);
            let expected = common::active(knots, p, s, 0, x);
            let bern = DMatrix::from_column_slice(p + 1, 1, &bernstein_values(p, t));
            let got = op.apply(&bern);
            for j in 0..=p {
                assert_relative_eq!(got[(j, 0)], expected[j], epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn sweep_reproduces_clamped_cubic() {
    let knots = [0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 2.0, 3.5, 4.0, 4.0, 4.0, 4.0];
    let ops = extract_by_knot_insertion(3, &knots).unwrap();
    check_against_cox_de_boor(3, &knots, &[3, 4, 6, 7, 8], &ops);
}

#[test]
fn recursion_reproduces_unclamped_quadratic() {
    let knots = [-0.6, -0.3, 0.0, 1.0, 2.0, 2.2, 2.5];
    let spans = [2, 3];
    let ops = extract_by_degree_recursion(2, &knots, &spans).unwrap();
    check_against_cox_de_boor(2, &knots, &spans, &ops);
}

#[test]
fn recursion_reproduces_repeated_interior_knots() {
    let knots = [0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0];
    let spans = [2, 4, 5];
    let ops = extract_by_degree_recursion(2, &knots, &spans).unwrap();
    check_against_cox_de_boor(2, &knots, &spans, &ops);
}
