mod common;

use std::f64::consts::{FRAC_PI_2, PI};

use common::*;
use ndarray::{Array2, array};
use parametric_expressions::{Interval, evaluate_bounds, evaluate_values};
use rstest::rstest;

#[test]
fn sine_and_its_derivative_on_a_batch() {
    let f = p(1, 0).sin().unwrap();
    let t = array![[0.0, FRAC_PI_2, PI]];

    let values = evaluate_values(&f, t.view()).unwrap();
    assert_eq!(values.dim(), (1, 3));
    assert_close_vec(values.as_slice_memory_order().unwrap(), &[0.0, 1.0, 0.0], 1e-12);

    let df = f.derivative(0).unwrap();
    let slopes = evaluate_values(&df, t.view()).unwrap();
    assert_close_vec(slopes.as_slice_memory_order().unwrap(), &[1.0, 0.0, -1.0], 1e-12);
}

#[test]
fn quadratic_plus_linear_on_two_columns() {
    let g = p(2, 0) * p(2, 0) + p(2, 1);
    // Columns (2, 3) and (0, 0).
    let t = array![[2.0, 0.0], [3.0, 0.0]];
    let values = evaluate_values(&g, t.view()).unwrap();
    assert_eq!(values.row(0).to_vec(), vec![7.0, 0.0]);

    let dg = g.derivative(0).unwrap();
    assert_eq!(dg.evaluate_at(&[2.0, 3.0]).unwrap(), vec![4.0]);
}

#[test]
fn sqrt_bounds_are_tight_for_exact_squares() {
    let f = p(1, 0).sqrt().unwrap();
    let bounds = Array2::from_elem((1, 1), Interval::new(4.0, 9.0));
    let out = evaluate_bounds(&f, bounds.view()).unwrap();
    assert_eq!(out[[0, 0]], Interval::new(2.0, 3.0));
}

#[test]
fn self_quotient_is_not_simplified() {
    let h = p(1, 0) / p(1, 0);
    let out = h.bounds_over(&[Interval::new(1.0, 2.0)]).unwrap();
    assert_eq!(out, vec![Interval::new(0.5, 2.0)]);
    assert!(out[0].contains(1.0));
    assert_eq!(h.evaluate_at(&[1.7]).unwrap(), vec![1.0]);
}

#[rstest]
#[case(0.0, 0.0, 1.0)]
#[case(FRAC_PI_2, 1.0, 0.0)]
#[case(PI, 0.0, -1.0)]
#[case(-FRAC_PI_2, -1.0, 0.0)]
fn sine_value_and_slope(#[case] t: f64, #[case] value: f64, #[case] slope: f64) {
    let f = p(1, 0).sin().unwrap();
    assert_close_vec(&f.evaluate_at(&[t]).unwrap(), &[value], 1e-12);
    assert_close_vec(&f.derivative(0).unwrap().evaluate_at(&[t]).unwrap(), &[slope], 1e-12);
}

#[rstest]
#[case(2.0, 3.0, 7.0)]
#[case(0.0, 0.0, 0.0)]
#[case(-1.5, 2.0, 4.25)]
fn quadratic_values(#[case] x: f64, #[case] y: f64, #[case] expected: f64) {
    let g = p(2, 0) * p(2, 0) + p(2, 1);
    assert_eq!(g.evaluate_at(&[x, y]).unwrap(), vec![expected]);
    // Bounds over a degenerate box enclose the point value.
    let bounds = g.bounds_over(&[Interval::singleton(x), Interval::singleton(y)]).unwrap();
    assert!(bounds[0].contains(expected));
}
