mod common;

use common::*;
use ndarray::{Array2, s};
use parametric_expressions::{EvalOptions, EvalStats, Evaluator, Expression, Interval, count_unique_nodes};
use proptest::prelude::*;

fn naive<T: parametric_expressions::Scalar>() -> Evaluator<T> {
    Evaluator::new(EvalOptions {
        memoize: false,
        ..EvalOptions::default()
    })
}

fn shared_tree() -> Expression {
    let (s, t) = (p(2, 0), p(2, 1));
    let f = (&s * &t).sin().unwrap() * (&s - &t).exp().unwrap();
    f.derivative(0).unwrap().derivative(1).unwrap()
}

#[test]
fn memoized_and_naive_agree_on_values() {
    let expr = shared_tree();
    let x = make_x(2, 9);
    let memoized = Evaluator::<f64>::default().evaluate(&expr, x.view()).unwrap();
    let plain = naive::<f64>().evaluate(&expr, x.view()).unwrap();
    assert_eq!(memoized, plain);
}

#[test]
fn memoized_and_naive_agree_on_bounds() {
    let expr = shared_tree();
    let x = make_x(2, 4).mapv(|v| Interval::new(v, v + 0.25));
    let memoized = Evaluator::<Interval>::default().evaluate(&expr, x.view()).unwrap();
    let plain = naive::<Interval>().evaluate(&expr, x.view()).unwrap();
    assert_eq!(memoized, plain);
}

#[test]
fn each_unique_node_is_computed_once() {
    let expr = shared_tree();
    let x = make_x(2, 3);
    let mut evaluator = Evaluator::<f64>::default();
    evaluator.evaluate(&expr, x.view()).unwrap();
    let stats = evaluator.stats();
    assert_eq!(stats.computed, count_unique_nodes(&expr));
    assert!(stats.reused > 0);

    let mut plain = naive::<f64>();
    plain.evaluate(&expr, x.view()).unwrap();
    assert_eq!(plain.stats().reused, 0);
    assert!(plain.stats().computed > stats.computed);
}

#[test]
fn no_state_survives_between_calls() {
    let expr = shared_tree();
    let mut x = make_x(2, 3);
    let mut evaluator = Evaluator::<f64>::default();
    let first = evaluator.evaluate(&expr, x.view()).unwrap();
    let first_stats = evaluator.stats();

    // Same buffer, new contents: nothing from the first call may be reused.
    x.slice_mut(s![.., 1]).mapv_inplace(|v| v + 0.5);
    let second = evaluator.evaluate(&expr, x.view()).unwrap();
    assert_eq!(evaluator.stats(), first_stats);
    assert_eq!(first.column(0), second.column(0));
    assert_ne!(first.column(1), second.column(1));
    assert_eq!(second, naive::<f64>().evaluate(&expr, x.view()).unwrap());
}

#[test]
fn column_windows_match_the_full_batch() {
    let expr = shared_tree();
    let x = make_x(2, 6);
    let mut evaluator = Evaluator::<f64>::default();
    let left = evaluator.evaluate(&expr, x.slice(s![.., ..3])).unwrap();
    let right = evaluator.evaluate(&expr, x.slice(s![.., 3..])).unwrap();
    let all = evaluator.evaluate(&expr, x.view()).unwrap();
    assert_eq!(all.slice(s![.., ..3]), left);
    assert_eq!(all.slice(s![.., 3..]), right);
}

#[test]
fn failed_call_leaves_the_evaluator_usable() {
    let f = p(1, 0).ln().unwrap();
    let mut evaluator = Evaluator::<f64>::default();
    let bad = Array2::from_shape_vec((1, 3), vec![1.0, -1.0, 2.0]).unwrap();
    assert!(evaluator.evaluate(&f, bad.view()).is_err());
    let good = Array2::from_shape_vec((1, 2), vec![1.0, 1.0]).unwrap();
    let out = evaluator.evaluate(&f, good.view()).unwrap();
    assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0]);
    assert_eq!(evaluator.stats(), EvalStats { computed: 2, reused: 0 });
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn memoization_never_changes_results(
        gen_expr in arb_expr(2, 4, 24),
        data in prop::collection::vec(-2.0f64..2.0, 2 * 5),
    ) {
        let expr = gen_expr.build(2).derivative(0).unwrap();
        let x = Array2::from_shape_vec((2, 5), data).unwrap();
        let memoized = Evaluator::<f64>::default().evaluate(&expr, x.view()).unwrap();
        let plain = naive::<f64>().evaluate(&expr, x.view()).unwrap();
        prop_assert_eq!(memoized, plain);

        let bounds = x.mapv(|v| Interval::new(v - 0.1, v + 0.1));
        let memoized = Evaluator::<Interval>::default().evaluate(&expr, bounds.view()).unwrap();
        let plain = naive::<Interval>().evaluate(&expr, bounds.view()).unwrap();
        prop_assert_eq!(memoized, plain);
    }
}
