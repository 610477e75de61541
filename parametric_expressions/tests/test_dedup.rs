mod common;

use common::*;
use parametric_expressions::{DeduplicationCache, Expression, NodeKind, count_nodes, count_unique_nodes};
use proptest::prelude::*;

fn repeated_derivative(expr: &Expression, index: usize, times: usize) -> Expression {
    (0..times).fold(expr.clone(), |d, _| d.derivative(index).unwrap())
}

#[test]
fn duplicate_leaves_and_branches_collapse() {
    let x = p(2, 0);
    let y = p(2, 1);
    let a = (&p(2, 0) * &y).sin().unwrap();
    let b = (&x * &p(2, 1)).sin().unwrap();
    assert!(!a.ptr_eq(&b));
    assert!(a.is_duplicate_of(&b));

    let f = (&a + &b).deduplicated();
    assert_eq!(count_unique_nodes(&f), 5);
    match f.kind() {
        NodeKind::Sum(left, right) => assert!(left.ptr_eq(right)),
        other => panic!("expected a sum, got {}", other.name()),
    }
}

#[test]
fn different_auxiliary_data_is_not_a_duplicate() {
    let x = p(1, 0);
    assert!(!x.sin().unwrap().is_duplicate_of(&x.cos().unwrap()));
    assert!(!Expression::scalar(1.0, 1).is_duplicate_of(&Expression::scalar(2.0, 1)));
    // Same variant and data but a different parameter count.
    assert!(!p(1, 0).is_duplicate_of(&p(2, 0)));
}

#[test]
fn deduplication_preserves_values() {
    let (s, t) = (p(2, 0), p(2, 1));
    let f = (&s * &t).sin().unwrap() * s.exp().unwrap();
    let d = repeated_derivative(&f, 1, 3);
    let dd = d.deduplicated();
    for point in [[0.1, 0.2], [1.5, -0.4], [-2.0, 3.0]] {
        assert_eq!(d.evaluate_at(&point).unwrap(), dd.evaluate_at(&point).unwrap());
    }
}

#[test]
fn repeated_differentiation_shares_structure() {
    let (s, t) = (p(2, 0), p(2, 1));
    let f = (&s * &t).sin().unwrap() * (&s + &t).exp().unwrap();
    let d = repeated_derivative(&f, 0, 5);
    let unique = count_unique_nodes(&d);
    let tree = count_nodes(&d);
    assert!(unique * 2 < tree, "{unique} unique nodes in a tree of {tree}");
    // A second pass has nothing left to merge.
    assert_eq!(count_unique_nodes(&d.deduplicated()), unique);
}

#[test]
fn cache_shares_nodes_between_roots() {
    let (s, t) = (p(2, 0), p(2, 1));
    let f = (&s * &t).sin().unwrap();
    let mut cache = DeduplicationCache::new();
    assert!(cache.is_empty());
    let d0 = cache.deduplicate(&f.derivative(0).unwrap());
    let d1 = cache.deduplicate(&f.derivative(1).unwrap());
    // Both partials contain cos(s * t).
    let cos_st = cache.deduplicate(&(&s * &t).cos().unwrap());
    let contains = |root: &Expression| {
        let mut stack = vec![root.clone()];
        while let Some(e) = stack.pop() {
            if e.ptr_eq(&cos_st) {
                return true;
            }
            stack.extend(e.kind().operands().into_iter().cloned());
        }
        false
    };
    assert!(contains(&d0));
    assert!(contains(&d1));
    assert!(!cache.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn deduplication_is_idempotent(gen_expr in arb_expr(2, 4, 24)) {
        let expr = gen_expr.build(2).derivative(0).unwrap();
        let once = expr.deduplicated();
        let twice = once.deduplicated();
        prop_assert!(once.ptr_eq(&twice));
        prop_assert!(once.is_duplicate_of(&expr));
        prop_assert!(count_unique_nodes(&once) <= count_unique_nodes(&expr));
    }
}
