use approx::assert_relative_eq;
use ndarray::Array2;
use parametric_expressions::{Expression, Interval};
use proptest::prelude::*;
use proptest::strategy::{BoxedStrategy, Union};

#[allow(dead_code)]
pub fn p(num_parameters: usize, index: usize) -> Expression {
    Expression::parameter(num_parameters, index).unwrap()
}

/// `n_params x n_cols` batch with distinct, moderately sized entries.
#[allow(dead_code)]
pub fn make_x(n_params: usize, n_cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_params, n_cols), |(r, c)| {
        0.3 + 0.17 * (c as f64 + 1.0) * (r as f64 + 1.0) - 0.05 * r as f64
    })
}

/// Central difference of `expr` along parameter `dir` at `point`.
#[allow(dead_code)]
pub fn finite_diff_dir(expr: &Expression, point: &[f64], dir: usize, eps: f64) -> Vec<f64> {
    let mut plus = point.to_vec();
    let mut minus = point.to_vec();
    plus[dir] += eps;
    minus[dir] -= eps;
    let f_plus = expr.evaluate_at(&plus).unwrap();
    let f_minus = expr.evaluate_at(&minus).unwrap();
    f_plus
        .iter()
        .zip(&f_minus)
        .map(|(a, b)| (a - b) / (2.0 * eps))
        .collect()
}

#[allow(dead_code)]
pub fn assert_close_vec(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (&av, &bv) in a.iter().zip(b.iter()) {
        assert_relative_eq!(av, bv, epsilon = tol, max_relative = tol);
    }
}

/// Checks `derivative(i)` against central differences for every parameter.
#[allow(dead_code)]
pub fn derivative_matches_finite_diff(expr: &Expression, point: &[f64], tol: f64) {
    for i in 0..expr.num_parameters() {
        let exact = expr.derivative(i).unwrap().evaluate_at(point).unwrap();
        let approx = finite_diff_dir(expr, point, i, 1e-6);
        assert_close_vec(&exact, &approx, tol);
    }
}

#[allow(dead_code)]
pub fn enclosure_contains(bounds: &[Interval], values: &[f64]) -> bool {
    bounds.len() == values.len() && bounds.iter().zip(values).all(|(b, &v)| b.contains(v))
}

/// Random scalar expressions built only from operations that are total on the reals.
#[derive(Clone, Debug)]
pub enum GenExpr {
    Param(usize),
    Const(f64),
    Sin(Box<GenExpr>),
    Cos(Box<GenExpr>),
    Neg(Box<GenExpr>),
    ExpSin(Box<GenExpr>),
    Square(Box<GenExpr>),
    Add(Box<GenExpr>, Box<GenExpr>),
    Sub(Box<GenExpr>, Box<GenExpr>),
    Mul(Box<GenExpr>, Box<GenExpr>),
}

impl GenExpr {
    #[allow(dead_code)]
    pub fn build(&self, num_parameters: usize) -> Expression {
        match self {
            GenExpr::Param(i) => p(num_parameters, *i),
            GenExpr::Const(v) => Expression::scalar(*v, num_parameters),
            GenExpr::Sin(a) => a.build(num_parameters).sin().unwrap(),
            GenExpr::Cos(a) => a.build(num_parameters).cos().unwrap(),
            GenExpr::Neg(a) => -a.build(num_parameters),
            GenExpr::ExpSin(a) => a.build(num_parameters).sin().unwrap().exp().unwrap(),
            GenExpr::Square(a) => a.build(num_parameters).squared().unwrap(),
            GenExpr::Add(a, b) => a.build(num_parameters) + b.build(num_parameters),
            GenExpr::Sub(a, b) => a.build(num_parameters) - b.build(num_parameters),
            GenExpr::Mul(a, b) => a.build(num_parameters) * b.build(num_parameters),
        }
    }
}

#[allow(dead_code)]
pub fn arb_leaf_expr(num_parameters: usize) -> BoxedStrategy<GenExpr> {
    Union::new(vec![
        (0..num_parameters).prop_map(GenExpr::Param).boxed(),
        (-2.0f64..2.0).prop_map(GenExpr::Const).boxed(),
    ])
    .boxed()
}

#[allow(dead_code)]
pub fn arb_expr(num_parameters: usize, max_depth: u32, max_size: u32) -> BoxedStrategy<GenExpr> {
    arb_leaf_expr(num_parameters)
        .prop_recursive(max_depth, max_size, 2, |inner| {
            Union::new(vec![
                inner.clone().prop_map(|a| GenExpr::Sin(Box::new(a))).boxed(),
                inner.clone().prop_map(|a| GenExpr::Cos(Box::new(a))).boxed(),
                inner.clone().prop_map(|a| GenExpr::Neg(Box::new(a))).boxed(),
                inner.clone().prop_map(|a| GenExpr::ExpSin(Box::new(a))).boxed(),
                inner.clone().prop_map(|a| GenExpr::Square(Box::new(a))).boxed(),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| GenExpr::Add(Box::new(a), Box::new(b)))
                    .boxed(),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| GenExpr::Sub(Box::new(a), Box::new(b)))
                    .boxed(),
                (inner.clone(), inner)
                    .prop_map(|(a, b)| GenExpr::Mul(Box::new(a), Box::new(b)))
                    .boxed(),
            ])
        })
        .boxed()
}
