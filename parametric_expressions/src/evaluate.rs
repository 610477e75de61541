use std::rc::Rc;

use ndarray::{Array2, ArrayView2, ShapeBuilder, Zip, s};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::dedup::DeduplicationCache;
use crate::derivative::differentiate;
use crate::error::{DomainError, ExpressionError, Result};
use crate::expression::Expression;
use crate::interval::Interval;
use crate::node::NodeKind;
use crate::scalar::Scalar;

/// How far outside `[-1, 1]` (asin, acos) or below zero (sqrt) an input may stray before it is
/// rejected rather than clamped.
pub const DEFAULT_DOMAIN_TOLERANCE: f64 = 1e-12;

#[derive(Copy, Clone, Debug)]
pub struct EvalOptions {
    /// Evaluate each (node, input buffer) pair once per call. Turning this off gives the naive
    /// recursive evaluator, which computes shared sub-expressions once per reference.
    pub memoize: bool,
    pub domain_tolerance: f64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            memoize: true,
            domain_tolerance: DEFAULT_DOMAIN_TOLERANCE,
        }
    }
}

/// Counters for the most recent evaluation call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalStats {
    pub computed: usize,
    pub reused: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct MemoKey {
    node: usize,
    buffer: usize,
    dim: (usize, usize),
    strides: [isize; 2],
}

impl MemoKey {
    fn new<T>(expr: &Expression, input: &ArrayView2<'_, T>) -> Self {
        let strides = input.strides();
        Self {
            node: expr.id(),
            buffer: input.as_ptr() as usize,
            dim: input.dim(),
            strides: [strides[0], strides[1]],
        }
    }
}

type Value<T> = Rc<Array2<T>>;

/// Batched evaluator over one scalar type.
///
/// Results are memoized per `(node, input buffer)` for the duration of a single call and the
/// table is cleared before returning, so nothing leaks between calls even when the caller reuses
/// or mutates its buffers. Use one evaluator per thread.
#[derive(Debug)]
pub struct Evaluator<T: Scalar> {
    options: EvalOptions,
    memo: FxHashMap<MemoKey, Value<T>>,
    stats: EvalStats,
}

impl<T: Scalar> Default for Evaluator<T> {
    fn default() -> Self {
        Self::new(EvalOptions::default())
    }
}

fn alloc<T: Scalar>(rows: usize, cols: usize) -> Array2<T> {
    Array2::zeros((rows, cols).f())
}

fn into_owned<T: Scalar>(value: Value<T>) -> Array2<T> {
    Rc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone())
}

fn map1<T: Scalar>(a: &Array2<T>, f: impl Fn(T) -> T) -> Array2<T> {
    let mut out = alloc(a.nrows(), a.ncols());
    Zip::from(&mut out).and(a).for_each(|o, &x| *o = f(x));
    out
}

fn map2<T: Scalar>(a: &Array2<T>, b: &Array2<T>, f: impl Fn(T, T) -> T) -> Array2<T> {
    let mut out = alloc(a.nrows(), a.ncols());
    Zip::from(&mut out).and(a).and(b).for_each(|o, &x, &y| *o = f(x, y));
    out
}

/// Fill `rows x cols` column by column, stopping at the first domain error.
fn try_build<T: Scalar>(
    rows: usize,
    cols: usize,
    mut f: impl FnMut(usize, usize) -> std::result::Result<T, DomainError>,
) -> std::result::Result<Array2<T>, DomainError> {
    let mut out = alloc(rows, cols);
    for c in 0..cols {
        for r in 0..rows {
            out[[r, c]] = f(r, c)?;
        }
    }
    Ok(out)
}

fn try_map1<T: Scalar>(
    a: &Array2<T>,
    f: impl Fn(T) -> std::result::Result<T, DomainError>,
) -> std::result::Result<Array2<T>, DomainError> {
    try_build(a.nrows(), a.ncols(), |r, c| f(a[[r, c]]))
}

fn squared_norms<T: Scalar>(a: &Array2<T>) -> Vec<T> {
    a.columns()
        .into_iter()
        .map(|col| col.iter().fold(T::zero(), |acc, &x| acc + x.squared()))
        .collect()
}

/// `matrix * x + offset`, column by column.
fn affine<T: Scalar>(matrix: &Array2<f64>, offset: &[f64], x: ArrayView2<'_, T>) -> Array2<T> {
    let matrix = matrix.mapv(T::from_f64);
    let offset: Vec<T> = offset.iter().copied().map(T::from_f64).collect();
    let mut out = alloc(matrix.nrows(), x.ncols());
    Zip::from(out.columns_mut()).and(x.columns()).for_each(|mut out_col, x_col| {
        for (r, o) in out_col.iter_mut().enumerate() {
            *o = matrix
                .row(r)
                .iter()
                .zip(x_col.iter())
                .fold(offset[r], |acc, (&m, &v)| acc + m * v);
        }
    });
    out
}

fn check_input<T>(operation: &'static str, expr: &Expression, input: &ArrayView2<'_, T>) -> Result<()> {
    if input.nrows() != expr.num_parameters() {
        return Err(ExpressionError::shape_mismatch(
            operation,
            format!("{} parameter rows", expr.num_parameters()),
            format!("{} rows", input.nrows()),
        ));
    }
    Ok(())
}

impl<T: Scalar> Evaluator<T> {
    pub fn new(options: EvalOptions) -> Self {
        Self {
            options,
            memo: FxHashMap::default(),
            stats: EvalStats::default(),
        }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    /// Evaluate `expr` on every column of `input` (`num_parameters x N`), giving
    /// `num_dimensions x N`. Either every column succeeds or the call fails.
    pub fn evaluate(&mut self, expr: &Expression, input: ArrayView2<'_, T>) -> Result<Array2<T>> {
        check_input("evaluate", expr, &input)?;
        self.begin();
        let result = self.eval_node(expr, input);
        self.finish(input.ncols());
        result.map(into_owned)
    }

    /// One `num_dimensions x N` matrix per parameter, holding the partial derivatives.
    ///
    /// The partials are deduplicated together and evaluated under one memo table, so structure
    /// they share is computed once.
    pub fn jacobian(&mut self, expr: &Expression, input: ArrayView2<'_, T>) -> Result<Vec<Array2<T>>> {
        check_input("jacobian", expr, &input)?;
        let mut cache = DeduplicationCache::new();
        let partials = (0..expr.num_parameters())
            .map(|i| differentiate(expr, i).map(|d| cache.deduplicate(&d)))
            .collect::<Result<Vec<_>>>()?;
        debug!(partials = partials.len(), canonical = cache.len(), "deduplicated jacobian");

        self.begin();
        let result = partials
            .iter()
            .map(|d| self.eval_node(d, input))
            .collect::<Result<Vec<_>>>();
        self.finish(input.ncols());
        Ok(result?.into_iter().map(into_owned).collect())
    }

    fn begin(&mut self) {
        self.memo.clear();
        self.stats = EvalStats::default();
    }

    fn finish(&mut self, columns: usize) {
        self.memo.clear();
        debug!(
            columns,
            computed = self.stats.computed,
            reused = self.stats.reused,
            "evaluated expression"
        );
    }

    fn eval_node(&mut self, expr: &Expression, input: ArrayView2<'_, T>) -> Result<Value<T>> {
        let key = MemoKey::new(expr, &input);
        if self.options.memoize {
            if let Some(value) = self.memo.get(&key) {
                trace!(node = expr.kind().name(), "memo hit");
                self.stats.reused += 1;
                return Ok(Rc::clone(value));
            }
        }
        let value = self.compute(expr, input)?;
        self.stats.computed += 1;
        if self.options.memoize {
            self.memo.insert(key, Rc::clone(&value));
        }
        Ok(value)
    }

    fn compute(&mut self, expr: &Expression, input: ArrayView2<'_, T>) -> Result<Value<T>> {
        let n = input.ncols();
        let dims = expr.num_dimensions();
        let tol = self.options.domain_tolerance;

        let out = match expr.kind() {
            NodeKind::Constant { value } => {
                let mut out = alloc(dims, n);
                for (mut row, &v) in out.rows_mut().into_iter().zip(value) {
                    row.fill(T::from_f64(v));
                }
                out
            }
            NodeKind::Parameter { index } => {
                let mut out = alloc(1, n);
                out.row_mut(0).assign(&input.row(*index));
                out
            }
            NodeKind::Identity => {
                let mut out = alloc(dims, n);
                out.assign(&input);
                out
            }
            NodeKind::Sum(a, b) => {
                let (a, b) = (self.eval_node(a, input)?, self.eval_node(b, input)?);
                map2(&a, &b, |x, y| x + y)
            }
            NodeKind::Difference(a, b) => {
                let (a, b) = (self.eval_node(a, input)?, self.eval_node(b, input)?);
                map2(&a, &b, |x, y| x - y)
            }
            NodeKind::Product {
                multiplier,
                multiplicand,
            } => {
                let m = self.eval_node(multiplier, input)?;
                let v = self.eval_node(multiplicand, input)?;
                let mut out = alloc(dims, n);
                Zip::from(&mut out)
                    .and(&*v)
                    .and_broadcast(m.view())
                    .for_each(|o, &v, &m| *o = m * v);
                out
            }
            NodeKind::Quotient { dividend, divisor } => {
                let f = self.eval_node(dividend, input)?;
                let g = self.eval_node(divisor, input)?;
                try_build(dims, n, |r, c| f[[r, c]].try_div(g[[0, c]]))?
            }
            NodeKind::Negation(x) => map1(&*self.eval_node(x, input)?, |v| -v),
            NodeKind::Scaled { scale, operand } => {
                let scale = T::from_f64(*scale);
                map1(&*self.eval_node(operand, input)?, |v| scale * v)
            }
            NodeKind::Dot(a, b) => {
                let (a, b) = (self.eval_node(a, input)?, self.eval_node(b, input)?);
                let mut out = alloc(1, n);
                Zip::from(out.row_mut(0))
                    .and(a.columns())
                    .and(b.columns())
                    .for_each(|o, a_col, b_col| {
                        *o = a_col.iter().zip(b_col.iter()).fold(T::zero(), |acc, (&x, &y)| acc + x * y);
                    });
                out
            }
            NodeKind::Cross(a, b) => {
                let (a, b) = (self.eval_node(a, input)?, self.eval_node(b, input)?);
                let mut out = alloc(3, n);
                for c in 0..n {
                    let (a0, a1, a2) = (a[[0, c]], a[[1, c]], a[[2, c]]);
                    let (b0, b1, b2) = (b[[0, c]], b[[1, c]], b[[2, c]]);
                    out[[0, c]] = a1 * b2 - a2 * b1;
                    out[[1, c]] = a2 * b0 - a0 * b2;
                    out[[2, c]] = a0 * b1 - a1 * b0;
                }
                out
            }
            NodeKind::Norm(x) => {
                let squared = squared_norms(&*self.eval_node(x, input)?);
                try_build(1, n, |_, c| squared[c].try_sqrt(tol))?
            }
            NodeKind::SquaredNorm(x) => {
                let squared = squared_norms(&*self.eval_node(x, input)?);
                Array2::from_shape_fn((1, n).f(), |(_, c)| squared[c])
            }
            NodeKind::Normalized(x) => {
                let x = self.eval_node(x, input)?;
                let norms = squared_norms(&x)
                    .into_iter()
                    .map(|s| s.try_sqrt(tol))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                try_build(dims, n, |r, c| x[[r, c]].try_div(norms[c]))?
            }
            NodeKind::SquareRoot(x) => try_map1(&*self.eval_node(x, input)?, |v| v.try_sqrt(tol))?,
            NodeKind::Sine(x) => map1(&*self.eval_node(x, input)?, T::sin),
            NodeKind::Cosine(x) => map1(&*self.eval_node(x, input)?, T::cos),
            NodeKind::Tangent(x) => map1(&*self.eval_node(x, input)?, T::tan),
            NodeKind::Exponential(x) => map1(&*self.eval_node(x, input)?, T::exp),
            NodeKind::Arcsine(x) => try_map1(&*self.eval_node(x, input)?, |v| v.try_asin(tol))?,
            NodeKind::Arccosine(x) => try_map1(&*self.eval_node(x, input)?, |v| v.try_acos(tol))?,
            NodeKind::Logarithm(x) => try_map1(&*self.eval_node(x, input)?, T::try_ln)?,
            NodeKind::Power { base, exponent } => {
                let (b, e) = (self.eval_node(base, input)?, self.eval_node(exponent, input)?);
                try_build(1, n, |_, c| b[[0, c]].try_powf(e[[0, c]]))?
            }
            NodeKind::Components { operand, start, count } => {
                let x = self.eval_node(operand, input)?;
                let mut out = alloc(*count, n);
                out.assign(&x.slice(s![*start..*start + *count, ..]));
                out
            }
            NodeKind::Concatenation(parts) => {
                let mut out = alloc(dims, n);
                let mut row = 0;
                for part in parts {
                    let value = self.eval_node(part, input)?;
                    let rows = value.nrows();
                    out.slice_mut(s![row..row + rows, ..]).assign(&*value);
                    row += rows;
                }
                out
            }
            NodeKind::Composition { outer, inner } => {
                // The outer node is keyed on the inner result's buffer, which the memo keeps alive.
                let inner_value = self.eval_node(inner, input)?;
                return self.eval_node(outer, inner_value.view());
            }
            NodeKind::Transformed {
                operand,
                matrix,
                offset,
            } => affine(matrix, offset, self.eval_node(operand, input)?.view()),
            NodeKind::Linear { origin, basis } => affine(basis, origin, input),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => {
                let p = convention.len();
                let mut local = Array2::<T>::ones((p + 1, n).f());
                for (i, &cos_first) in convention.iter().enumerate() {
                    for c in 0..n {
                        let t = input[[i, c]];
                        let (own, rest) = if cos_first { (t.cos(), t.sin()) } else { (t.sin(), t.cos()) };
                        local[[i, c]] = local[[i, c]] * own;
                        for r in i + 1..=p {
                            local[[r, c]] = local[[r, c]] * rest;
                        }
                    }
                }
                affine(basis, origin, local.view())
            }
        };
        Ok(Rc::new(out))
    }
}

/// Evaluate at each column of `values` with a default evaluator.
pub fn evaluate_values(expr: &Expression, values: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    Evaluator::default().evaluate(expr, values)
}

/// Conservative bounds over each column of `bounds` with a default evaluator.
pub fn evaluate_bounds(expr: &Expression, bounds: ArrayView2<'_, Interval>) -> Result<Array2<Interval>> {
    Evaluator::default().evaluate(expr, bounds)
}

impl Expression {
    /// Value at a single parameter point.
    pub fn evaluate_at(&self, point: &[f64]) -> Result<Vec<f64>> {
        let column = Array2::from_shape_fn((point.len(), 1), |(r, _)| point[r]);
        Ok(evaluate_values(self, column.view())?.column(0).to_vec())
    }

    /// Bounds over a single box of parameter intervals.
    pub fn bounds_over(&self, domain: &[Interval]) -> Result<Vec<Interval>> {
        let column = Array2::from_shape_fn((domain.len(), 1), |(r, _)| domain[r]);
        Ok(evaluate_bounds(self, column.view())?.column(0).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn shared_subexpressions_are_computed_once() {
        let x = Expression::parameter(1, 0).unwrap();
        let f = x.sin().unwrap().try_add(&x.sin().unwrap()).unwrap().deduplicated();
        let input = array![[0.1, 0.2, 0.3]];

        let mut memoized = Evaluator::<f64>::default();
        let a = memoized.evaluate(&f, input.view()).unwrap();
        assert_eq!(memoized.stats(), EvalStats { computed: 3, reused: 1 });

        let mut naive = Evaluator::<f64>::new(EvalOptions {
            memoize: false,
            ..EvalOptions::default()
        });
        let b = naive.evaluate(&f, input.view()).unwrap();
        assert_eq!(naive.stats(), EvalStats { computed: 5, reused: 0 });
        assert_eq!(a, b);
        assert!(memoized.memo.is_empty());
    }

    #[test]
    fn results_are_column_major() {
        let f = Expression::identity(2).scaled(2.0);
        let out = evaluate_values(&f, array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        assert!(out.t().is_standard_layout());
        assert_eq!(out, array![[2.0, 4.0], [6.0, 8.0]]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let f = Expression::parameter(2, 1).unwrap().exp().unwrap();
        let input = Array2::<f64>::zeros((2, 0));
        let out = evaluate_values(&f, input.view()).unwrap();
        assert_eq!(out.dim(), (1, 0));
    }

    #[test]
    fn wrong_input_rows_are_rejected() {
        let f = Expression::parameter(2, 1).unwrap();
        let err = evaluate_values(&f, Array2::zeros((3, 1)).view()).unwrap_err();
        assert!(matches!(err, ExpressionError::ShapeMismatch { operation: "evaluate", .. }));
    }

    #[test]
    fn domain_errors_abort_the_whole_batch() {
        let f = Expression::parameter(1, 0).unwrap().sqrt().unwrap();
        let mut evaluator = Evaluator::<Interval>::default();
        let bounds = array![[Interval::new(1.0, 4.0), Interval::new(-3.0, -2.0)]];
        let err = evaluator.evaluate(&f, bounds.view()).unwrap_err();
        assert!(matches!(err, ExpressionError::Domain(DomainError::OutOfDomain { function: "sqrt", .. })));
        assert!(evaluator.memo.is_empty());
    }

    #[test]
    fn jacobian_matches_individual_derivatives() {
        let x = Expression::parameter(2, 0).unwrap();
        let y = Expression::parameter(2, 1).unwrap();
        let f = x.try_mul(&y).unwrap().sin().unwrap();
        let input = array![[0.5, 1.0], [2.0, -1.0]];
        let jacobian = Evaluator::<f64>::default().jacobian(&f, input.view()).unwrap();
        assert_eq!(jacobian.len(), 2);
        for (i, partial) in jacobian.iter().enumerate() {
            let expected = evaluate_values(&f.derivative(i).unwrap(), input.view()).unwrap();
            for (a, b) in partial.iter().zip(expected.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn composition_evaluates_outer_on_inner_results() {
        let t = Expression::parameter(1, 0).unwrap();
        let inner = Expression::concatenation(&[t.cos().unwrap(), t.sin().unwrap()]).unwrap();
        let outer = Expression::identity(2).norm();
        let f = outer.composed(&inner).unwrap();
        let out = evaluate_values(&f, array![[0.0, 1.0, 2.0]].view()).unwrap();
        for v in out.iter() {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-15);
        }
    }
}
