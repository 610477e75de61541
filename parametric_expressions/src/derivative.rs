use ndarray::s;
use rustc_hash::FxHashMap;

use crate::error::{ExpressionError, Result};
use crate::expression::Expression;
use crate::node::NodeKind;

impl Expression {
    /// Symbolic partial derivative with respect to parameter `index`.
    ///
    /// The result has the same shape as `self` and is deduplicated before it is returned.
    pub fn derivative(&self, index: usize) -> Result<Self> {
        if index >= self.num_parameters() {
            return Err(ExpressionError::index_out_of_range(
                "derivative",
                index,
                self.num_parameters(),
            ));
        }
        Ok(differentiate(self, index)?.deduplicated())
    }
}

/// Raw derivative, with each shared node differentiated once.
pub(crate) fn differentiate(expr: &Expression, index: usize) -> Result<Expression> {
    let mut memo = FxHashMap::default();
    derivative_of(expr, index, &mut memo)
}

fn derivative_of(expr: &Expression, index: usize, memo: &mut FxHashMap<usize, Expression>) -> Result<Expression> {
    if let Some(d) = memo.get(&expr.id()) {
        return Ok(d.clone());
    }
    let d = apply_rule(expr, index, memo)?;
    debug_assert_eq!(d.shape(), expr.shape(), "{} derivative changed shape", expr.kind().name());
    memo.insert(expr.id(), d.clone());
    Ok(d)
}

fn apply_rule(expr: &Expression, i: usize, memo: &mut FxHashMap<usize, Expression>) -> Result<Expression> {
    let (p, dims) = (expr.num_parameters(), expr.num_dimensions());
    let mut d = |x: &Expression| derivative_of(x, i, memo);
    let one = [1.0];

    let result = match expr.kind() {
        NodeKind::Constant { .. } => Expression::zero(dims, p),
        NodeKind::Parameter { index } => Expression::scalar(if *index == i { 1.0 } else { 0.0 }, p),
        NodeKind::Identity => {
            let mut unit = vec![0.0; dims];
            unit[i] = 1.0;
            Expression::constant(&unit, p)
        }
        NodeKind::Sum(a, b) => d(a)?.try_add(&d(b)?)?,
        NodeKind::Difference(a, b) => d(a)?.try_sub(&d(b)?)?,
        NodeKind::Product {
            multiplier,
            multiplicand,
        } => {
            let left = d(multiplier)?.try_mul(multiplicand)?;
            let right = multiplier.try_mul(&d(multiplicand)?)?;
            left.try_add(&right)?
        }
        NodeKind::Quotient { dividend, divisor } => {
            let numerator = d(dividend)?
                .try_mul(divisor)?
                .try_sub(&dividend.try_mul(&d(divisor)?)?)?;
            numerator.try_div(&divisor.squared()?)?
        }
        NodeKind::Negation(x) => d(x)?.negated(),
        NodeKind::Scaled { scale, operand } => d(operand)?.scaled(*scale),
        NodeKind::Dot(a, b) => d(a)?.dot(b)?.try_add(&a.dot(&d(b)?)?)?,
        NodeKind::Cross(a, b) => d(a)?.cross(b)?.try_add(&a.cross(&d(b)?)?)?,
        NodeKind::Norm(x) => d(x)?.dot(&x.normalized()?)?,
        NodeKind::SquaredNorm(x) => x.dot(&d(x)?)?.scaled(2.0),
        NodeKind::Normalized(x) => {
            // (x' - (x' . n) n) / |x|
            let dx = d(x)?;
            let along = dx.dot(expr)?.try_mul(expr)?;
            dx.try_sub(&along)?.try_div(&x.norm())?
        }
        NodeKind::SquareRoot(x) => d(x)?.scaled(0.5).try_div(expr)?,
        NodeKind::Sine(x) => x.cos()?.try_mul(&d(x)?)?,
        NodeKind::Cosine(x) => x.sin()?.try_mul(&d(x)?)?.negated(),
        NodeKind::Tangent(x) => expr.squared()?.translated_unchecked(&one).try_mul(&d(x)?)?,
        NodeKind::Arcsine(x) => d(x)?.try_div(&x.squared()?.negated().translated_unchecked(&one).sqrt()?)?,
        NodeKind::Arccosine(x) => d(x)?
            .try_div(&x.squared()?.negated().translated_unchecked(&one).sqrt()?)?
            .negated(),
        NodeKind::Exponential(x) => expr.try_mul(&d(x)?)?,
        NodeKind::Logarithm(x) => d(x)?.try_div(x)?,
        NodeKind::Power { base, exponent } => match exponent.scalar_value() {
            Some(c) => base.powf(c - 1.0)?.scaled(c).try_mul(&d(base)?)?,
            None => {
                let db = d(base)?;
                let de = d(exponent)?;
                let log_term = de.try_mul(&base.ln()?)?;
                let base_term = exponent.try_mul(&db.try_div(base)?)?;
                log_term.try_add(&base_term)?.try_mul(expr)?
            }
        },
        NodeKind::Components { operand, start, count } => d(operand)?.components(*start, *count)?,
        NodeKind::Concatenation(parts) => {
            let derivatives = parts.iter().map(&mut d).collect::<Result<Vec<_>>>()?;
            Expression::concatenation(&derivatives)?
        }
        NodeKind::Composition { outer, inner } => {
            // Chain rule: sum over the inner outputs j of (d outer / d u_j)(inner) * d inner_j / d t_i.
            let inner_derivative = d(inner)?;
            let mut total = Expression::zero(dims, p);
            for j in 0..outer.num_parameters() {
                let inner_partial = inner_derivative.component(j)?;
                if inner_partial.is_zero_constant() {
                    continue;
                }
                let outer_partial = differentiate(outer, j)?.composed(inner)?;
                total = total.try_add(&outer_partial.try_mul(&inner_partial)?)?;
            }
            total
        }
        NodeKind::Transformed { operand, matrix, .. } => {
            d(operand)?.transformed_unchecked(matrix.clone(), vec![0.0; dims])
        }
        NodeKind::Linear { basis, .. } => Expression::constant(&basis.column(i).to_vec(), p),
        NodeKind::Elliptical {
            basis, convention, ..
        } => {
            // Parameter i swaps sin and cos on its own axis and on every later axis; the sign flip
            // lands on the axis whose factor went from cos to sin. Earlier axes don't depend on it.
            let mut flipped = convention.clone();
            flipped[i] = !flipped[i];
            let mut derivative_basis = basis.clone();
            if convention[i] {
                derivative_basis.column_mut(i).mapv_inplace(|v| -v);
            } else {
                derivative_basis.slice_mut(s![.., i + 1..]).mapv_inplace(|v| -v);
            }
            derivative_basis.slice_mut(s![.., ..i]).fill(0.0);
            Expression::elliptical(&vec![0.0; dims], derivative_basis.view(), &flipped)?
        }
    };
    Ok(result)
}
