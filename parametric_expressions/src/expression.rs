use core::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayView2, s};

use crate::error::{DomainError, ExpressionError, Result, Shape};
use crate::evaluate::DEFAULT_DOMAIN_TOLERANCE;
use crate::node::{Node, NodeKind};
use crate::scalar::Scalar;

/// Shared handle to an immutable expression node.
///
/// Cloning is a reference-count increment. Constructors validate shapes eagerly and fold
/// constants and a handful of algebraic identities as they build; full sharing of repeated
/// sub-expressions is left to [`Expression::deduplicated`].
#[derive(Clone)]
pub struct Expression(Arc<Node>);

fn check_same_shape(operation: &'static str, a: &Expression, b: &Expression) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(ExpressionError::shape_mismatch(operation, a.shape(), b.shape()));
    }
    Ok(())
}

fn check_same_parameters(operation: &'static str, a: &Expression, b: &Expression) -> Result<()> {
    if a.num_parameters() != b.num_parameters() {
        return Err(ExpressionError::shape_mismatch(
            operation,
            format!("R{} -> _", a.num_parameters()),
            b.shape(),
        ));
    }
    Ok(())
}

fn check_scalar(operation: &'static str, e: &Expression) -> Result<()> {
    if e.num_dimensions() != 1 {
        return Err(ExpressionError::shape_mismatch(
            operation,
            Shape {
                num_parameters: e.num_parameters(),
                num_dimensions: 1,
            },
            e.shape(),
        ));
    }
    Ok(())
}

fn mat_vec(matrix: &Array2<f64>, v: &[f64]) -> Vec<f64> {
    matrix.dot(&ArrayView1::from(v)).to_vec()
}

fn add_vec(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn scale_vec(v: &[f64], s: f64) -> Vec<f64> {
    v.iter().map(|x| x * s).collect()
}

fn row_matrix(v: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((1, v.len()), |(_, c)| v[c])
}

fn column_matrix(v: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((v.len(), 1), |(r, _)| v[r])
}

/// `[v]x`, the matrix with `[v]x * w == v x w`.
fn cross_matrix(v: &[f64]) -> Array2<f64> {
    ndarray::arr2(&[[0.0, -v[2], v[1]], [v[2], 0.0, -v[0]], [-v[1], v[0], 0.0]])
}

fn cross_vec(a: &[f64], b: &[f64]) -> Vec<f64> {
    vec![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

impl Expression {
    pub(crate) fn new(kind: NodeKind, num_parameters: usize, num_dimensions: usize) -> Self {
        Self(Arc::new(Node {
            kind,
            num_parameters,
            num_dimensions,
        }))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn num_parameters(&self) -> usize {
        self.0.num_parameters
    }

    pub fn num_dimensions(&self) -> usize {
        self.0.num_dimensions
    }

    pub fn shape(&self) -> Shape {
        self.0.shape()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn constant_value(&self) -> Option<&[f64]> {
        match self.kind() {
            NodeKind::Constant { value } => Some(value),
            _ => None,
        }
    }

    pub(crate) fn scalar_value(&self) -> Option<f64> {
        match self.constant_value() {
            Some(&[v]) => Some(v),
            _ => None,
        }
    }

    pub fn is_zero_constant(&self) -> bool {
        self.constant_value().is_some_and(|v| v.iter().all(|&x| x == 0.0))
    }

    pub fn constant(value: &[f64], num_parameters: usize) -> Self {
        Self::new(
            NodeKind::Constant { value: value.to_vec() },
            num_parameters,
            value.len(),
        )
    }

    pub fn scalar(value: f64, num_parameters: usize) -> Self {
        Self::constant(&[value], num_parameters)
    }

    pub fn zero(num_dimensions: usize, num_parameters: usize) -> Self {
        Self::constant(&vec![0.0; num_dimensions], num_parameters)
    }

    /// Component `index` of an `num_parameters`-dimensional parameter vector.
    pub fn parameter(num_parameters: usize, index: usize) -> Result<Self> {
        if index >= num_parameters {
            return Err(ExpressionError::index_out_of_range("parameter", index, num_parameters));
        }
        Ok(Self::new(NodeKind::Parameter { index }, num_parameters, 1))
    }

    pub fn identity(num_dimensions: usize) -> Self {
        Self::new(NodeKind::Identity, num_dimensions, num_dimensions)
    }

    /// `origin + basis * t`.
    pub fn linear(origin: &[f64], basis: ArrayView2<'_, f64>) -> Result<Self> {
        if origin.len() != basis.nrows() {
            return Err(ExpressionError::shape_mismatch(
                "linear",
                format!("origin of length {}", basis.nrows()),
                format!("origin of length {}", origin.len()),
            ));
        }
        Ok(Self::new(
            NodeKind::Linear {
                origin: origin.to_vec(),
                basis: basis.to_owned(),
            },
            basis.ncols(),
            basis.nrows(),
        ))
    }

    /// Elliptical parametrization over a frame; see [`NodeKind::Elliptical`].
    pub fn elliptical(origin: &[f64], basis: ArrayView2<'_, f64>, convention: &[bool]) -> Result<Self> {
        if origin.len() != basis.nrows() {
            return Err(ExpressionError::shape_mismatch(
                "elliptical",
                format!("origin of length {}", basis.nrows()),
                format!("origin of length {}", origin.len()),
            ));
        }
        if basis.ncols() != convention.len() + 1 {
            return Err(ExpressionError::shape_mismatch(
                "elliptical",
                format!("basis with {} columns", convention.len() + 1),
                format!("basis with {} columns", basis.ncols()),
            ));
        }
        Ok(Self::new(
            NodeKind::Elliptical {
                origin: origin.to_vec(),
                basis: basis.to_owned(),
                convention: convention.to_vec(),
            },
            convention.len(),
            basis.nrows(),
        ))
    }

    fn transformed_node(operand: Self, matrix: Array2<f64>, offset: Vec<f64>) -> Self {
        let num_parameters = operand.num_parameters();
        let num_dimensions = matrix.nrows();
        Self::new(
            NodeKind::Transformed {
                operand,
                matrix,
                offset,
            },
            num_parameters,
            num_dimensions,
        )
    }

    pub fn translated(&self, offset: &[f64]) -> Result<Self> {
        if offset.len() != self.num_dimensions() {
            return Err(ExpressionError::shape_mismatch(
                "translated",
                format!("offset of length {}", self.num_dimensions()),
                format!("offset of length {}", offset.len()),
            ));
        }
        Ok(self.translated_unchecked(offset))
    }

    pub(crate) fn translated_unchecked(&self, offset: &[f64]) -> Self {
        if offset.iter().all(|&v| v == 0.0) {
            return self.clone();
        }
        let (p, d) = (self.num_parameters(), self.num_dimensions());
        match self.kind() {
            NodeKind::Constant { value } => Self::constant(&add_vec(value, offset), p),
            NodeKind::Transformed {
                operand,
                matrix,
                offset: existing,
            } => Self::transformed_node(operand.clone(), matrix.clone(), add_vec(existing, offset)),
            NodeKind::Linear { origin, basis } => Self::new(
                NodeKind::Linear {
                    origin: add_vec(origin, offset),
                    basis: basis.clone(),
                },
                p,
                d,
            ),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => Self::new(
                NodeKind::Elliptical {
                    origin: add_vec(origin, offset),
                    basis: basis.clone(),
                    convention: convention.clone(),
                },
                p,
                d,
            ),
            _ => Self::transformed_node(self.clone(), Array2::eye(d), offset.to_vec()),
        }
    }

    /// Affine map `matrix * self + offset`.
    pub fn transformed(&self, matrix: ArrayView2<'_, f64>, offset: &[f64]) -> Result<Self> {
        if matrix.ncols() != self.num_dimensions() {
            return Err(ExpressionError::shape_mismatch(
                "transformed",
                format!("matrix with {} columns", self.num_dimensions()),
                format!("{}x{} matrix", matrix.nrows(), matrix.ncols()),
            ));
        }
        if offset.len() != matrix.nrows() {
            return Err(ExpressionError::shape_mismatch(
                "transformed",
                format!("offset of length {}", matrix.nrows()),
                format!("offset of length {}", offset.len()),
            ));
        }
        Ok(self.transformed_unchecked(matrix.to_owned(), offset.to_vec()))
    }

    pub(crate) fn transformed_unchecked(&self, matrix: Array2<f64>, offset: Vec<f64>) -> Self {
        let p = self.num_parameters();
        if matrix.is_square() && matrix == Array2::<f64>::eye(matrix.nrows()) {
            return self.translated_unchecked(&offset);
        }
        match self.kind() {
            NodeKind::Constant { value } => Self::constant(&add_vec(&mat_vec(&matrix, value), &offset), p),
            NodeKind::Transformed {
                operand,
                matrix: inner_matrix,
                offset: inner_offset,
            } => operand.transformed_unchecked(matrix.dot(inner_matrix), add_vec(&mat_vec(&matrix, inner_offset), &offset)),
            NodeKind::Linear { origin, basis } => Self::new(
                NodeKind::Linear {
                    origin: add_vec(&mat_vec(&matrix, origin), &offset),
                    basis: matrix.dot(basis),
                },
                p,
                matrix.nrows(),
            ),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => Self::new(
                NodeKind::Elliptical {
                    origin: add_vec(&mat_vec(&matrix, origin), &offset),
                    basis: matrix.dot(basis),
                    convention: convention.clone(),
                },
                p,
                matrix.nrows(),
            ),
            NodeKind::Scaled { scale, operand } => operand.transformed_unchecked(matrix * *scale, offset),
            NodeKind::Negation(operand) => operand.transformed_unchecked(-matrix, offset),
            _ => Self::transformed_node(self.clone(), matrix, offset),
        }
    }

    pub fn negated(&self) -> Self {
        let (p, d) = (self.num_parameters(), self.num_dimensions());
        match self.kind() {
            NodeKind::Constant { value } => Self::constant(&scale_vec(value, -1.0), p),
            NodeKind::Negation(operand) => operand.clone(),
            NodeKind::Scaled { scale, operand } => operand.scaled(-scale),
            NodeKind::Transformed {
                operand,
                matrix,
                offset,
            } => operand.transformed_unchecked(-matrix, scale_vec(offset, -1.0)),
            NodeKind::Linear { origin, basis } => Self::new(
                NodeKind::Linear {
                    origin: scale_vec(origin, -1.0),
                    basis: -basis,
                },
                p,
                d,
            ),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => Self::new(
                NodeKind::Elliptical {
                    origin: scale_vec(origin, -1.0),
                    basis: -basis,
                    convention: convention.clone(),
                },
                p,
                d,
            ),
            _ => Self::new(NodeKind::Negation(self.clone()), p, d),
        }
    }

    pub fn scaled(&self, scale: f64) -> Self {
        let (p, d) = (self.num_parameters(), self.num_dimensions());
        if scale == 1.0 {
            return self.clone();
        }
        if scale == 0.0 {
            return Self::zero(d, p);
        }
        if scale == -1.0 {
            return self.negated();
        }
        match self.kind() {
            NodeKind::Constant { value } => Self::constant(&scale_vec(value, scale), p),
            NodeKind::Scaled {
                scale: inner,
                operand,
            } => operand.scaled(scale * inner),
            NodeKind::Negation(operand) => operand.scaled(-scale),
            NodeKind::Transformed {
                operand,
                matrix,
                offset,
            } => operand.transformed_unchecked(matrix * scale, scale_vec(offset, scale)),
            NodeKind::Linear { origin, basis } => Self::new(
                NodeKind::Linear {
                    origin: scale_vec(origin, scale),
                    basis: basis * scale,
                },
                p,
                d,
            ),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => Self::new(
                NodeKind::Elliptical {
                    origin: scale_vec(origin, scale),
                    basis: basis * scale,
                    convention: convention.clone(),
                },
                p,
                d,
            ),
            _ => Self::new(
                NodeKind::Scaled {
                    scale,
                    operand: self.clone(),
                },
                p,
                d,
            ),
        }
    }

    pub fn try_add(&self, other: &Self) -> Result<Self> {
        check_same_shape("sum", self, other)?;
        Ok(match (self.constant_value(), other.constant_value()) {
            (Some(a), Some(b)) => Self::constant(&add_vec(a, b), self.num_parameters()),
            (_, Some(b)) => self.translated_unchecked(b),
            (Some(a), _) => other.translated_unchecked(a),
            _ => Self::new(
                NodeKind::Sum(self.clone(), other.clone()),
                self.num_parameters(),
                self.num_dimensions(),
            ),
        })
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        check_same_shape("difference", self, other)?;
        Ok(match (self.constant_value(), other.constant_value()) {
            (_, Some(b)) => self.translated_unchecked(&scale_vec(b, -1.0)),
            (Some(a), _) => other.negated().translated_unchecked(a),
            _ => Self::new(
                NodeKind::Difference(self.clone(), other.clone()),
                self.num_parameters(),
                self.num_dimensions(),
            ),
        })
    }

    /// Scalar-times-vector product. At least one operand must be scalar.
    pub fn try_mul(&self, other: &Self) -> Result<Self> {
        check_same_parameters("product", self, other)?;
        let (multiplier, multiplicand) = if self.num_dimensions() == 1 {
            (self, other)
        } else if other.num_dimensions() == 1 {
            (other, self)
        } else {
            return Err(ExpressionError::shape_mismatch(
                "product",
                "a scalar operand",
                format!("{} and {}", self.shape(), other.shape()),
            ));
        };
        if let Some(s) = multiplier.scalar_value() {
            return Ok(multiplicand.scaled(s));
        }
        if let Some(v) = multiplicand.constant_value() {
            if let &[s] = v {
                return Ok(multiplier.scaled(s));
            }
            return Ok(multiplier.transformed_unchecked(column_matrix(v), vec![0.0; v.len()]));
        }
        Ok(Self::new(
            NodeKind::Product {
                multiplier: multiplier.clone(),
                multiplicand: multiplicand.clone(),
            },
            self.num_parameters(),
            multiplicand.num_dimensions(),
        ))
    }

    /// Vector-over-scalar quotient. `x / x` is kept as a quotient.
    pub fn try_div(&self, other: &Self) -> Result<Self> {
        check_same_parameters("quotient", self, other)?;
        check_scalar("quotient", other)?;
        if let Some(c) = other.scalar_value() {
            if c == 0.0 {
                return Err(DomainError::division_by_zero(c, c).into());
            }
            return Ok(self.scaled(1.0 / c));
        }
        if self.is_zero_constant() {
            return Ok(self.clone());
        }
        Ok(Self::new(
            NodeKind::Quotient {
                dividend: self.clone(),
                divisor: other.clone(),
            },
            self.num_parameters(),
            self.num_dimensions(),
        ))
    }

    pub fn dot(&self, other: &Self) -> Result<Self> {
        check_same_shape("dot", self, other)?;
        let p = self.num_parameters();
        Ok(match (self.constant_value(), other.constant_value()) {
            (Some(a), Some(b)) => Self::scalar(a.iter().zip(b).map(|(x, y)| x * y).sum(), p),
            _ if self.is_zero_constant() || other.is_zero_constant() => Self::zero(1, p),
            (Some(v), None) => other.transformed_unchecked(row_matrix(v), vec![0.0]),
            (None, Some(v)) => self.transformed_unchecked(row_matrix(v), vec![0.0]),
            (None, None) => Self::new(NodeKind::Dot(self.clone(), other.clone()), p, 1),
        })
    }

    pub fn cross(&self, other: &Self) -> Result<Self> {
        check_same_shape("cross", self, other)?;
        let p = self.num_parameters();
        if self.num_dimensions() != 3 {
            return Err(ExpressionError::shape_mismatch(
                "cross",
                Shape {
                    num_parameters: p,
                    num_dimensions: 3,
                },
                self.shape(),
            ));
        }
        Ok(match (self.constant_value(), other.constant_value()) {
            (Some(a), Some(b)) => Self::constant(&cross_vec(a, b), p),
            _ if self.is_zero_constant() || other.is_zero_constant() => Self::zero(3, p),
            (Some(v), None) => other.transformed_unchecked(cross_matrix(v), vec![0.0; 3]),
            (None, Some(v)) => self.transformed_unchecked(-cross_matrix(v), vec![0.0; 3]),
            (None, None) => Self::new(NodeKind::Cross(self.clone(), other.clone()), p, 3),
        })
    }

    pub fn norm(&self) -> Self {
        let p = self.num_parameters();
        match self.kind() {
            NodeKind::Constant { value } => Self::scalar(value.iter().map(|v| v * v).sum::<f64>().sqrt(), p),
            NodeKind::Normalized(_) => Self::scalar(1.0, p),
            _ => Self::new(NodeKind::Norm(self.clone()), p, 1),
        }
    }

    pub fn squared_norm(&self) -> Self {
        let p = self.num_parameters();
        match self.kind() {
            NodeKind::Constant { value } => Self::scalar(value.iter().map(|v| v * v).sum(), p),
            NodeKind::Normalized(_) => Self::scalar(1.0, p),
            _ => Self::new(NodeKind::SquaredNorm(self.clone()), p, 1),
        }
    }

    /// Square of a scalar expression.
    pub fn squared(&self) -> Result<Self> {
        check_scalar("squared", self)?;
        Ok(self.squared_norm())
    }

    pub fn normalized(&self) -> Result<Self> {
        let (p, d) = (self.num_parameters(), self.num_dimensions());
        match self.kind() {
            NodeKind::Constant { value } => {
                let norm = value.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm == 0.0 {
                    return Err(DomainError::division_by_zero(norm, norm).into());
                }
                Ok(Self::constant(&scale_vec(value, 1.0 / norm), p))
            }
            NodeKind::Normalized(_) => Ok(self.clone()),
            _ => Ok(Self::new(NodeKind::Normalized(self.clone()), p, d)),
        }
    }

    fn unary(
        &self,
        operation: &'static str,
        kind: fn(Self) -> NodeKind,
        fold: impl FnOnce(f64) -> std::result::Result<f64, DomainError>,
    ) -> Result<Self> {
        check_scalar(operation, self)?;
        if let Some(v) = self.scalar_value() {
            return Ok(Self::scalar(fold(v)?, self.num_parameters()));
        }
        Ok(Self::new(kind(self.clone()), self.num_parameters(), 1))
    }

    pub fn sqrt(&self) -> Result<Self> {
        self.unary("sqrt", NodeKind::SquareRoot, |v| v.try_sqrt(DEFAULT_DOMAIN_TOLERANCE))
    }

    pub fn sin(&self) -> Result<Self> {
        self.unary("sin", NodeKind::Sine, |v| Ok(v.sin()))
    }

    pub fn cos(&self) -> Result<Self> {
        self.unary("cos", NodeKind::Cosine, |v| Ok(v.cos()))
    }

    pub fn tan(&self) -> Result<Self> {
        self.unary("tan", NodeKind::Tangent, |v| Ok(v.tan()))
    }

    pub fn asin(&self) -> Result<Self> {
        self.unary("asin", NodeKind::Arcsine, |v| v.try_asin(DEFAULT_DOMAIN_TOLERANCE))
    }

    pub fn acos(&self) -> Result<Self> {
        self.unary("acos", NodeKind::Arccosine, |v| v.try_acos(DEFAULT_DOMAIN_TOLERANCE))
    }

    pub fn exp(&self) -> Result<Self> {
        self.unary("exp", NodeKind::Exponential, |v| Ok(v.exp()))
    }

    pub fn ln(&self) -> Result<Self> {
        self.unary("log", NodeKind::Logarithm, Scalar::try_ln)
    }

    pub fn pow(&self, exponent: &Self) -> Result<Self> {
        check_scalar("pow", self)?;
        check_scalar("pow", exponent)?;
        check_same_parameters("pow", self, exponent)?;
        let p = self.num_parameters();
        Ok(match (self.scalar_value(), exponent.scalar_value()) {
            (Some(b), Some(e)) => Self::scalar(b.try_powf(e)?, p),
            (_, Some(e)) if e == 1.0 => self.clone(),
            (_, Some(e)) if e == 0.0 => Self::scalar(1.0, p),
            _ => Self::new(
                NodeKind::Power {
                    base: self.clone(),
                    exponent: exponent.clone(),
                },
                p,
                1,
            ),
        })
    }

    pub fn powf(&self, exponent: f64) -> Result<Self> {
        self.pow(&Self::scalar(exponent, self.num_parameters()))
    }

    /// Rows `start..start + count` of the output.
    pub fn components(&self, start: usize, count: usize) -> Result<Self> {
        let (p, d) = (self.num_parameters(), self.num_dimensions());
        if count == 0 {
            return Err(ExpressionError::shape_mismatch("components", "a non-empty range", "0 components"));
        }
        let end = start.saturating_add(count);
        if end > d {
            return Err(ExpressionError::index_out_of_range("components", end - 1, d));
        }
        if start == 0 && count == d {
            return Ok(self.clone());
        }
        match self.kind() {
            NodeKind::Constant { value } => Ok(Self::constant(&value[start..end], p)),
            NodeKind::Identity if count == 1 => Self::parameter(p, start),
            NodeKind::Components {
                operand,
                start: outer_start,
                ..
            } => operand.components(outer_start + start, count),
            NodeKind::Transformed {
                operand,
                matrix,
                offset,
            } => Ok(operand.transformed_unchecked(
                matrix.slice(s![start..end, ..]).to_owned(),
                offset[start..end].to_vec(),
            )),
            NodeKind::Linear { origin, basis } => Ok(Self::new(
                NodeKind::Linear {
                    origin: origin[start..end].to_vec(),
                    basis: basis.slice(s![start..end, ..]).to_owned(),
                },
                p,
                count,
            )),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => Ok(Self::new(
                NodeKind::Elliptical {
                    origin: origin[start..end].to_vec(),
                    basis: basis.slice(s![start..end, ..]).to_owned(),
                    convention: convention.clone(),
                },
                p,
                count,
            )),
            NodeKind::Concatenation(parts) => {
                let mut offset = 0;
                for part in parts {
                    let part_end = offset + part.num_dimensions();
                    if start >= offset && end <= part_end {
                        return part.components(start - offset, count);
                    }
                    offset = part_end;
                }
                Ok(self.components_node(start, count))
            }
            _ => Ok(self.components_node(start, count)),
        }
    }

    fn components_node(&self, start: usize, count: usize) -> Self {
        Self::new(
            NodeKind::Components {
                operand: self.clone(),
                start,
                count,
            },
            self.num_parameters(),
            count,
        )
    }

    pub fn component(&self, index: usize) -> Result<Self> {
        self.components(index, 1)
    }

    pub fn x(&self) -> Result<Self> {
        self.component(0)
    }

    pub fn y(&self) -> Result<Self> {
        self.component(1)
    }

    pub fn z(&self) -> Result<Self> {
        self.component(2)
    }

    /// Stack the outputs of `parts` on top of each other.
    pub fn concatenation(parts: &[Self]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(ExpressionError::shape_mismatch("concatenation", "at least one operand", "none"));
        };
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            check_same_parameters("concatenation", first, part)?;
            match part.kind() {
                NodeKind::Concatenation(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(part.clone()),
            }
        }
        if let [single] = flat.as_slice() {
            return Ok(single.clone());
        }
        let p = first.num_parameters();
        if flat.iter().all(|e| e.constant_value().is_some()) {
            let value: Vec<f64> = flat
                .iter()
                .filter_map(Self::constant_value)
                .flatten()
                .copied()
                .collect();
            return Ok(Self::constant(&value, p));
        }
        let d = flat.iter().map(Self::num_dimensions).sum();
        Ok(Self::new(NodeKind::Concatenation(flat), p, d))
    }

    pub fn concatenated(&self, other: &Self) -> Result<Self> {
        Self::concatenation(&[self.clone(), other.clone()])
    }
}

macro_rules! impl_binary_ops {
    ($($Trait:ident, $method:ident, $try_method:ident;)*) => {
        $(
            impl $Trait<&Expression> for &Expression {
                type Output = Expression;

                fn $method(self, rhs: &Expression) -> Expression {
                    self.$try_method(rhs).unwrap_or_else(|e| panic!("{e}"))
                }
            }

            impl $Trait<Expression> for Expression {
                type Output = Expression;

                fn $method(self, rhs: Expression) -> Expression {
                    $Trait::$method(&self, &rhs)
                }
            }

            impl $Trait<&Expression> for Expression {
                type Output = Expression;

                fn $method(self, rhs: &Expression) -> Expression {
                    $Trait::$method(&self, rhs)
                }
            }

            impl $Trait<Expression> for &Expression {
                type Output = Expression;

                fn $method(self, rhs: Expression) -> Expression {
                    $Trait::$method(self, &rhs)
                }
            }
        )*
    };
}

// The operator forms panic on a shape mismatch or a constant division by zero; the `try_*`
// methods report those as errors instead.
impl_binary_ops! {
    Add, add, try_add;
    Sub, sub, try_sub;
    Mul, mul, try_mul;
    Div, div, try_div;
}

impl Neg for &Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.negated()
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.negated()
    }
}

impl Mul<f64> for &Expression {
    type Output = Expression;

    fn mul(self, rhs: f64) -> Expression {
        self.scaled(rhs)
    }
}

impl Mul<f64> for Expression {
    type Output = Expression;

    fn mul(self, rhs: f64) -> Expression {
        self.scaled(rhs)
    }
}

impl Mul<&Expression> for f64 {
    type Output = Expression;

    fn mul(self, rhs: &Expression) -> Expression {
        rhs.scaled(self)
    }
}

impl Mul<Expression> for f64 {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        rhs.scaled(self)
    }
}
