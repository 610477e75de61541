use ndarray::Array2;
use smallvec::{SmallVec, smallvec};

use crate::error::Shape;
use crate::expression::Expression;

/// The closed set of node variants.
///
/// Every variant holds only its operand handles and immutable auxiliary data. Shapes are stored
/// on the enclosing [`Node`] and validated by the constructors in [`crate::expression`].
#[derive(Clone, Debug)]
pub enum NodeKind {
    Constant {
        value: Vec<f64>,
    },
    /// Component `index` of the parameter vector.
    Parameter {
        index: usize,
    },
    Identity,
    Sum(Expression, Expression),
    Difference(Expression, Expression),
    /// Scalar `multiplier` times vector `multiplicand`.
    Product {
        multiplier: Expression,
        multiplicand: Expression,
    },
    /// Vector `dividend` over scalar `divisor`.
    Quotient {
        dividend: Expression,
        divisor: Expression,
    },
    Negation(Expression),
    Scaled {
        scale: f64,
        operand: Expression,
    },
    Dot(Expression, Expression),
    Cross(Expression, Expression),
    Norm(Expression),
    SquaredNorm(Expression),
    Normalized(Expression),
    SquareRoot(Expression),
    Sine(Expression),
    Cosine(Expression),
    Tangent(Expression),
    Arcsine(Expression),
    Arccosine(Expression),
    Exponential(Expression),
    Logarithm(Expression),
    Power {
        base: Expression,
        exponent: Expression,
    },
    Components {
        operand: Expression,
        start: usize,
        count: usize,
    },
    Concatenation(Vec<Expression>),
    /// `outer(inner(t))`.
    Composition {
        outer: Expression,
        inner: Expression,
    },
    /// `matrix * operand + offset`.
    Transformed {
        operand: Expression,
        matrix: Array2<f64>,
        offset: Vec<f64>,
    },
    /// `origin + basis * t`; `basis` is `num_dimensions x num_parameters`.
    Linear {
        origin: Vec<f64>,
        basis: Array2<f64>,
    },
    /// `origin + basis * local(t)` where `local` is a product of sines and cosines of the
    /// parameters; `basis` is `num_dimensions x (num_parameters + 1)` and `convention[i]` selects
    /// whether parameter `i` contributes `cos` (true) or `sin` (false) to its own axis.
    Elliptical {
        origin: Vec<f64>,
        basis: Array2<f64>,
        convention: Vec<bool>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "Constant",
            Self::Parameter { .. } => "Parameter",
            Self::Identity => "Identity",
            Self::Sum(..) => "Sum",
            Self::Difference(..) => "Difference",
            Self::Product { .. } => "Product",
            Self::Quotient { .. } => "Quotient",
            Self::Negation(_) => "Negation",
            Self::Scaled { .. } => "Scaled",
            Self::Dot(..) => "Dot",
            Self::Cross(..) => "Cross",
            Self::Norm(_) => "Norm",
            Self::SquaredNorm(_) => "SquaredNorm",
            Self::Normalized(_) => "Normalized",
            Self::SquareRoot(_) => "SquareRoot",
            Self::Sine(_) => "Sine",
            Self::Cosine(_) => "Cosine",
            Self::Tangent(_) => "Tangent",
            Self::Arcsine(_) => "Arcsine",
            Self::Arccosine(_) => "Arccosine",
            Self::Exponential(_) => "Exponential",
            Self::Logarithm(_) => "Logarithm",
            Self::Power { .. } => "Power",
            Self::Components { .. } => "Components",
            Self::Concatenation(_) => "Concatenation",
            Self::Composition { .. } => "Composition",
            Self::Transformed { .. } => "Transformed",
            Self::Linear { .. } => "Linear",
            Self::Elliptical { .. } => "Elliptical",
        }
    }

    pub fn operands(&self) -> SmallVec<[&Expression; 2]> {
        match self {
            Self::Constant { .. }
            | Self::Parameter { .. }
            | Self::Identity
            | Self::Linear { .. }
            | Self::Elliptical { .. } => SmallVec::new(),
            Self::Sum(a, b) | Self::Difference(a, b) | Self::Dot(a, b) | Self::Cross(a, b) => smallvec![a, b],
            Self::Product {
                multiplier,
                multiplicand,
            } => smallvec![multiplier, multiplicand],
            Self::Quotient { dividend, divisor } => smallvec![dividend, divisor],
            Self::Power { base, exponent } => smallvec![base, exponent],
            Self::Composition { outer, inner } => smallvec![outer, inner],
            Self::Negation(x)
            | Self::Norm(x)
            | Self::SquaredNorm(x)
            | Self::Normalized(x)
            | Self::SquareRoot(x)
            | Self::Sine(x)
            | Self::Cosine(x)
            | Self::Tangent(x)
            | Self::Arcsine(x)
            | Self::Arccosine(x)
            | Self::Exponential(x)
            | Self::Logarithm(x) => smallvec![x],
            Self::Scaled { operand, .. } | Self::Components { operand, .. } | Self::Transformed { operand, .. } => {
                smallvec![operand]
            }
            Self::Concatenation(parts) => parts.iter().collect(),
        }
    }

    /// The same variant and auxiliary data over new operands, in [`NodeKind::operands`] order.
    ///
    /// No simplification is applied; the caller guarantees the operands have the original shapes.
    pub(crate) fn with_operands(&self, operands: &[Expression]) -> Self {
        let op = |i: usize| operands[i].clone();
        match self {
            Self::Constant { .. }
            | Self::Parameter { .. }
            | Self::Identity
            | Self::Linear { .. }
            | Self::Elliptical { .. } => self.clone(),
            Self::Sum(..) => Self::Sum(op(0), op(1)),
            Self::Difference(..) => Self::Difference(op(0), op(1)),
            Self::Dot(..) => Self::Dot(op(0), op(1)),
            Self::Cross(..) => Self::Cross(op(0), op(1)),
            Self::Product { .. } => Self::Product {
                multiplier: op(0),
                multiplicand: op(1),
            },
            Self::Quotient { .. } => Self::Quotient {
                dividend: op(0),
                divisor: op(1),
            },
            Self::Power { .. } => Self::Power {
                base: op(0),
                exponent: op(1),
            },
            Self::Composition { .. } => Self::Composition {
                outer: op(0),
                inner: op(1),
            },
            Self::Negation(_) => Self::Negation(op(0)),
            Self::Norm(_) => Self::Norm(op(0)),
            Self::SquaredNorm(_) => Self::SquaredNorm(op(0)),
            Self::Normalized(_) => Self::Normalized(op(0)),
            Self::SquareRoot(_) => Self::SquareRoot(op(0)),
            Self::Sine(_) => Self::Sine(op(0)),
            Self::Cosine(_) => Self::Cosine(op(0)),
            Self::Tangent(_) => Self::Tangent(op(0)),
            Self::Arcsine(_) => Self::Arcsine(op(0)),
            Self::Arccosine(_) => Self::Arccosine(op(0)),
            Self::Exponential(_) => Self::Exponential(op(0)),
            Self::Logarithm(_) => Self::Logarithm(op(0)),
            Self::Scaled { scale, .. } => Self::Scaled {
                scale: *scale,
                operand: op(0),
            },
            Self::Components { start, count, .. } => Self::Components {
                operand: op(0),
                start: *start,
                count: *count,
            },
            Self::Transformed { matrix, offset, .. } => Self::Transformed {
                operand: op(0),
                matrix: matrix.clone(),
                offset: offset.clone(),
            },
            Self::Concatenation(_) => Self::Concatenation(operands.to_vec()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) num_parameters: usize,
    pub(crate) num_dimensions: usize,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn num_parameters(&self) -> usize {
        self.num_parameters
    }

    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    pub fn shape(&self) -> Shape {
        Shape {
            num_parameters: self.num_parameters,
            num_dimensions: self.num_dimensions,
        }
    }
}
