use thiserror::Error;

/// A scalar function was applied outside of its mathematical domain.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("{function} is undefined on [{lower}, {upper}]")]
    OutOfDomain {
        function: &'static str,
        lower: f64,
        upper: f64,
    },
    #[error("division by a value in [{lower}, {upper}], which contains zero")]
    DivisionByZero { lower: f64, upper: f64 },
}

impl DomainError {
    pub(crate) fn out_of_domain(function: &'static str, lower: f64, upper: f64) -> Self {
        Self::OutOfDomain { function, lower, upper }
    }

    pub(crate) fn division_by_zero(lower: f64, upper: f64) -> Self {
        Self::DivisionByZero { lower, upper }
    }
}

/// Shape of an expression as `(num_parameters, num_dimensions)`, used for error context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Shape {
    pub num_parameters: usize,
    pub num_dimensions: usize,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{} -> R{}", self.num_parameters, self.num_dimensions)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("{operation}: expected {expected}, found {found}")]
    ShapeMismatch {
        operation: &'static str,
        expected: String,
        found: String,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{operation}: index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        operation: &'static str,
        index: usize,
        bound: usize,
    },
    #[error("{variant} has no derivative rule")]
    NotDifferentiable { variant: &'static str },
}

impl ExpressionError {
    pub(crate) fn shape_mismatch(operation: &'static str, expected: impl ToString, found: impl ToString) -> Self {
        Self::ShapeMismatch {
            operation,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn index_out_of_range(operation: &'static str, index: usize, bound: usize) -> Self {
        Self::IndexOutOfRange {
            operation,
            index,
            bound,
        }
    }
}

pub type Result<T, E = ExpressionError> = std::result::Result<T, E>;
