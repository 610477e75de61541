pub mod compose;
pub mod dedup;
pub mod derivative;
pub mod error;
pub mod evaluate;
pub mod expression;
pub mod interval;
pub mod node;
pub mod node_utils;
pub mod scalar;
pub mod strings;

pub use {ndarray, num_traits};

pub use crate::dedup::DeduplicationCache;
pub use crate::error::{DomainError, ExpressionError, Result, Shape};
pub use crate::evaluate::{
    DEFAULT_DOMAIN_TOLERANCE, EvalOptions, EvalStats, Evaluator, evaluate_bounds, evaluate_values,
};
pub use crate::expression::Expression;
pub use crate::interval::Interval;
pub use crate::node::{Node, NodeKind};
pub use crate::node_utils::{count_constant_nodes, count_depth, count_nodes, count_unique_nodes, tree_mapreduce};
pub use crate::scalar::Scalar;
pub use crate::strings::{StringTreeOptions, debug_tree, print_tree, string_tree};
