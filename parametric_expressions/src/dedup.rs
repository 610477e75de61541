use core::mem::{Discriminant, discriminant};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::expression::Expression;
use crate::node::NodeKind;

/// Variant tag, canonical operand identities, auxiliary data bits and shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StructuralKey {
    tag: Discriminant<NodeKind>,
    operands: SmallVec<[usize; 2]>,
    data: SmallVec<[u64; 4]>,
    shape: (usize, usize),
}

fn float_bits(v: f64) -> u64 {
    // -0.0 and 0.0 describe the same node.
    if v == 0.0 { 0 } else { v.to_bits() }
}

fn push_floats<'a>(data: &mut SmallVec<[u64; 4]>, values: impl IntoIterator<Item = &'a f64>) {
    data.extend(values.into_iter().map(|&v| float_bits(v)));
}

/// Auxiliary (non-operand) data of a node, flattened for hashing and comparison.
fn auxiliary_data(kind: &NodeKind) -> SmallVec<[u64; 4]> {
    let mut data = SmallVec::new();
    match kind {
        NodeKind::Constant { value } => push_floats(&mut data, value),
        NodeKind::Parameter { index } => data.push(*index as u64),
        NodeKind::Scaled { scale, .. } => data.push(float_bits(*scale)),
        NodeKind::Components { start, count, .. } => {
            data.push(*start as u64);
            data.push(*count as u64);
        }
        NodeKind::Transformed { matrix, offset, .. } => {
            data.push(matrix.ncols() as u64);
            push_floats(&mut data, matrix.iter());
            push_floats(&mut data, offset);
        }
        NodeKind::Linear { origin, basis } => {
            data.push(basis.ncols() as u64);
            push_floats(&mut data, origin);
            push_floats(&mut data, basis.iter());
        }
        NodeKind::Elliptical {
            origin,
            basis,
            convention,
        } => {
            data.push(basis.ncols() as u64);
            push_floats(&mut data, origin);
            push_floats(&mut data, basis.iter());
            data.extend(convention.iter().map(|&c| u64::from(c)));
        }
        _ => {}
    }
    data
}

/// Canonicalizes structurally identical sub-expressions to one shared node.
///
/// One cache is meant for one deduplication pass (possibly over several roots that should share
/// structure, as in a Jacobian). Nodes that survive unchanged are returned as-is, so running a
/// second pass over a deduplicated tree returns the very same nodes.
#[derive(Debug, Default)]
pub struct DeduplicationCache {
    canonical: FxHashMap<StructuralKey, Expression>,
    // Input node -> (input kept alive, canonical output).
    visited: FxHashMap<usize, (Expression, Expression)>,
}

impl DeduplicationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct canonical nodes seen so far.
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn deduplicate(&mut self, expr: &Expression) -> Expression {
        if let Some((_, canonical)) = self.visited.get(&expr.id()) {
            return canonical.clone();
        }
        let operands = expr.kind().operands();
        let canonical_operands: SmallVec<[Expression; 2]> = operands.iter().map(|op| self.deduplicate(op)).collect();
        let unchanged = operands
            .iter()
            .zip(&canonical_operands)
            .all(|(before, after)| before.ptr_eq(after));
        let candidate = if unchanged {
            expr.clone()
        } else {
            Expression::new(
                expr.kind().with_operands(&canonical_operands),
                expr.num_parameters(),
                expr.num_dimensions(),
            )
        };
        let key = StructuralKey {
            tag: discriminant(candidate.kind()),
            operands: canonical_operands.iter().map(Expression::id).collect(),
            data: auxiliary_data(candidate.kind()),
            shape: (candidate.num_parameters(), candidate.num_dimensions()),
        };
        let canonical = self.canonical.entry(key).or_insert(candidate).clone();
        self.visited.insert(expr.id(), (expr.clone(), canonical.clone()));
        canonical
    }

    pub(crate) fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

impl Expression {
    /// Copy of this tree in which structurally identical sub-expressions share one node.
    pub fn deduplicated(&self) -> Expression {
        let mut cache = DeduplicationCache::new();
        let result = cache.deduplicate(self);
        debug!(
            visited = cache.visited_count(),
            canonical = cache.len(),
            "deduplicated expression"
        );
        result
    }

    /// Structural equivalence: same variant, shape and auxiliary data, with duplicate operands.
    pub fn is_duplicate_of(&self, other: &Expression) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.shape() != other.shape()
            || discriminant(self.kind()) != discriminant(other.kind())
            || auxiliary_data(self.kind()) != auxiliary_data(other.kind())
        {
            return false;
        }
        let (ours, theirs) = (self.kind().operands(), other.kind().operands());
        ours.len() == theirs.len() && ours.iter().zip(&theirs).all(|(a, b)| a.is_duplicate_of(b))
    }
}
