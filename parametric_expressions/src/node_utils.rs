use rustc_hash::{FxHashMap, FxHashSet};

use crate::expression::Expression;
use crate::node::NodeKind;

/// Bottom-up reduction over the tree, visiting each shared node once.
///
/// Leaves go through `f_leaf`; a branch's own value comes from `f_branch` and is combined with
/// its operands' results by `op`. Results for a node reached along several paths are reused.
pub fn tree_mapreduce<R: Clone>(
    expr: &Expression,
    mut f_leaf: impl FnMut(&Expression) -> R,
    mut f_branch: impl FnMut(&Expression) -> R,
    mut op: impl FnMut(R, &[R]) -> R,
) -> R {
    let mut memo = FxHashMap::default();
    tree_mapreduce_impl(expr, &mut memo, &mut f_leaf, &mut f_branch, &mut op)
}

fn tree_mapreduce_impl<R: Clone>(
    expr: &Expression,
    memo: &mut FxHashMap<usize, R>,
    f_leaf: &mut impl FnMut(&Expression) -> R,
    f_branch: &mut impl FnMut(&Expression) -> R,
    op: &mut impl FnMut(R, &[R]) -> R,
) -> R {
    if let Some(r) = memo.get(&expr.id()) {
        return r.clone();
    }
    let operands = expr.kind().operands();
    let out = if operands.is_empty() {
        f_leaf(expr)
    } else {
        let children: Vec<R> = operands
            .iter()
            .map(|child| tree_mapreduce_impl(child, memo, f_leaf, f_branch, op))
            .collect();
        let parent = f_branch(expr);
        op(parent, &children)
    };
    memo.insert(expr.id(), out.clone());
    out
}

/// Size of the expression as a tree, counting a shared node once per reference.
pub fn count_nodes(expr: &Expression) -> usize {
    tree_mapreduce(
        expr,
        |_| 1usize,
        |_| 1usize,
        |parent, children| children.iter().fold(parent, |acc, &c| acc.saturating_add(c)),
    )
}

/// Number of distinct nodes (by identity) reachable from `expr`.
pub fn count_unique_nodes(expr: &Expression) -> usize {
    let mut seen = FxHashSet::default();
    let mut stack = vec![expr.clone()];
    while let Some(e) = stack.pop() {
        if seen.insert(e.id()) {
            stack.extend(e.kind().operands().into_iter().cloned());
        }
    }
    seen.len()
}

pub fn count_depth(expr: &Expression) -> usize {
    tree_mapreduce(
        expr,
        |_| 1usize,
        |_| 0usize,
        |_, children| children.iter().copied().max().unwrap_or(0) + 1,
    )
}

pub fn count_constant_nodes(expr: &Expression) -> usize {
    tree_mapreduce(
        expr,
        |e| usize::from(matches!(e.kind(), NodeKind::Constant { .. })),
        |_| 0usize,
        |_, children| children.iter().sum(),
    )
}
