use crate::error::{ExpressionError, Result};
use crate::expression::Expression;
use crate::node::NodeKind;

impl Expression {
    /// Substitute `inner` for the parameter vector, giving `self(inner(t))`.
    ///
    /// `inner` must produce exactly `self.num_parameters()` outputs; the result takes its
    /// parameters from `inner`. Affine and trivial outer expressions are absorbed instead of
    /// being wrapped in a composition node.
    pub fn composed(&self, inner: &Expression) -> Result<Expression> {
        if inner.num_dimensions() != self.num_parameters() {
            return Err(ExpressionError::shape_mismatch(
                "composed",
                format!("inner expression with {} outputs", self.num_parameters()),
                inner.shape(),
            ));
        }
        let p = inner.num_parameters();
        if let Some(point) = inner.constant_value() {
            let value = self.evaluate_at(point)?;
            return Ok(Expression::constant(&value, p));
        }
        if matches!(inner.kind(), NodeKind::Identity) {
            return Ok(self.clone());
        }
        Ok(match self.kind() {
            NodeKind::Constant { value } => Expression::constant(value, p),
            NodeKind::Identity => inner.clone(),
            NodeKind::Parameter { index } => inner.component(*index)?,
            NodeKind::Negation(operand) => operand.composed(inner)?.negated(),
            NodeKind::Scaled { scale, operand } => operand.composed(inner)?.scaled(*scale),
            NodeKind::Transformed {
                operand,
                matrix,
                offset,
            } => operand
                .composed(inner)?
                .transformed_unchecked(matrix.clone(), offset.clone()),
            NodeKind::Linear { origin, basis } => inner.transformed_unchecked(basis.clone(), origin.clone()),
            NodeKind::Composition { outer, inner: middle } => outer.composed(&middle.composed(inner)?)?,
            _ => Expression::new(
                NodeKind::Composition {
                    outer: self.clone(),
                    inner: inner.clone(),
                },
                p,
                self.num_dimensions(),
            ),
        })
    }
}
