use crate::types::ExprError;
use crate::{Expr, Scope, Value};

impl Expr {
    /// Evaluate this filter against a binding scope.
    ///
    /// Evaluation only reads the scope and the objects bound in it. `AND`
    /// and `OR` short-circuit, so an unbound name on the untaken side of a
    /// branch is not reported.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UnboundReference`] when a field path's first
    /// segment is not bound.
    pub fn evaluate(&self, scope: &Scope) -> Result<bool, ExprError> {
        eval_expr(self, scope)
    }
}

fn eval_expr(expr: &Expr, scope: &Scope) -> Result<bool, ExprError> {
    Ok(match expr {
        Expr::Const(value) => *value,
        Expr::Compare { field, op, value } => scope
            .resolve(field)?
            .and_then(|found: Value| found.compare(*op, value))
            .unwrap_or(false),
        Expr::And(a, b) => eval_expr(a, scope)? && eval_expr(b, scope)?,
        Expr::Or(a, b) => eval_expr(a, scope)? || eval_expr(b, scope)?,
        Expr::Not(inner) => !eval_expr(inner, scope)?,
    })
}
