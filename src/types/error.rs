use thiserror::Error;

use super::ValueKind;

/// Errors raised while evaluating filters or executing assignment nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("reference to unbound name '{name}'")]
    UnboundReference { name: String },

    #[error("'{path}' does not evaluate to a value")]
    NotAValue { path: String },

    #[error("attribute '{attribute}' expects {expected}, got {found}")]
    TypeMismatch {
        attribute: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("attribute '{attribute}' is unknown for type '{type_name}'")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },
}

/// A target-type tag that does not name a known [`TargetType`](super::TargetType).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown target type '{0}'")]
pub struct UnknownTargetType(pub String);
