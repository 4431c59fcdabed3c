use thiserror::Error;

use crate::parse::ParseError;
use crate::types::ExprError;

/// Unified error type for rule loading, evaluation and object synthesis.
///
/// Candidate-level errors (`Filter`, `DuplicateObject`, `Assignment`, `Hook`,
/// `MissingReference`, `OrphanService`) are caught per candidate and logged.
/// See [`is_programming_error`](Self::is_programming_error) for the ones that
/// abort the enclosing call instead.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("filter of apply rule '{rule}' failed")]
    Filter {
        rule: String,
        #[source]
        source: ExprError,
    },

    #[error("object definition has no type")]
    MissingType,

    #[error("object definition of type '{type_name}' has no name")]
    MissingName { type_name: String },

    #[error("apply rule '{rule}' has no filter")]
    MissingFilter { rule: String },

    #[error("object '{name}' of type '{type_name}' already exists")]
    DuplicateObject { type_name: String, name: String },

    #[error("failed to commit object '{name}' of type '{type_name}'")]
    Assignment {
        type_name: String,
        name: String,
        #[source]
        source: ExprError,
    },

    #[error("post-load hook failed for object '{name}' of type '{type_name}'")]
    Hook {
        type_name: String,
        name: String,
        #[source]
        source: Box<ApplyError>,
    },

    #[error("'{name}' references {referenced_type} '{referenced}' which does not exist")]
    MissingReference {
        name: String,
        referenced_type: String,
        referenced: String,
    },

    #[error("service '{service}' has no owning host")]
    OrphanService { service: String },

    #[error("apply rule '{rule}' has unsupported target type '{target}'")]
    UnsupportedTarget { rule: String, target: String },

    #[error("variable name '{name}' is reserved for candidate bindings")]
    ReservedVariable { name: String },

    #[error("no apply handler registered for kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("apply handler for kind '{kind}' is already registered")]
    DuplicateKind { kind: String },

    #[error("apply task panicked: {message}")]
    TaskPanicked { message: String },

    #[error("invalid configuration value for {key}: '{value}'")]
    InvalidConfig { key: String, value: String },

    #[error("failed to initialise logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApplyError {
    /// Errors caused by a misconfigured object kind or registry rather than by
    /// rule data. These abort the enclosing call.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            ApplyError::MissingType
                | ApplyError::MissingName { .. }
                | ApplyError::UnknownKind { .. }
                | ApplyError::DuplicateKind { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_object_message() {
        let err = ApplyError::DuplicateObject {
            type_name: "Dependency".into(),
            name: "web1!db".into(),
        };
        assert_eq!(
            err.to_string(),
            "object 'web1!db' of type 'Dependency' already exists"
        );
    }

    #[test]
    fn assignment_keeps_source() {
        let err = ApplyError::Assignment {
            type_name: "Dependency".into(),
            name: "d".into(),
            source: ExprError::UnboundReference { name: "x".into() },
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("reference to unbound name 'x'"));
    }

    #[test]
    fn unsupported_target_message() {
        let err = ApplyError::UnsupportedTarget {
            rule: "r".into(),
            target: "User".into(),
        };
        assert_eq!(
            err.to_string(),
            "apply rule 'r' has unsupported target type 'User'"
        );
    }

    #[test]
    fn programming_errors_classified() {
        assert!(ApplyError::MissingType.is_programming_error());
        assert!(ApplyError::UnknownKind { kind: "X".into() }.is_programming_error());
        assert!(
            !ApplyError::DuplicateObject {
                type_name: "T".into(),
                name: "n".into()
            }
            .is_programming_error()
        );
    }
}
