use std::fmt;

use super::error::ExprError;
use super::{Attributes, Scope, Value};

/// Immutable expression node used to assemble object definitions.
///
/// A [`Node::Sequence`] runs its children in order, so a later `Set` of the
/// same attribute overrides an earlier one. A pre-built rule body is embedded
/// as one child of the synthesized sequence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    Literal(Value),
    Variable(String),
    Set { attribute: String, value: Box<Node> },
    Sequence(Vec<Node>),
}

impl Node {
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Node {
        Node::Literal(value.into())
    }

    #[must_use]
    pub fn variable(path: &str) -> Node {
        Node::Variable(path.to_owned())
    }

    #[must_use]
    pub fn set(attribute: &str, value: Node) -> Node {
        Node::Set {
            attribute: attribute.to_owned(),
            value: Box::new(value),
        }
    }

    /// Shorthand for `set(attribute, literal(value))`.
    #[must_use]
    pub fn assign(attribute: &str, value: impl Into<Value>) -> Node {
        Node::set(attribute, Node::literal(value))
    }

    /// An empty sequence; executing it does nothing.
    #[must_use]
    pub fn empty() -> Node {
        Node::Sequence(Vec::new())
    }

    /// Evaluate the node to a value. Assignments and sequences produce `None`.
    pub fn evaluate(&self, scope: &Scope) -> Result<Option<Value>, ExprError> {
        match self {
            Node::Literal(value) => Ok(Some(value.clone())),
            Node::Variable(path) => scope
                .resolve(path)?
                .map(Some)
                .ok_or_else(|| ExprError::NotAValue { path: path.clone() }),
            Node::Set { .. } | Node::Sequence(_) => Ok(None),
        }
    }

    /// Execute the node against an object under construction.
    pub fn execute(&self, scope: &Scope, target: &mut Attributes) -> Result<(), ExprError> {
        match self {
            Node::Literal(_) | Node::Variable(_) => self.evaluate(scope).map(drop),
            Node::Set { attribute, value } => {
                let value = value.evaluate(scope)?.ok_or_else(|| ExprError::NotAValue {
                    path: attribute.clone(),
                })?;
                target.insert(attribute.clone(), value);
                Ok(())
            }
            Node::Sequence(nodes) => nodes
                .iter()
                .try_for_each(|node| node.execute(scope, target)),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(value) => write!(f, "{value}"),
            Node::Variable(path) => write!(f, "{path}"),
            Node::Set { attribute, value } => write!(f, "{attribute} = {value}"),
            Node::Sequence(nodes) => {
                f.write_str("{ ")?;
                for node in nodes {
                    write!(f, "{node}; ")?;
                }
                f.write_str("}")
            }
        }
    }
}
