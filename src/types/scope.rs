use std::collections::HashMap;
use std::sync::Arc;

use super::error::ExprError;
use super::{ConfigObject, Value};

/// A value visible to expressions under a name.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Object(Arc<ConfigObject>),
}

/// Name → binding map with an optional read-only parent.
///
/// Rules capture a lexical scope when they are parsed; the driver then builds
/// a fresh child scope per candidate holding `host` (and `service`). Lookups
/// fall through to the parent, local bindings shadow it.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scope whose lookups fall back to `parent`.
    #[must_use]
    pub fn child(parent: Arc<Scope>) -> Self {
        Self {
            vars: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Bind a value (builder form).
    #[must_use]
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, Binding::Value(value.into()));
        self
    }

    /// Bind an object (mutable reference form).
    pub fn bind(&mut self, name: &str, object: Arc<ConfigObject>) {
        self.insert(name, Binding::Object(object));
    }

    pub fn insert(&mut self, name: &str, binding: Binding) {
        self.vars.insert(name.to_owned(), binding);
    }

    /// Look up a name here or in any parent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        match self.vars.get(name) {
            Some(binding) => Some(binding),
            None => self.parent.as_deref().and_then(|p| p.get(name)),
        }
    }

    /// Look up a name in this scope only, ignoring parents.
    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<&Binding> {
        self.vars.get(name)
    }

    /// Names bound directly in this scope.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolve a dot-separated path to a value.
    ///
    /// The first segment must be bound, otherwise this fails with
    /// [`ExprError::UnboundReference`]. For object bindings the remainder of
    /// the path names an attribute; `Ok(None)` means the attribute is absent
    /// or the path stops at an object.
    pub fn resolve(&self, path: &str) -> Result<Option<Value>, ExprError> {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };

        let binding = self.get(root).ok_or_else(|| ExprError::UnboundReference {
            name: root.to_owned(),
        })?;

        Ok(match (binding, rest) {
            (Binding::Value(value), None) => Some(value.clone()),
            (Binding::Value(_), Some(_)) | (Binding::Object(_), None) => None,
            (Binding::Object(object), Some(attribute)) => object.get(attribute),
        })
    }
}
