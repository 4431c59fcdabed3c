use std::sync::Arc;

use tracing::debug;

use crate::objects::ObjectRegistry;
use crate::{ApplyError, Attributes, ConfigObject, Location, Node, Scope};

/// Accumulates the definition of a new object: type, name, scope and an
/// ordered list of assignment nodes.
///
/// Nodes are kept exactly in the order they were added; later assignments to
/// the same attribute win when the definition is committed.
#[derive(Debug, Default)]
pub struct ConfigItemBuilder {
    location: Location,
    type_name: Option<String>,
    name: Option<String>,
    scope: Option<Arc<Scope>>,
    expressions: Vec<Node>,
}

impl ConfigItemBuilder {
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            location,
            ..Self::default()
        }
    }

    pub fn set_type(&mut self, type_name: &str) -> &mut Self {
        self.type_name = Some(type_name.to_owned());
        self
    }

    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_owned());
        self
    }

    pub fn set_scope(&mut self, scope: Arc<Scope>) -> &mut Self {
        self.scope = Some(scope);
        self
    }

    pub fn add_expression(&mut self, node: Node) -> &mut Self {
        self.expressions.push(node);
        self
    }

    /// Produce the pending definition.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::MissingType`] or [`ApplyError::MissingName`] if
    /// those were never set.
    pub fn compile(self) -> Result<ConfigItem, ApplyError> {
        let type_name = self.type_name.ok_or(ApplyError::MissingType)?;
        let name = self.name.ok_or_else(|| ApplyError::MissingName {
            type_name: type_name.clone(),
        })?;
        Ok(ConfigItem {
            location: self.location,
            type_name,
            name,
            scope: self.scope.unwrap_or_default(),
            expressions: Node::Sequence(self.expressions),
        })
    }
}

/// A pending object definition produced by [`ConfigItemBuilder::compile`].
#[derive(Debug)]
pub struct ConfigItem {
    location: Location,
    type_name: String,
    name: String,
    scope: Arc<Scope>,
    expressions: Node,
}

impl ConfigItem {
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// The assignment nodes, as one sequence in execution order.
    #[must_use]
    pub fn expressions(&self) -> &Node {
        &self.expressions
    }

    /// Register the definition so it is visible to lookups.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::DuplicateObject`] when the type already has a
    /// definition with this name.
    pub fn register(self, registry: &ObjectRegistry) -> Result<Arc<ConfigItem>, ApplyError> {
        registry.register_item(self)
    }

    /// Execute the assignments against a fresh instance and make it live.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Assignment`] when an assignment fails or the
    /// result does not fit the type's schema. The definition stays registered.
    pub fn commit(&self, registry: &ObjectRegistry) -> Result<Arc<ConfigObject>, ApplyError> {
        let mut attributes = Attributes::new();
        let executed = self
            .expressions
            .execute(&self.scope, &mut attributes)
            .and_then(|()| match registry.descriptor(&self.type_name) {
                Some(descriptor) => descriptor.validate(&attributes),
                None => Ok(()),
            });
        executed.map_err(|source| ApplyError::Assignment {
            type_name: self.type_name.clone(),
            name: self.name.clone(),
            source,
        })?;

        debug!(type_name = %self.type_name, name = %self.name, location = %self.location, "committing object");
        registry.add_object(ConfigObject::with_attributes(
            &self.type_name,
            &self.name,
            attributes,
        ))
    }

    /// Run the whole lifecycle: register, commit, then the post-load hook.
    ///
    /// No step is rolled back when a later one fails.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub fn materialize(self, registry: &ObjectRegistry) -> Result<Arc<ConfigObject>, ApplyError> {
        let item = self.register(registry)?;
        let object = item.commit(registry)?;
        registry.on_config_loaded(&object)?;
        Ok(object)
    }
}
