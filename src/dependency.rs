//! The `Dependency` object kind.
//!
//! A dependency ties a child checkable to a parent checkable. Apply rules
//! generate one per matching host or service, with the candidate as both
//! parent and child until the rule body overrides the parent.

use std::sync::Arc;

use crate::driver::{ApplyKind, Checkable};
use crate::objects::{ObjectRegistry, TypeDescriptor};
use crate::registry::ApplyRuleRegistry;
use crate::{ApplyError, ApplyRule, ConfigObject, TargetType, Value, ValueKind};

/// Relation on the child listing the dependencies it is subject to.
pub const DEPENDENCIES: &str = "dependencies";
/// Relation on the parent listing the dependencies that point at it.
pub const REVERSE_DEPENDENCIES: &str = "reverse_dependencies";

#[derive(Debug, Clone, Copy, Default)]
pub struct Dependency;

impl Dependency {
    pub const TYPE_NAME: &'static str = "Dependency";

    /// Attribute schema and post-load hook of `Dependency` objects.
    #[must_use]
    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME)
            .field("parent_host_name", ValueKind::String)
            .field("parent_service_name", ValueKind::String)
            .field("child_host_name", ValueKind::String)
            .field("child_service_name", ValueKind::String)
            .field("zone", ValueKind::String)
            .field("period", ValueKind::String)
            .field("disable_checks", ValueKind::Bool)
            .field("disable_notifications", ValueKind::Bool)
            .on_loaded(link_endpoints)
    }

    /// Install the descriptor into `objects` and the apply handler into
    /// `rules`.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::DuplicateKind`] if the kind is already registered.
    pub fn register(rules: &mut ApplyRuleRegistry, objects: &ObjectRegistry) -> Result<(), ApplyError> {
        objects.register_type(Self::descriptor());
        rules.register_kind(Dependency)
    }
}

impl ApplyKind for Dependency {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn targets(&self) -> &[TargetType] {
        &[TargetType::Host, TargetType::Service]
    }

    fn object_name(&self, rule: &ApplyRule, checkable: &Checkable) -> String {
        match checkable.service() {
            Some(service) => format!(
                "{}!{}!{}",
                checkable.host().name(),
                service.short_name(),
                rule.name()
            ),
            None => format!("{}!{}", checkable.host().name(), rule.name()),
        }
    }

    fn derived_attributes(&self, checkable: &Checkable) -> Vec<(String, Value)> {
        let host = checkable.host().name();
        let mut attributes = vec![
            ("parent_host_name".to_owned(), Value::from(host)),
            ("child_host_name".to_owned(), Value::from(host)),
        ];
        if let Some(service) = checkable.service() {
            attributes.push(("child_service_name".to_owned(), Value::from(service.short_name())));
        }
        attributes
    }
}

fn link_endpoints(objects: &ObjectRegistry, dependency: &ConfigObject) -> Result<(), ApplyError> {
    let child = endpoint(objects, dependency, "child_host_name", "child_service_name")?;
    let parent = endpoint(objects, dependency, "parent_host_name", "parent_service_name")?;
    child.link(DEPENDENCIES, dependency.name());
    parent.link(REVERSE_DEPENDENCIES, dependency.name());
    Ok(())
}

/// Look up the checkable a dependency names: a host, or a service on that host.
fn endpoint(
    objects: &ObjectRegistry,
    dependency: &ConfigObject,
    host_attribute: &str,
    service_attribute: &str,
) -> Result<Arc<ConfigObject>, ApplyError> {
    let missing = |referenced_type: &str, referenced: String| ApplyError::MissingReference {
        name: dependency.name().to_owned(),
        referenced_type: referenced_type.to_owned(),
        referenced,
    };

    let host = dependency
        .get(host_attribute)
        .and_then(|v| v.as_str().map(str::to_owned))
        .ok_or_else(|| missing("Host", String::new()))?;

    match dependency.get(service_attribute).and_then(|v| v.as_str().map(str::to_owned)) {
        Some(service) => {
            let full = format!("{host}!{service}");
            objects
                .get_object(TargetType::Service.type_name(), &full)
                .ok_or_else(|| missing("Service", full))
        }
        None => objects
            .get_object(TargetType::Host.type_name(), &host)
            .ok_or_else(|| missing("Host", host)),
    }
}
