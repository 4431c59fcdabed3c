use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use super::Value;

/// Attribute map of a live object, ordered by attribute name.
pub type Attributes = BTreeMap<String, Value>;

/// A live runtime object: identity (type + name), an optional parent, and
/// dynamically typed attributes.
///
/// Objects are shared behind `Arc` and referenced from other objects by name
/// only. Attributes and relation links use interior locks so hooks running
/// on different threads can wire objects together.
#[derive(Debug)]
pub struct ConfigObject {
    type_name: String,
    name: String,
    short_name: String,
    parent: Option<Arc<ConfigObject>>,
    attributes: RwLock<Attributes>,
    links: Mutex<BTreeMap<String, BTreeSet<String>>>,
    loaded: AtomicBool,
}

impl ConfigObject {
    /// Create an object whose short name equals its full name.
    #[must_use]
    pub fn new(type_name: &str, name: &str) -> Self {
        Self::with_attributes(type_name, name, Attributes::new())
    }

    /// Create a `Host` object.
    #[must_use]
    pub fn host(name: &str) -> Self {
        Self::new("Host", name)
    }

    /// Create a `Service` object owned by `host`. The full name is
    /// `host!short_name` and the `host_name` attribute is set.
    #[must_use]
    pub fn service(host: &Arc<ConfigObject>, short_name: &str) -> Self {
        let mut object = Self::new("Service", &format!("{}!{short_name}", host.name()));
        object.short_name = short_name.to_owned();
        object.parent = Some(Arc::clone(host));
        object
            .attributes
            .get_mut()
            .insert("host_name".to_owned(), Value::from(host.name()));
        object
    }

    pub(crate) fn with_attributes(type_name: &str, name: &str, attributes: Attributes) -> Self {
        Self {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
            short_name: name.to_owned(),
            parent: None,
            attributes: RwLock::new(attributes),
            links: Mutex::new(BTreeMap::new()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Set an attribute while constructing the object.
    #[must_use]
    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes
            .get_mut()
            .insert(name.to_owned(), value.into());
        self
    }

    /// Set the zone tag while constructing the object. An empty zone is the
    /// same as no zone.
    #[must_use]
    pub fn zone(self, zone: &str) -> Self {
        self.attribute("zone", zone)
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<ConfigObject>> {
        self.parent.as_ref()
    }

    /// The zone tag, or an empty string when the object has none.
    #[must_use]
    pub fn zone_name(&self) -> String {
        self.attributes
            .read()
            .get("zone")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default()
    }

    /// Look up an attribute as seen by filter expressions.
    ///
    /// `name` is the short name, `__name` the full name and `type` the type
    /// name; everything else comes from the stored attributes.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "name" => Some(Value::from(self.short_name.as_str())),
            "__name" => Some(Value::from(self.name.as_str())),
            "type" => Some(Value::from(self.type_name.as_str())),
            _ => self.attributes.read().get(attribute).cloned(),
        }
    }

    /// Snapshot of the stored attributes.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.attributes.read().clone()
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) {
        self.attributes.write().insert(name.to_owned(), value.into());
    }

    /// Record a by-name relation to another object, e.g. `dependencies`.
    pub fn link(&self, relation: &str, name: &str) {
        self.links
            .lock()
            .entry(relation.to_owned())
            .or_default()
            .insert(name.to_owned());
    }

    /// Names linked under `relation`, sorted.
    #[must_use]
    pub fn links(&self, relation: &str) -> Vec<String> {
        self.links
            .lock()
            .get(relation)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Flip the loaded flag. Returns `true` only for the first caller.
    pub(crate) fn mark_loaded(&self) -> bool {
        !self.loaded.swap(true, Ordering::AcqRel)
    }
}
