use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::item::ConfigItem;
use crate::types::ExprError;
use crate::{ApplyError, Attributes, ConfigObject, ValueKind};

/// Callback run once per object after a successful commit.
pub type LoadHook = Arc<dyn Fn(&ObjectRegistry, &ConfigObject) -> Result<(), ApplyError> + Send + Sync>;

/// Attribute schema and post-load hook of one object type.
///
/// A descriptor with declared fields rejects attributes it does not know and
/// values of the wrong kind at commit time.
#[derive(Clone, Default)]
pub struct TypeDescriptor {
    name: String,
    fields: BTreeMap<String, ValueKind>,
    on_loaded: Option<LoadHook>,
}

impl TypeDescriptor {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Declare an attribute and its kind.
    #[must_use]
    pub fn field(mut self, name: &str, kind: ValueKind) -> Self {
        self.fields.insert(name.to_owned(), kind);
        self
    }

    /// Install the post-load hook.
    #[must_use]
    pub fn on_loaded(
        mut self,
        hook: impl Fn(&ObjectRegistry, &ConfigObject) -> Result<(), ApplyError> + Send + Sync + 'static,
    ) -> Self {
        self.on_loaded = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check committed attributes against the declared schema.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UnknownAttribute`] or [`ExprError::TypeMismatch`].
    pub fn validate(&self, attributes: &Attributes) -> Result<(), ExprError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        for (attribute, value) in attributes {
            let expected = self
                .fields
                .get(attribute)
                .ok_or_else(|| ExprError::UnknownAttribute {
                    type_name: self.name.clone(),
                    attribute: attribute.clone(),
                })?;
            if !expected.accepts(value.kind()) {
                return Err(ExprError::TypeMismatch {
                    attribute: attribute.clone(),
                    expected: *expected,
                    found: value.kind(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("on_loaded", &self.on_loaded.is_some())
            .finish()
    }
}

/// Per-type storage: registered definitions and live objects.
#[derive(Debug, Default)]
struct TypeStore {
    items: RwLock<HashMap<String, Arc<ConfigItem>>>,
    objects: RwLock<HashMap<String, Arc<ConfigObject>>>,
}

/// The shared object graph that apply rules read candidates from and
/// commit synthesized objects into.
///
/// Registration is an atomic check-and-insert per type, so two racing
/// registrations of the same type and name cannot both succeed. Commit and
/// post-load hooks take no registry-wide lock.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    types: RwLock<HashMap<String, Arc<TypeStore>>>,
    descriptors: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
}

impl ObjectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the descriptor of a type.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    /// The installed descriptor, shared rather than copied.
    #[must_use]
    pub fn descriptor(&self, type_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.descriptors.read().get(type_name).cloned()
    }

    fn store(&self, type_name: &str) -> Arc<TypeStore> {
        if let Some(store) = self.types.read().get(type_name) {
            return Arc::clone(store);
        }
        let mut types = self.types.write();
        Arc::clone(types.entry(type_name.to_owned()).or_default())
    }

    fn existing_store(&self, type_name: &str) -> Option<Arc<TypeStore>> {
        self.types.read().get(type_name).cloned()
    }

    /// Make a pending definition discoverable.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::DuplicateObject`] if a definition with the same
    /// type and name is already registered.
    pub(crate) fn register_item(&self, item: ConfigItem) -> Result<Arc<ConfigItem>, ApplyError> {
        let store = self.store(item.type_name());
        let mut items = store.items.write();
        match items.entry(item.name().to_owned()) {
            Entry::Occupied(_) => Err(ApplyError::DuplicateObject {
                type_name: item.type_name().to_owned(),
                name: item.name().to_owned(),
            }),
            Entry::Vacant(slot) => {
                let item = Arc::new(item);
                slot.insert(Arc::clone(&item));
                Ok(item)
            }
        }
    }

    /// Add a live object directly, bypassing the definition pipeline. Used to
    /// seed candidate populations such as hosts and services.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::DuplicateObject`] if an object with the same type
    /// and name is already live.
    pub fn add_object(&self, object: ConfigObject) -> Result<Arc<ConfigObject>, ApplyError> {
        let store = self.store(object.type_name());
        let mut objects = store.objects.write();
        match objects.entry(object.name().to_owned()) {
            Entry::Occupied(_) => Err(ApplyError::DuplicateObject {
                type_name: object.type_name().to_owned(),
                name: object.name().to_owned(),
            }),
            Entry::Vacant(slot) => {
                let object = Arc::new(object);
                slot.insert(Arc::clone(&object));
                Ok(object)
            }
        }
    }

    #[must_use]
    pub fn get_item(&self, type_name: &str, name: &str) -> Option<Arc<ConfigItem>> {
        self.existing_store(type_name)?.items.read().get(name).cloned()
    }

    #[must_use]
    pub fn get_object(&self, type_name: &str, name: &str) -> Option<Arc<ConfigObject>> {
        self.existing_store(type_name)?
            .objects
            .read()
            .get(name)
            .cloned()
    }

    /// Snapshot of every live object of a type, in no particular order.
    #[must_use]
    pub fn objects(&self, type_name: &str) -> Vec<Arc<ConfigObject>> {
        self.existing_store(type_name)
            .map(|store| store.objects.read().values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn object_count(&self, type_name: &str) -> usize {
        self.existing_store(type_name)
            .map_or(0, |store| store.objects.read().len())
    }

    #[must_use]
    pub fn item_count(&self, type_name: &str) -> usize {
        self.existing_store(type_name)
            .map_or(0, |store| store.items.read().len())
    }

    /// Run the type's post-load hook for `object`. The hook runs at most once
    /// per object; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Hook`] wrapping whatever the hook reported. The
    /// object stays registered and live.
    pub fn on_config_loaded(&self, object: &ConfigObject) -> Result<(), ApplyError> {
        if !object.mark_loaded() {
            return Ok(());
        }
        let hook = self
            .descriptors
            .read()
            .get(object.type_name())
            .and_then(|d| d.on_loaded.clone());
        let Some(hook) = hook else {
            return Ok(());
        };
        debug!(type_name = object.type_name(), name = object.name(), "running post-load hook");
        hook(self, object).map_err(|source| ApplyError::Hook {
            type_name: object.type_name().to_owned(),
            name: object.name().to_owned(),
            source: Box::new(source),
        })
    }
}
