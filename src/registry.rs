use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::driver::{self, ApplyContext, ApplyKind};
use crate::{ApplyError, ApplyRule, BatchReport, TargetType};

/// Evaluates a batch of rules of one kind.
pub trait ApplyHandler: Send + Sync {
    fn evaluate_rules(&self, ctx: &ApplyContext, rules: Vec<ApplyRule>) -> BatchReport;
}

impl<F> ApplyHandler for F
where
    F: Fn(&ApplyContext, Vec<ApplyRule>) -> BatchReport + Send + Sync,
{
    fn evaluate_rules(&self, ctx: &ApplyContext, rules: Vec<ApplyRule>) -> BatchReport {
        self(ctx, rules)
    }
}

struct Entry {
    targets: Vec<TargetType>,
    handler: Arc<dyn ApplyHandler>,
}

/// Kind name → accepted targets and batch handler.
///
/// Built during startup, then shared read-only by apply passes.
#[derive(Default)]
pub struct ApplyRuleRegistry {
    entries: HashMap<String, Entry>,
}

impl ApplyRuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::DuplicateKind`] if `kind` is already registered.
    pub fn register_type(
        &mut self,
        kind: &str,
        targets: &[TargetType],
        handler: impl ApplyHandler + 'static,
    ) -> Result<(), ApplyError> {
        if self.entries.contains_key(kind) {
            return Err(ApplyError::DuplicateKind {
                kind: kind.to_owned(),
            });
        }
        debug!(kind, ?targets, "registering apply kind");
        self.entries.insert(
            kind.to_owned(),
            Entry {
                targets: targets.to_vec(),
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Register a kind evaluated by the generic rule driver.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::DuplicateKind`] if the kind is already registered.
    pub fn register_kind(&mut self, kind: impl ApplyKind) -> Result<(), ApplyError> {
        let kind: Arc<dyn ApplyKind> = Arc::new(kind);
        let name = kind.type_name().to_owned();
        let targets = kind.targets().to_vec();
        self.register_type(&name, &targets, move |ctx: &ApplyContext, rules: Vec<ApplyRule>| {
            driver::evaluate_rules(Arc::clone(&kind), ctx, rules)
        })
    }

    #[must_use]
    pub fn is_registered(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    #[must_use]
    pub fn targets(&self, kind: &str) -> Option<&[TargetType]> {
        self.entries.get(kind).map(|e| e.targets.as_slice())
    }

    /// Registered kind names, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Evaluate `rules` with the handler of `kind`. Returns after every rule
    /// has finished.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::UnknownKind`] if no handler is registered.
    pub fn dispatch(
        &self,
        ctx: &ApplyContext,
        kind: &str,
        rules: Vec<ApplyRule>,
    ) -> Result<BatchReport, ApplyError> {
        let entry = self.entries.get(kind).ok_or_else(|| ApplyError::UnknownKind {
            kind: kind.to_owned(),
        })?;
        info!(kind, rules = rules.len(), "evaluating apply rules");
        Ok(entry.handler.evaluate_rules(ctx, rules))
    }

    /// Group a mixed batch by kind and dispatch each group, kinds in name
    /// order. Every kind is checked before any rule is evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::UnknownKind`] for the first unregistered kind.
    pub fn evaluate_all(
        &self,
        ctx: &ApplyContext,
        rules: Vec<ApplyRule>,
    ) -> Result<Vec<BatchReport>, ApplyError> {
        let mut by_kind: BTreeMap<String, Vec<ApplyRule>> = BTreeMap::new();
        for rule in rules {
            by_kind.entry(rule.kind().to_owned()).or_default().push(rule);
        }
        if let Some(kind) = by_kind.keys().find(|k| !self.is_registered(k)) {
            return Err(ApplyError::UnknownKind { kind: kind.clone() });
        }
        by_kind
            .into_iter()
            .map(|(kind, rules)| self.dispatch(ctx, &kind, rules))
            .collect()
    }
}

impl fmt::Debug for ApplyRuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, e)| (k, &e.targets)))
            .finish()
    }
}
