use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, debug_span, error, warn};

use crate::config::EngineConfig;
use crate::item::ConfigItemBuilder;
use crate::objects::ObjectRegistry;
use crate::workqueue::{TaskFailure, WorkQueue};
use crate::{
    ApplyError, ApplyRule, BatchReport, ConfigObject, Node, RuleReport, Scope, TargetType, Value,
};

/// Everything an apply pass reads from or writes into.
#[derive(Debug, Clone)]
pub struct ApplyContext {
    objects: Arc<ObjectRegistry>,
    config: EngineConfig,
}

impl ApplyContext {
    #[must_use]
    pub fn new(objects: Arc<ObjectRegistry>, config: EngineConfig) -> Self {
        Self { objects, config }
    }

    #[must_use]
    pub fn objects(&self) -> &Arc<ObjectRegistry> {
        &self.objects
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// An object kind that can be generated by apply rules.
///
/// The driver owns iteration, filtering and the object lifecycle; a kind only
/// says which targets it accepts, how generated objects are named, and which
/// attributes are derived from the candidate before the rule body runs.
pub trait ApplyKind: Send + Sync + 'static {
    /// Type name of the generated objects, also the kind name rules use.
    fn type_name(&self) -> &str;

    fn targets(&self) -> &[TargetType];

    /// Name of the object generated by `rule` for `checkable`. Must differ
    /// between candidates so one rule can match many of them.
    fn object_name(&self, rule: &ApplyRule, checkable: &Checkable) -> String;

    /// Attributes assigned before the rule body, in order.
    fn derived_attributes(&self, checkable: &Checkable) -> Vec<(String, Value)>;
}

/// A candidate as seen by a rule: a host, or a service together with the
/// host that owns it.
#[derive(Debug, Clone)]
pub struct Checkable {
    host: Arc<ConfigObject>,
    service: Option<Arc<ConfigObject>>,
}

impl Checkable {
    /// Resolve a live candidate of `target` type.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::OrphanService`] for a service without a host.
    pub fn from_candidate(target: TargetType, candidate: &Arc<ConfigObject>) -> Result<Self, ApplyError> {
        match target {
            TargetType::Host => Ok(Self {
                host: Arc::clone(candidate),
                service: None,
            }),
            TargetType::Service => {
                let host = candidate.parent().ok_or_else(|| ApplyError::OrphanService {
                    service: candidate.name().to_owned(),
                })?;
                Ok(Self {
                    host: Arc::clone(host),
                    service: Some(Arc::clone(candidate)),
                })
            }
        }
    }

    #[must_use]
    pub fn host(&self) -> &Arc<ConfigObject> {
        &self.host
    }

    #[must_use]
    pub fn service(&self) -> Option<&Arc<ConfigObject>> {
        self.service.as_ref()
    }

    /// The candidate itself: the service if there is one, else the host.
    #[must_use]
    pub fn object(&self) -> &Arc<ConfigObject> {
        self.service.as_ref().unwrap_or(&self.host)
    }

    #[must_use]
    pub fn zone(&self) -> String {
        self.object().zone_name()
    }

    /// Fresh binding scope for this candidate over the rule's scope. `service`
    /// is bound only for service candidates.
    #[must_use]
    pub fn locals(&self, parent: Arc<Scope>) -> Scope {
        let mut locals = Scope::child(parent);
        locals.bind("host", Arc::clone(&self.host));
        if let Some(service) = &self.service {
            locals.bind("service", Arc::clone(service));
        }
        locals
    }
}

/// Evaluate one rule against the live population of its target type.
///
/// Candidate-level failures are logged and recorded in the report; they do
/// not stop the remaining candidates.
///
/// # Errors
///
/// Returns programming errors (see [`ApplyError::is_programming_error`]),
/// which abort the rule.
pub fn evaluate_rule(
    kind: &dyn ApplyKind,
    objects: &ObjectRegistry,
    rule: &ApplyRule,
) -> Result<RuleReport, ApplyError> {
    let span = debug_span!("apply_rule", kind = kind.type_name(), rule = rule.name(), location = %rule.location());
    let _guard = span.enter();
    let started = Instant::now();
    let mut report = RuleReport::new(rule.name(), rule.target(), rule.location().clone());

    if !kind.targets().contains(&rule.target()) {
        let err = ApplyError::UnsupportedTarget {
            rule: rule.name().to_owned(),
            target: rule.target().to_string(),
        };
        warn!(location = %rule.location(), "{err}");
        report.mark_unsupported();
        report.set_duration(started.elapsed());
        return Ok(report);
    }

    let mut candidates = objects.objects(rule.target().type_name());
    candidates.sort_by(|a, b| a.name().cmp(b.name()));

    for candidate in &candidates {
        match apply_candidate(kind, objects, rule, candidate, &mut report) {
            Ok(()) => {}
            Err(err) if err.is_programming_error() => return Err(err),
            Err(err) => {
                error!(
                    location = %rule.location(),
                    candidate = candidate.name(),
                    error = %err,
                    "failed to apply rule to candidate"
                );
                report.record_failure(candidate.name(), err);
            }
        }
    }

    if report.match_count() == 0 {
        warn!(
            location = %rule.location(),
            "apply rule '{}' for type '{}' does not match anywhere",
            rule.name(),
            rule.target()
        );
    }

    report.set_duration(started.elapsed());
    Ok(report)
}

fn apply_candidate(
    kind: &dyn ApplyKind,
    objects: &ObjectRegistry,
    rule: &ApplyRule,
    candidate: &Arc<ConfigObject>,
    report: &mut RuleReport,
) -> Result<(), ApplyError> {
    let checkable = Checkable::from_candidate(rule.target(), candidate)?;
    let locals = checkable.locals(Arc::clone(rule.scope()));
    if !rule.evaluate_filter(&locals)? {
        return Ok(());
    }
    report.record_match(candidate.name());

    let object = synthesize(kind, objects, rule, &checkable, locals)?;
    debug!(candidate = candidate.name(), object = object.name(), "applied rule");
    report.record_created(object.name());
    Ok(())
}

fn synthesize(
    kind: &dyn ApplyKind,
    objects: &ObjectRegistry,
    rule: &ApplyRule,
    checkable: &Checkable,
    locals: Scope,
) -> Result<Arc<ConfigObject>, ApplyError> {
    let mut builder = ConfigItemBuilder::new(rule.location().clone());
    builder
        .set_type(kind.type_name())
        .set_name(&kind.object_name(rule, checkable))
        .set_scope(Arc::new(locals));

    for (attribute, value) in kind.derived_attributes(checkable) {
        builder.add_expression(Node::assign(&attribute, value));
    }
    let zone = checkable.zone();
    if !zone.is_empty() {
        builder.add_expression(Node::assign("zone", zone));
    }
    builder.add_expression(rule.body().clone());

    builder.compile()?.materialize(objects)
}

/// Evaluate a batch of rules of one kind, one worker task per rule, and wait
/// for all of them.
pub fn evaluate_rules(kind: Arc<dyn ApplyKind>, ctx: &ApplyContext, rules: Vec<ApplyRule>) -> BatchReport {
    let type_name = kind.type_name().to_owned();
    let rule_count = rules.len();

    let (reports, task_failures) = match WorkQueue::new(ctx.config().workers()) {
        Ok(queue) => run_queued(&queue, &kind, ctx, rules),
        Err(err) => {
            warn!(error = %err, "could not start apply workers, evaluating sequentially");
            run_inline(kind.as_ref(), ctx, rules)
        }
    };

    let batch = BatchReport::new(&type_name, reports, task_failures);
    for ((target, candidate), rules) in batch.overlapping_candidates() {
        debug!(%target, candidate, ?rules, "candidate matched by several rules");
    }
    debug!(kind = %type_name, rules = rule_count, created = batch.created_count(), "apply batch finished");
    batch
}

fn run_queued(
    queue: &WorkQueue,
    kind: &Arc<dyn ApplyKind>,
    ctx: &ApplyContext,
    rules: Vec<ApplyRule>,
) -> (Vec<RuleReport>, Vec<TaskFailure>) {
    let reports = Arc::new(Mutex::new(Vec::with_capacity(rules.len())));

    for rule in rules {
        let kind = Arc::clone(kind);
        let objects = Arc::clone(ctx.objects());
        let reports = Arc::clone(&reports);
        let label = format!("{}:{}", kind.type_name(), rule.name());
        queue.enqueue(label, move || {
            let report = evaluate_rule(kind.as_ref(), &objects, &rule)?;
            reports.lock().push(report);
            Ok(())
        });
    }

    let joined = queue.join();
    let reports = std::mem::take(&mut *reports.lock());
    (reports, joined.failures)
}

fn run_inline(kind: &dyn ApplyKind, ctx: &ApplyContext, rules: Vec<ApplyRule>) -> (Vec<RuleReport>, Vec<TaskFailure>) {
    let mut reports = Vec::with_capacity(rules.len());
    let mut failures = Vec::new();
    for rule in rules {
        match evaluate_rule(kind, ctx.objects(), &rule) {
            Ok(report) => reports.push(report),
            Err(error) => {
                let label = format!("{}:{}", kind.type_name(), rule.name());
                error!(task = %label, %error, "apply task failed");
                failures.push(TaskFailure { label, error });
            }
        }
    }
    (reports, failures)
}
