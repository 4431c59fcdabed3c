use std::fmt;
use std::sync::Arc;

use applyrule::{
    ApplyKind, ApplyRule, Checkable, ConfigObject, Dependency, ObjectRegistry, TargetType, Value,
    evaluate_rule, never,
};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const NO_MATCH: &str = "does not match anywhere";

/// Collects the messages of WARN events.
#[derive(Clone, Default)]
struct Warnings(Arc<Mutex<Vec<String>>>);

impl Warnings {
    fn matching(&self, needle: &str) -> usize {
        self.0.lock().iter().filter(|m| m.contains(needle)).count()
    }
}

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Warnings {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut message = Message(String::new());
            event.record(&mut message);
            self.0.lock().push(message.0);
        }
    }
}

/// Run `f` with a subscriber that records warnings on this thread.
fn capture<T>(f: impl FnOnce() -> T) -> (T, Warnings) {
    let warnings = Warnings::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, warnings)
}

fn hosts(n: usize) -> ObjectRegistry {
    let objects = ObjectRegistry::new();
    objects.register_type(Dependency::descriptor());
    for i in 0..n {
        objects.add_object(ConfigObject::host(&format!("h{i}"))).unwrap();
    }
    objects
}

struct HostNote;

impl ApplyKind for HostNote {
    fn type_name(&self) -> &str {
        "HostNote"
    }

    fn targets(&self) -> &[TargetType] {
        &[TargetType::Host]
    }

    fn object_name(&self, rule: &ApplyRule, checkable: &Checkable) -> String {
        format!("{}!{}", checkable.host().name(), rule.name())
    }

    fn derived_attributes(&self, _: &Checkable) -> Vec<(String, Value)> {
        Vec::new()
    }
}

#[test]
fn zero_match_warns_exactly_once() {
    let objects = hosts(5);
    let rule = ApplyRule::builder(Dependency::TYPE_NAME, "nothing", TargetType::Host)
        .when(never())
        .build()
        .unwrap();

    let (report, warnings) = capture(|| evaluate_rule(&Dependency, &objects, &rule).unwrap());

    assert!(report.is_unmatched());
    assert_eq!(warnings.matching(NO_MATCH), 1);
    assert_eq!(warnings.matching("'nothing'"), 1);
}

#[test]
fn matching_rule_does_not_warn() {
    let objects = hosts(3);
    let rule = ApplyRule::builder(Dependency::TYPE_NAME, "all", TargetType::Host)
        .when(applyrule::always())
        .build()
        .unwrap();

    let (report, warnings) = capture(|| evaluate_rule(&Dependency, &objects, &rule).unwrap());

    assert_eq!(report.match_count(), 3);
    assert_eq!(warnings.matching(NO_MATCH), 0);
}

#[test]
fn unsupported_target_warns_without_zero_match() {
    let objects = hosts(2);
    let rule = ApplyRule::builder("HostNote", "svc", TargetType::Service)
        .when(applyrule::always())
        .build()
        .unwrap();

    let (report, warnings) = capture(|| evaluate_rule(&HostNote, &objects, &rule).unwrap());

    assert!(report.is_unsupported());
    assert_eq!(warnings.matching("unsupported target type 'Service'"), 1);
    assert_eq!(warnings.matching(NO_MATCH), 0);
}

#[test]
fn unknown_dsl_target_is_logged() {
    let (rules, warnings) = capture(|| {
        ApplyRule::from_dsl(
            r#"apply Dependency "bad" to User { assign where true }
apply Dependency "ok" to Host { assign where true }"#,
        )
        .unwrap()
    });

    assert_eq!(rules.len(), 1);
    assert_eq!(warnings.matching("unsupported target type 'User'"), 1);
}
