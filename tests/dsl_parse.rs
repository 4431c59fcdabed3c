use std::sync::Arc;

use applyrule::parse::parse_filter;
use applyrule::{
    ApplyContext, ApplyError, ApplyRule, ApplyRuleRegistry, ConfigObject, Dependency, EngineConfig,
    ObjectRegistry, Scope, TargetType, Value,
};

const DEPS: &str = r#"
# Web services depend on the database host in their zone.
var db_host = "db1"

apply Dependency "web-needs-db" to Service {
    parent_host_name = db_host
    disable_notifications = true
    assign where service.name == "http" && host.zone == "eu"
    ignore where host.name == "lab"
}

// Hosts flagged virtual depend on their hypervisor.
var db_host = "hv1"

apply Dependency "virtual-on-hv" to Host {
    parent_host_name = db_host
    assign where host.virtual
}
"#;

fn population() -> ObjectRegistry {
    let objects = ObjectRegistry::new();
    objects.add_object(ConfigObject::host("db1")).unwrap();
    objects.add_object(ConfigObject::host("hv1")).unwrap();
    for (name, zone, virt) in [("web1", "eu", true), ("web2", "us", false), ("lab", "eu", true)] {
        let host = objects
            .add_object(ConfigObject::host(name).zone(zone).attribute("virtual", virt))
            .unwrap();
        objects.add_object(ConfigObject::service(&host, "http")).unwrap();
        objects.add_object(ConfigObject::service(&host, "ssh")).unwrap();
    }
    objects
}

#[test]
fn dsl_parse_and_apply() {
    let rules = ApplyRule::from_dsl(DEPS).unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].target(), TargetType::Service);
    assert_eq!(rules[1].target(), TargetType::Host);

    let objects = population();
    let mut registry = ApplyRuleRegistry::new();
    Dependency::register(&mut registry, &objects).unwrap();
    let ctx = ApplyContext::new(Arc::new(objects), EngineConfig::new().with_workers(2));

    let batch = registry.dispatch(&ctx, "Dependency", rules).unwrap();
    assert_eq!(batch.failure_count(), 0);

    let web = batch.rule("web-needs-db").unwrap();
    assert_eq!(web.matched(), ["web1!http".to_owned()]);
    let dep = ctx
        .objects()
        .get_object("Dependency", "web1!http!web-needs-db")
        .unwrap();
    assert_eq!(dep.get("parent_host_name"), Some(Value::from("db1")));
    assert_eq!(dep.get("disable_notifications"), Some(Value::Bool(true)));

    // The second rule sees the later `var` value.
    let virt = batch.rule("virtual-on-hv").unwrap();
    assert_eq!(virt.matched(), ["lab".to_owned(), "web1".to_owned()]);
    let dep = ctx.objects().get_object("Dependency", "lab!virtual-on-hv").unwrap();
    assert_eq!(dep.get("parent_host_name"), Some(Value::from("hv1")));
}

#[test]
fn dsl_locations_point_at_apply_keyword() {
    let rules = ApplyRule::from_dsl(DEPS).unwrap();
    assert_eq!(rules[0].location().to_string(), "<input>:5:1");
    assert_eq!(rules[1].location().to_string(), "<input>:15:1");
}

#[test]
fn dsl_from_file_records_path() {
    let path = std::env::temp_dir().join(format!("applyrule-dsl-{}.conf", std::process::id()));
    std::fs::write(&path, DEPS).unwrap();
    let rules = ApplyRule::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].location().path(), Some(path.display().to_string().as_str()));
}

#[test]
fn dsl_missing_file_is_io_error() {
    let err = ApplyRule::from_file("/nonexistent/applyrule/deps.conf").unwrap_err();
    assert!(matches!(err, ApplyError::Io(_)));
}

#[test]
fn dsl_syntax_error() {
    let err = ApplyRule::from_dsl(r#"apply Dependency "d" to Host { zone = }"#).unwrap_err();
    assert!(matches!(err, ApplyError::Parse(_)));
    assert!(err.to_string().starts_with("parse error:"));
}

#[test]
fn dsl_unknown_target_keeps_siblings() {
    let rules = ApplyRule::from_dsl(
        r#"
apply Dependency "hosts" to Host { assign where true }
apply Dependency "d" to Endpoint { assign where true }
apply Dependency "services" to Service { assign where true }
"#,
    )
    .unwrap();

    let names: Vec<&str> = rules.iter().map(ApplyRule::name).collect();
    assert_eq!(names, ["hosts", "services"]);

    let objects = ObjectRegistry::new();
    let host = objects.add_object(ConfigObject::host("h")).unwrap();
    objects.add_object(ConfigObject::service(&host, "http")).unwrap();
    let mut registry = ApplyRuleRegistry::new();
    Dependency::register(&mut registry, &objects).unwrap();
    let ctx = ApplyContext::new(Arc::new(objects), EngineConfig::new().with_workers(2));

    let batch = registry.dispatch(&ctx, Dependency::TYPE_NAME, rules).unwrap();
    assert_eq!(batch.created_count(), 2);
}

#[test]
fn dsl_filter_round_trip() {
    let filter = parse_filter(r#"host.zone == "eu" AND NOT (host.cores < 4 OR host.virtual)"#).unwrap();

    let mut scope = Scope::new();
    scope.bind(
        "host",
        Arc::new(
            ConfigObject::host("h")
                .zone("eu")
                .attribute("cores", 8_i64)
                .attribute("virtual", false),
        ),
    );
    assert_eq!(filter.evaluate(&scope), Ok(true));

    // Display output parses back to the same tree.
    let reparsed = parse_filter(&filter.to_string()).unwrap();
    assert_eq!(reparsed, filter);
}

#[test]
fn dsl_empty_input() {
    assert!(ApplyRule::from_dsl("").unwrap().is_empty());
    assert!(ApplyRule::from_dsl("  # nothing\n").unwrap().is_empty());
}
