use std::hint::black_box;
use std::sync::Arc;

use applyrule::{
    ApplyContext, ApplyRule, ApplyRuleRegistry, ConfigObject, Dependency, EngineConfig,
    ObjectRegistry, Scope, TargetType, field,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

/// `hosts` hosts with three services each; every fourth host is in zone "eu".
fn population(hosts: usize) -> ObjectRegistry {
    let objects = ObjectRegistry::new();
    for i in 0..hosts {
        let mut host = ConfigObject::host(&format!("h{i}"));
        if i % 4 == 0 {
            host = host.zone("eu");
        }
        let host = objects.add_object(host).unwrap();
        for svc in ["http", "ssh", "db"] {
            objects.add_object(ConfigObject::service(&host, svc)).unwrap();
        }
    }
    objects
}

fn rules(n: usize) -> Vec<ApplyRule> {
    (0..n)
        .map(|i| {
            ApplyRule::builder(Dependency::TYPE_NAME, &format!("r{i}"), TargetType::Service)
                .when(field("host.zone").eq("eu").and(field("service.name").eq("http")))
                .assign("disable_notifications", true)
                .build()
                .unwrap()
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let objects = population(1);
    let service = objects.objects("Service").into_iter().next().unwrap();
    let host = Arc::clone(service.parent().unwrap());
    let mut scope = Scope::new();
    scope.bind("host", host);
    scope.bind("service", service);
    let rule = rules(1).remove(0);

    c.bench_function("filter_single_candidate", |b| {
        b.iter(|| rule.evaluate_filter(black_box(&scope)));
    });
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_batch");
    group.sample_size(20);

    for &workers in &[1_usize, 4] {
        for &hosts in &[100_usize, 1000] {
            group.bench_with_input(
                BenchmarkId::new(format!("{workers}_workers"), hosts),
                &hosts,
                |b, &hosts| {
                    b.iter_with_setup(
                        || {
                            let objects = population(hosts);
                            let mut registry = ApplyRuleRegistry::new();
                            Dependency::register(&mut registry, &objects).unwrap();
                            let ctx = ApplyContext::new(
                                Arc::new(objects),
                                EngineConfig::new().with_workers(workers),
                            );
                            (registry, ctx)
                        },
                        |(registry, ctx)| {
                            registry
                                .dispatch(&ctx, Dependency::TYPE_NAME, rules(16))
                                .unwrap()
                        },
                    );
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_filter, bench_batch);
criterion_main!(benches);
