use applyrule::{ConfigObject, Expr, ObjectRegistry, field};
use proptest::prelude::*;

// --- Fixed host schema ---
// host.zone    : optional string, one of {"eu", "us", "ap"}
// host.cores   : i64 (1..=64)
// host.virtual : bool

const ZONES: &[&str] = &["eu", "us", "ap"];

#[derive(Debug, Clone)]
pub struct GenHost {
    pub name: String,
    pub zone: Option<&'static str>,
    pub cores: i64,
    pub is_virtual: bool,
}

/// A generated population of uniquely named hosts.
pub fn arb_hosts() -> impl Strategy<Value = Vec<GenHost>> {
    prop::collection::vec(
        (
            prop::option::of(prop::sample::select(ZONES)),
            1_i64..=64,
            any::<bool>(),
        ),
        0..16,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (zone, cores, is_virtual))| GenHost {
                name: format!("h{i}"),
                zone,
                cores,
                is_virtual,
            })
            .collect()
    })
}

/// Seed an object registry with the generated hosts.
pub fn populate(hosts: &[GenHost]) -> ObjectRegistry {
    let objects = ObjectRegistry::new();
    for h in hosts {
        let mut host = ConfigObject::host(&h.name)
            .attribute("cores", h.cores)
            .attribute("virtual", h.is_virtual);
        if let Some(zone) = h.zone {
            host = host.zone(zone);
        }
        objects.add_object(host).unwrap();
    }
    objects
}

/// Filter over the host schema with an independent reference evaluator.
#[derive(Debug, Clone)]
pub enum GenFilter {
    ZoneIs(&'static str),
    CoresAtLeast(i64),
    Virtual,
    And(Box<GenFilter>, Box<GenFilter>),
    Or(Box<GenFilter>, Box<GenFilter>),
    Not(Box<GenFilter>),
}

impl GenFilter {
    pub fn to_expr(&self) -> Expr {
        match self {
            GenFilter::ZoneIs(z) => field("host.zone").eq(*z),
            GenFilter::CoresAtLeast(n) => field("host.cores").gte(*n),
            GenFilter::Virtual => field("host.virtual").eq(true),
            GenFilter::And(a, b) => a.to_expr().and(b.to_expr()),
            GenFilter::Or(a, b) => a.to_expr().or(b.to_expr()),
            GenFilter::Not(inner) => !inner.to_expr(),
        }
    }

    pub fn holds(&self, host: &GenHost) -> bool {
        match self {
            GenFilter::ZoneIs(z) => host.zone == Some(*z),
            GenFilter::CoresAtLeast(n) => host.cores >= *n,
            GenFilter::Virtual => host.is_virtual,
            GenFilter::And(a, b) => a.holds(host) && b.holds(host),
            GenFilter::Or(a, b) => a.holds(host) || b.holds(host),
            GenFilter::Not(inner) => !inner.holds(host),
        }
    }
}

pub fn arb_filter() -> impl Strategy<Value = GenFilter> {
    let leaf = prop_oneof![
        prop::sample::select(ZONES).prop_map(GenFilter::ZoneIs),
        (1_i64..=64).prop_map(GenFilter::CoresAtLeast),
        Just(GenFilter::Virtual),
    ];
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| GenFilter::And(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| GenFilter::Or(Box::new(a), Box::new(b))),
            inner.prop_map(|e| GenFilter::Not(Box::new(e))),
        ]
    })
}
