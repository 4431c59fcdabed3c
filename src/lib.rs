pub mod config;
pub mod dependency;
pub mod driver;
mod error;
mod evaluate;
pub mod item;
pub mod logging;
pub mod objects;
pub mod parse;
pub mod registry;
mod types;
pub mod workqueue;

pub use config::EngineConfig;
pub use dependency::Dependency;
pub use driver::{ApplyContext, ApplyKind, Checkable, evaluate_rule, evaluate_rules};
pub use error::ApplyError;
pub use item::{ConfigItem, ConfigItemBuilder};
pub use objects::{ObjectRegistry, TypeDescriptor};
pub use registry::{ApplyHandler, ApplyRuleRegistry};
pub use types::{
    ApplyRule, ApplyRuleBuilder, Attributes, BatchReport, Binding, CandidateFailure, CompareOp,
    ConfigObject, Expr, ExprError, FieldExpr, Location, Node, RuleReport, Scope, TargetType,
    UnknownTargetType, Value, ValueKind, always, field, never,
};
pub use workqueue::{JoinReport, TaskFailure, WorkQueue};
