mod error;
mod expr;
mod node;
mod object;
mod report;
mod rule;
mod scope;
mod value;

pub use error::{ExprError, UnknownTargetType};
pub use expr::{CompareOp, Expr, FieldExpr, always, field, never};
pub use node::Node;
pub use object::{Attributes, ConfigObject};
pub use report::{BatchReport, CandidateFailure, RuleReport};
pub use rule::{ApplyRule, ApplyRuleBuilder, Location, TargetType};
pub use scope::{Binding, Scope};
pub use value::{Value, ValueKind};
