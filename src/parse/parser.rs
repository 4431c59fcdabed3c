use std::sync::Arc;

use tracing::warn;

use crate::types::Binding;
use crate::{ApplyError, ApplyRule, Expr, Location, Node, Scope, TargetType, Value};

/// Names bound per candidate; a `var` may not shadow them.
const CANDIDATE_BINDINGS: &[&str] = &["host", "service"];

/// One top-level item of a rule file.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedItem {
    /// `var name = literal`: visible to every rule that follows.
    Var { name: String, value: Value },
    Rule(ParsedRule),
}

/// An `apply` block before its target tag is translated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    pub kind: String,
    pub name: String,
    pub target: String,
    pub assign: Vec<Expr>,
    pub ignore: Vec<Expr>,
    pub body: Vec<Node>,
    pub line: u32,
    pub column: u32,
    /// Input length left when the rule started; converted to line/column.
    pub(crate) remaining: usize,
}

/// The result of parsing a DSL input string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRules {
    pub items: Vec<ParsedItem>,
}

impl ParsedRules {
    /// Rules only, in source order.
    pub fn rules(&self) -> impl Iterator<Item = &ParsedRule> {
        self.items.iter().filter_map(|item| match item {
            ParsedItem::Rule(rule) => Some(rule),
            ParsedItem::Var { .. } => None,
        })
    }

    /// Build [`ApplyRule`]s. Each rule captures the `var` bindings declared
    /// before it; its filter is the OR of its `assign where` clauses, minus
    /// the OR of its `ignore where` clauses.
    ///
    /// A rule with an unknown target tag is logged and skipped; the rules
    /// around it are still built.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::ReservedVariable`] for a `var` named after a
    /// candidate binding and [`ApplyError::MissingFilter`] for a rule without
    /// `assign where`.
    pub fn into_rules(self, path: Option<&str>) -> Result<Vec<ApplyRule>, ApplyError> {
        let mut scope = Arc::new(Scope::new());
        let mut rules = Vec::new();

        for item in self.items {
            match item {
                ParsedItem::Var { name, value } => {
                    if CANDIDATE_BINDINGS.contains(&name.as_str()) {
                        return Err(ApplyError::ReservedVariable { name });
                    }
                    Arc::make_mut(&mut scope).insert(&name, Binding::Value(value));
                }
                ParsedItem::Rule(rule) => {
                    let location = Location::new(path, rule.line, rule.column);
                    let Ok(target) = rule.target.parse::<TargetType>() else {
                        let err = ApplyError::UnsupportedTarget {
                            rule: rule.name,
                            target: rule.target,
                        };
                        warn!(location = %location, "{err}");
                        continue;
                    };

                    let mut builder = ApplyRule::builder(&rule.kind, &rule.name, target)
                        .scope(Arc::clone(&scope))
                        .location(location);
                    if let Some(assign) = Expr::any(rule.assign) {
                        let filter = match Expr::any(rule.ignore) {
                            Some(ignore) => assign.and(!ignore),
                            None => assign,
                        };
                        builder = builder.when(filter);
                    }
                    for node in rule.body {
                        builder = builder.body(node);
                    }
                    rules.push(builder.build()?);
                }
            }
        }
        Ok(rules)
    }
}
