use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::error::UnknownTargetType;
use super::{Expr, Node, Scope};
use crate::ApplyError;

/// The candidate population an apply rule iterates over.
///
/// Rule files name targets as strings; they are translated to this enum
/// when rules are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetType {
    Host,
    Service,
}

impl TargetType {
    /// The object type name of the candidates, as stored in the object registry.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            TargetType::Host => "Host",
            TargetType::Service => "Service",
        }
    }
}

impl FromStr for TargetType {
    type Err = UnknownTargetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Host" => Ok(TargetType::Host),
            "Service" => Ok(TargetType::Service),
            other => Err(UnknownTargetType(other.to_owned())),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Source position of a rule, used only in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    path: Option<String>,
    line: u32,
    column: u32,
}

impl Location {
    #[must_use]
    pub fn new(path: Option<&str>, line: u32, column: u32) -> Self {
        Self {
            path: path.map(str::to_owned),
            line,
            column,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.as_deref().unwrap_or("<input>");
        write!(f, "{path}:{}:{}", self.line, self.column)
    }
}

/// A declarative generator: for every live object of `target` matching
/// `filter`, synthesize an object of type `kind` whose attributes are set by
/// `body`.
///
/// Immutable once built; see [`ApplyRule::builder`].
#[derive(Debug, Clone)]
pub struct ApplyRule {
    kind: String,
    name: String,
    target: TargetType,
    filter: Expr,
    body: Node,
    scope: Arc<Scope>,
    location: Location,
}

impl ApplyRule {
    /// Start building a rule of `kind` named `name` over `target` candidates.
    #[must_use]
    pub fn builder(kind: &str, name: &str, target: TargetType) -> ApplyRuleBuilder {
        ApplyRuleBuilder {
            kind: kind.to_owned(),
            name: name.to_owned(),
            target,
            filter: None,
            body: Vec::new(),
            scope: Arc::new(Scope::new()),
            location: Location::default(),
        }
    }

    /// Parse rule DSL text into rules, translating target tags.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Parse`] on syntax errors. Rules with unknown
    /// target tags are logged and left out.
    pub fn from_dsl(input: &str) -> Result<Vec<ApplyRule>, ApplyError> {
        crate::parse::parse(input)?.into_rules(None)
    }

    /// Read a DSL file and parse it. Rule locations carry the file path.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] on I/O or parse failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Vec<ApplyRule>, ApplyError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let display = path.display().to_string();
        crate::parse::parse(&input)?.into_rules(Some(&display))
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn target(&self) -> TargetType {
        self.target
    }

    #[must_use]
    pub fn filter(&self) -> &Expr {
        &self.filter
    }

    #[must_use]
    pub fn body(&self) -> &Node {
        &self.body
    }

    #[must_use]
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Evaluate the rule's filter against a candidate binding scope.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Filter`] when the filter references a name that
    /// is bound neither in `locals` nor in the rule's captured scope.
    pub fn evaluate_filter(&self, locals: &Scope) -> Result<bool, ApplyError> {
        self.filter
            .evaluate(locals)
            .map_err(|source| ApplyError::Filter {
                rule: self.name.clone(),
                source,
            })
    }
}

/// Builder for [`ApplyRule`]. A filter must be set with [`when`](Self::when).
#[derive(Debug)]
pub struct ApplyRuleBuilder {
    kind: String,
    name: String,
    target: TargetType,
    filter: Option<Expr>,
    body: Vec<Node>,
    scope: Arc<Scope>,
    location: Location,
}

impl ApplyRuleBuilder {
    /// Set the filter expression.
    #[must_use]
    pub fn when(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a literal attribute assignment to the body.
    #[must_use]
    pub fn assign(mut self, attribute: &str, value: impl Into<crate::Value>) -> Self {
        self.body.push(Node::assign(attribute, value));
        self
    }

    /// Append an arbitrary node to the body.
    #[must_use]
    pub fn body(mut self, node: Node) -> Self {
        self.body.push(node);
        self
    }

    /// Set the lexical scope the rule closes over.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<Arc<Scope>>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Finish the rule.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::MissingFilter`] if [`when`](Self::when) was never called.
    pub fn build(self) -> Result<ApplyRule, ApplyError> {
        let filter = self.filter.ok_or_else(|| ApplyError::MissingFilter {
            rule: self.name.clone(),
        })?;
        Ok(ApplyRule {
            kind: self.kind,
            name: self.name,
            target: self.target,
            filter,
            body: Node::Sequence(self.body),
            scope: self.scope,
            location: self.location,
        })
    }
}
