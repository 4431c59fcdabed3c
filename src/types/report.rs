use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::{Location, TargetType};
use crate::ApplyError;
use crate::workqueue::TaskFailure;

/// A candidate whose synthesis (or filter evaluation) failed.
#[derive(Debug)]
pub struct CandidateFailure {
    pub candidate: String,
    pub error: ApplyError,
}

/// Outcome of evaluating one apply rule over its target population.
///
/// The production path only logs; the report exists so callers and tests can
/// inspect match counts and per-candidate failures after the batch joins.
#[derive(Debug)]
#[must_use]
pub struct RuleReport {
    rule: String,
    target: TargetType,
    location: Location,
    matched: Vec<String>,
    created: Vec<String>,
    failures: Vec<CandidateFailure>,
    unsupported: bool,
    duration: Duration,
}

impl RuleReport {
    pub(crate) fn new(rule: &str, target: TargetType, location: Location) -> Self {
        Self {
            rule: rule.to_owned(),
            target,
            location,
            matched: Vec::new(),
            created: Vec::new(),
            failures: Vec::new(),
            unsupported: false,
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn record_match(&mut self, candidate: &str) {
        self.matched.push(candidate.to_owned());
    }

    pub(crate) fn record_created(&mut self, object: &str) {
        self.created.push(object.to_owned());
    }

    pub(crate) fn record_failure(&mut self, candidate: &str, error: ApplyError) {
        self.failures.push(CandidateFailure {
            candidate: candidate.to_owned(),
            error,
        });
    }

    pub(crate) fn mark_unsupported(&mut self) {
        self.unsupported = true;
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    #[must_use]
    pub fn target(&self) -> TargetType {
        self.target
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Names of candidates whose filter evaluated to `true`.
    #[must_use]
    pub fn matched(&self) -> &[String] {
        &self.matched
    }

    #[must_use]
    pub fn match_count(&self) -> usize {
        self.matched.len()
    }

    /// Names of objects that went through the whole lifecycle.
    #[must_use]
    pub fn created(&self) -> &[String] {
        &self.created
    }

    #[must_use]
    pub fn failures(&self) -> &[CandidateFailure] {
        &self.failures
    }

    /// Whether the rule's target type is not accepted by its kind.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.unsupported
    }

    /// Whether the rule matched no candidate at all.
    #[must_use]
    pub fn is_unmatched(&self) -> bool {
        !self.unsupported && self.matched.is_empty()
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for RuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule '{}' ({}) for {}: matched {}, created {}, failed {}",
            self.rule,
            self.location,
            self.target,
            self.matched.len(),
            self.created.len(),
            self.failures.len(),
        )
    }
}

/// Outcome of evaluating a batch of rules of one kind.
#[derive(Debug, Default)]
#[must_use]
pub struct BatchReport {
    kind: String,
    rules: Vec<RuleReport>,
    task_failures: Vec<TaskFailure>,
}

impl BatchReport {
    pub(crate) fn new(kind: &str, mut rules: Vec<RuleReport>, task_failures: Vec<TaskFailure>) -> Self {
        // Tasks finish in any order; sort so reports read the same across runs.
        rules.sort_by(|a, b| a.rule.cmp(&b.rule).then(a.target.cmp(&b.target)));
        Self {
            kind: kind.to_owned(),
            rules,
            task_failures,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Reports of rules whose evaluation ran to completion, sorted by rule name.
    #[must_use]
    pub fn rules(&self) -> &[RuleReport] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&RuleReport> {
        self.rules.iter().find(|r| r.rule == name)
    }

    /// Rule tasks that failed as a whole (programming errors or panics).
    #[must_use]
    pub fn task_failures(&self) -> &[TaskFailure] {
        &self.task_failures
    }

    #[must_use]
    pub fn created_count(&self) -> usize {
        self.rules.iter().map(|r| r.created.len()).sum()
    }

    /// Candidate failures plus whole-task failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.rules.iter().map(|r| r.failures.len()).sum::<usize>() + self.task_failures.len()
    }

    /// Names of rules that matched nothing.
    #[must_use]
    pub fn unmatched_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.is_unmatched())
            .map(|r| r.rule.as_str())
            .collect()
    }

    /// Candidates matched by more than one rule of the batch, with the rule
    /// names. Hosts and services are keyed apart.
    #[must_use]
    pub fn overlapping_candidates(&self) -> BTreeMap<(TargetType, &str), Vec<&str>> {
        let mut by_candidate: BTreeMap<(TargetType, &str), Vec<&str>> = BTreeMap::new();
        for report in &self.rules {
            for candidate in &report.matched {
                by_candidate
                    .entry((report.target, candidate.as_str()))
                    .or_default()
                    .push(report.rule.as_str());
            }
        }
        by_candidate.retain(|_, rules| rules.len() > 1);
        by_candidate
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batch: {} rules, {} objects created, {} failures",
            self.kind,
            self.rules.len(),
            self.created_count(),
            self.failure_count(),
        )
    }
}
