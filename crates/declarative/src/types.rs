//! Core types for desired-state reconciliation

use crate::error::ReconcileError;
use crate::identity::ResourceIdentity;
use crate::reconciler::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a single configuration attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl AttributeValue {
    /// Compare two values under the attribute comparison rule
    ///
    /// Text compares ignoring ASCII case; numbers and booleans by value.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Text(_) => "string",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Whether an attribute can be changed on an existing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    /// Can be updated in place
    Settable,
    /// Fixed at creation; a change forces delete-then-create
    Immutable,
}

/// One entry of a resource kind's attribute list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name as reported in differences
    pub name: &'static str,
    /// `None` when unset
    pub value: Option<AttributeValue>,
    pub mutability: Mutability,
    /// Guard: false when the attribute must not be compared
    pub relevant: bool,
}

impl Attribute {
    pub fn settable<V: Into<AttributeValue>>(name: &'static str, value: Option<V>) -> Self {
        Self {
            name,
            value: value.map(Into::into),
            mutability: Mutability::Settable,
            relevant: true,
        }
    }

    pub fn immutable<V: Into<AttributeValue>>(name: &'static str, value: Option<V>) -> Self {
        Self {
            name,
            value: value.map(Into::into),
            mutability: Mutability::Immutable,
            relevant: true,
        }
    }

    /// Only compare this attribute when `guard` holds
    pub fn guarded(mut self, guard: bool) -> Self {
        self.relevant = guard;
        self
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// A single attribute assignment sent to the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub attribute: String,
    pub value: AttributeValue,
}

impl Change {
    pub fn new(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.attribute, self.value)
    }
}

/// What the reconciler decided to do with one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Observed state already matches
    NoOp,
    /// Resource is missing and must exist
    Create,
    /// Resource exists; send the listed changes
    Update { changes: Vec<Change> },
    /// Resource exists and must not
    Delete,
    /// An immutable attribute differs: delete, then create
    Recreate { attribute: String },
}

impl Action {
    /// Whether the action mutates the remote system
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }

    /// Short verb for tables and progress output
    pub fn verb(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Update { .. } => "update",
            Self::Delete => "delete",
            Self::Recreate { .. } => "recreate",
        }
    }

    /// Human-readable summary of the action for a resource
    ///
    /// The text does not depend on whether the action was simulated, so
    /// dry-run and real-run reports can be compared line by line.
    pub fn describe(&self, identity: &ResourceIdentity) -> String {
        match self {
            Self::NoOp => format!("{identity} is up to date"),
            Self::Create => format!("Create {identity}"),
            Self::Update { changes } => {
                let list: Vec<String> = changes.iter().map(ToString::to_string).collect();
                format!("Update {identity} ({})", list.join(", "))
            }
            Self::Delete => format!("Delete {identity}"),
            Self::Recreate { attribute } => {
                format!("Recreate {identity} ({attribute} cannot change in place)")
            }
        }
    }
}

/// Options for batch execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Compute actions without mutating anything
    pub simulation: bool,
    /// Number of resource trees converged concurrently
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            simulation: false,
            jobs: 4,
        }
    }
}

/// Summary of a batch execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub recreated: usize,
    pub no_change: usize,
    /// Recreates whose create half waits for the next pass
    pub deferred: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl ExecuteSummary {
    /// Count one resource's result, including parents created for it
    pub fn add_result(&mut self, result: &Result<Outcome, ReconcileError>) {
        match result {
            Ok(outcome) => self.add_outcome(outcome),
            Err(e) if e.is_cancelled() => self.cancelled += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn add_outcome(&mut self, outcome: &Outcome) {
        for parent in &outcome.prerequisites {
            self.add_outcome(parent);
        }
        match outcome.action {
            Action::NoOp => self.no_change += 1,
            Action::Create => self.created += 1,
            Action::Update { .. } => self.updated += 1,
            Action::Delete => self.deleted += 1,
            Action::Recreate { .. } => self.recreated += 1,
        }
        if outcome.deferred {
            self.deferred += 1;
        }
    }

    /// Resources changed (or that would change, in simulation)
    pub fn changed(&self) -> usize {
        self.created + self.updated + self.deleted + self.recreated
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}
