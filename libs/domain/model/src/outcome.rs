//! The result type every public validation call returns.
//!
//! Per §7, validation branches never throw through the service boundary:
//! every call returns an `Outcome`, allowed or blocked, and every blocked
//! outcome carries a human-readable reason plus a stable `rule_id` code the
//! HMI can key off of.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockReason {
    pub rule_id: &'static str,
    pub message: String,
    pub affected_entities: Vec<String>,
    /// Set when the block stems from a condition severe enough to warrant a
    /// safety-critical audit trail (e.g. triple-source protection mismatch).
    pub safety_critical: bool,
}

impl BlockReason {
    pub fn new(rule_id: &'static str, message: impl Into<String>) -> Self {
        Self { rule_id, message: message.into(), affected_entities: Vec::new(), safety_critical: false }
    }

    #[must_use]
    pub fn with_entities(mut self, entities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.affected_entities = entities.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn safety_critical(mut self) -> Self {
        self.safety_critical = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<T> {
    Allowed(T),
    Blocked(BlockReason),
}

impl<T> Outcome<T> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub fn blocked(rule_id: &'static str, message: impl Into<String>) -> Self {
        Self::Blocked(BlockReason::new(rule_id, message))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Allowed(value) => Outcome::Allowed(f(value)),
            Self::Blocked(reason) => Outcome::Blocked(reason),
        }
    }

    pub fn reason(&self) -> Option<&BlockReason> {
        match self {
            Self::Allowed(_) => None,
            Self::Blocked(reason) => Some(reason),
        }
    }
}
