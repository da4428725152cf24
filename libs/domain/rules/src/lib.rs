//! The declarative rule engine of §4.3.

pub mod document;
pub mod engine;
pub mod loader;

pub use document::{RuleContext, RuleDocument};
pub use engine::{RuleEngine, RuleEngineError};
pub use loader::{load_rule_document, RuleLoadError};
