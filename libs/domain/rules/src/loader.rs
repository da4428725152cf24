//! Loads the declarative rule document from a JSON configuration file.

use crate::document::RuleDocument;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("could not read rule document at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("rule document at {path} is not valid JSON: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },
}

/// Loads the signal-interlocking rule document (§4.3, §6) from disk.
///
/// The system refuses to enter operational state when this fails (§7:
/// `ConfigurationError`); the caller is expected to treat any `Err` here
/// that way.
#[instrument]
pub fn load_rule_document(path: &Path) -> Result<RuleDocument, RuleLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io { path: path.display().to_string(), source })?;
    let document: RuleDocument = serde_json::from_str(&raw).map_err(|source| RuleLoadError::Parse { path: path.display().to_string(), source })?;
    info!(signals = document.len(), path = %path.display(), "loaded interlocking rule document");
    Ok(document)
}
