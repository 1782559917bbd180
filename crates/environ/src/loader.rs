//! Document loading capability

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a [`DocumentLoader`]
#[derive(Debug, Error)]
pub enum LoadError {
    /// No document has this identity
    #[error("environment document not found: {0}")]
    NotFound(String),

    /// The document exists but could not be read or parsed
    #[error("cannot load {identity}: {message}")]
    Invalid { identity: String, message: String },
}

/// Source of raw configuration documents
///
/// Identities are opaque to the compiler; the loader decides what they
/// mean (file paths, keys of an in-memory map...).
pub trait DocumentLoader {
    /// Load the raw JSON value of a document
    fn load(&self, identity: &str) -> Result<Value, LoadError>;

    /// Resolve an import reference relative to the importing document
    fn resolve_import(&self, reference: &str, base: &str) -> String;
}

/// In-memory loader keyed by slash-separated paths
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document
    pub fn with(mut self, identity: &str, document: Value) -> Self {
        self.insert(identity, document);
        self
    }

    pub fn insert(&mut self, identity: &str, document: Value) {
        self.documents.insert(identity.to_string(), document);
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, identity: &str) -> Result<Value, LoadError> {
        self.documents
            .get(identity)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(identity.to_string()))
    }

    fn resolve_import(&self, reference: &str, base: &str) -> String {
        join(base, reference)
    }
}

/// Join a relative reference to the directory of `base`
fn join(base: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        return reference.to_string();
    }
    let mut parts: Vec<&str> = match base.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in reference.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(segment),
        }
    }
    parts.join("/")
}
