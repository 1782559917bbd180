//! Error types for environment compilation and planning
//!
//! Errors are categorized so commands can tell configuration mistakes,
//! which abort before any remote call, from remote failures and frozen
//! property conflicts that need an operator.

use crate::loader::LoadError;
use thiserror::Error;

/// Categories of environment errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed documents, bad parameters, unresolved dependencies
    Config,
    /// Live value of an immutable property differs from the desired one
    Frozen,
    /// A remote call failed
    Remote,
    /// A required extension point was not provided
    Contract,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Configuration error",
            Self::Frozen => "Frozen property conflict",
            Self::Remote => "Remote call failed",
            Self::Contract => "Missing extension point",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Fix the environment files, nothing has been sent to the server",
            Self::Frozen => "Change the property manually on the server, or align the environment with it",
            Self::Remote => "Check the server and re-run the command, completed actions are not repeated",
            Self::Contract => "This is an integration bug, report it with the command line used",
        }
    }
}

/// Errors raised while compiling an environment or planning against it
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Document shape not recognized
    #[error("malformed document {identity}: {message}")]
    Malformed { identity: String, message: String },

    #[error("unsupported format in {identity}: {found} (supported: {supported})", supported = crate::document::FORMAT)]
    UnsupportedFormat { identity: String, found: String },

    #[error("unknown key in {identity}: {key}")]
    UnknownKey { identity: String, key: String },

    /// An import chain leads back to one of its documents
    #[error("import cycle: {chain}")]
    ImportCycle { chain: String },

    #[error("invalid parameter name: {name:?}")]
    InvalidParamName { name: String },

    /// A placeholder naming no parameter
    #[error("unresolved parameter reference {reference} in {context}")]
    UnresolvedParam { reference: String, context: String },

    #[error("parameter {reference} references itself")]
    SelfReference { reference: String },

    #[error("parameter cycle: {chain}")]
    ParamCycle { chain: String },

    /// The same component declared with different compose modes
    #[error("{kind} {identity}: compose mode differs between {first} and {second}")]
    ComposeMismatch {
        kind: &'static str,
        identity: String,
        first: String,
        second: String,
    },

    #[error("{kind} {identity}: invalid compose mode {value:?} (expected merge or hide)")]
    InvalidCompose {
        kind: &'static str,
        identity: String,
        value: String,
    },

    #[error("{kind} declared in {origin} has neither id nor name")]
    MissingIdentity { kind: &'static str, origin: String },

    #[error("{owner}: invalid {key} reference: {message}")]
    InvalidReference {
        owner: String,
        key: &'static str,
        message: String,
    },

    #[error("database {database}: forest count must be between 0 and {max}, got {count}", max = crate::instantiate::MAX_FORESTS)]
    ForestCount { database: String, count: i64 },

    #[error("database {database}: forests must be a count or a list of names")]
    InvalidForests { database: String },

    /// Fixed point reached with declarations still waiting on dependencies
    #[error("unresolved database dependencies: {}", .items.join("; "))]
    Unresolved { items: Vec<String> },

    /// Property schema violation, named after its component
    #[error("{component}: {source}")]
    Schema {
        component: String,
        #[source]
        source: propschema::Error,
    },

    #[error("no {kind} named {name}")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("source {source_name}: no target database (give one explicitly, set target, or declare a server)")]
    NoTarget { source_name: String },

    #[error("source {source_name}: {message}")]
    Files { source_name: String, message: String },

    #[error(transparent)]
    Remote(#[from] declarative::Error),

    #[error("not available: {0}")]
    Contract(&'static str),
}

impl Error {
    pub(crate) fn schema(component: impl Into<String>, source: propschema::Error) -> Self {
        Self::Schema {
            component: component.into(),
            source,
        }
    }

    pub(crate) fn malformed(identity: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            identity: identity.to_string(),
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Schema { source, .. } if source.is_frozen() => ErrorCategory::Frozen,
            Self::Remote(_) => ErrorCategory::Remote,
            Self::Contract(_) => ErrorCategory::Contract,
            _ => ErrorCategory::Config,
        }
    }

    /// Check if this error means the requested document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Load(LoadError::NotFound(_)))
    }
}

/// Result type for environment operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_schema_error_category() {
        let err = Error::schema(
            "server app",
            propschema::Error::Frozen {
                key: "type".into(),
                desired: "\"http\"".into(),
                actual: "\"xdbc\"".into(),
            },
        );
        assert_eq!(err.category(), ErrorCategory::Frozen);
        assert!(err.to_string().starts_with("server app: "));
    }

    #[test]
    fn test_unresolved_lists_every_item() {
        let err = Error::Unresolved {
            items: vec!["database a (schema: b)".into(), "database b (schema: a)".into()],
        };
        let message = err.to_string();
        assert!(message.contains("database a"));
        assert!(message.contains("database b"));
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_remote_category() {
        let err = Error::from(declarative::Error::transport("/forests", "refused"));
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert!(!ErrorCategory::Remote.advice().is_empty());
    }
}
