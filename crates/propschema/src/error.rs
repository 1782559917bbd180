//! Error types for schema validation and diffing

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing configuration or diffing it
#[derive(Debug, Error)]
pub enum Error {
    /// Key not recognized by the schema (typo protection)
    #[error("unknown property in {config}: {key}")]
    UnknownProperty { config: String, key: String },

    /// Mandatory key absent
    #[error("mandatory property missing in {config}: {key}")]
    MissingProperty { config: String, key: String },

    /// Value of the wrong type
    #[error("property {key} must be {expected}, got: {value}")]
    InvalidType {
        key: String,
        expected: &'static str,
        value: String,
    },

    /// Value outside a closed value set
    #[error("property {key} must be one of [{allowed}], got: {value}")]
    InvalidEnum {
        key: String,
        value: String,
        allowed: String,
    },

    /// Array item matching none of the union variants
    #[error("no index kind matches item of {key}: {value}")]
    NoVariant { key: String, value: String },

    /// A multiplexed array used outside of an enclosing array
    #[error("property {key} accepts several values only inside an array item")]
    Multiplexed { key: String },

    /// The live value of a frozen property differs from the desired one
    #[error("property {key} cannot be changed automatically (desired {desired}, actual {actual}), manual intervention required")]
    Frozen {
        key: String,
        desired: String,
        actual: String,
    },
}

impl Error {
    pub(crate) fn invalid_type(key: &str, expected: &'static str, value: &serde_json::Value) -> Self {
        Self::InvalidType {
            key: key.to_string(),
            expected,
            value: value.to_string(),
        }
    }

    /// Check if this error is a frozen-property conflict
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen { .. })
    }
}
