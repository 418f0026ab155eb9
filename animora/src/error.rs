use thiserror::Error;

use crate::{Attribute, PropertyType};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot resolve animation target '{path}'")]
    InvalidTarget { path: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("wrong data type for property '{property}' attribute {attribute:?}")]
    WrongDataType {
        property: PropertyType,
        attribute: Attribute,
    },

    #[error("property '{property}' not found")]
    PropertyNotFound { property: PropertyType },

    #[error("incompatible animation item: {message}")]
    IncompatibleItem { message: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("modifier stack exhausted ({capacity} records)")]
    ModifierStackExhausted { capacity: usize },

    #[cfg(feature = "json")]
    #[error("failed to parse animation JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "binary")]
    #[error("failed to parse animation binary: {message}")]
    BinaryParse { message: String },

    #[cfg(any(feature = "json", feature = "binary"))]
    #[error("unsupported or invalid asset format version: {value}")]
    AssetVersion { value: String },

    #[cfg(any(feature = "json", feature = "binary"))]
    #[error("malformed animation asset: {message}")]
    MalformedAsset { message: String },
}

impl Error {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Errors a single sample can hit while composing; the player drops the sample and moves on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::WrongDataType { .. } | Self::PropertyNotFound { .. } | Self::InvalidTarget { .. }
        )
    }
}
