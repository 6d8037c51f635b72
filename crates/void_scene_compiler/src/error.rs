//! Compiler errors
//!
//! Field-level problems are reported as [`FieldError`] by the property
//! readers and wrapped with node/item context into [`CompileError`]. Every
//! error aborts the asset being compiled.

use std::path::PathBuf;

use thiserror::Error;
use void_scene_format::FormatError;

use crate::cache::CacheError;
use crate::catalog::CatalogError;

/// Error reading or validating a single field
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("Mandatory field \"{field}\" is missing")]
    Missing { field: String },

    #[error("Field \"{field}\" is invalid: {message}")]
    Invalid { field: String, message: String },

    #[error("Field \"{field}\" has unknown value \"{value}\", accepted values: {}", accepted.join(", "))]
    UnknownEnumValue {
        field: String,
        value: String,
        accepted: Vec<&'static str>,
    },

    #[error("Field \"{field}\" references unknown asset \"{reference}\"")]
    UnresolvedReference { field: String, reference: String },
}

impl FieldError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        Self::Missing { field: field.to_string() }
    }
}

/// Asset reference that is not in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unresolved asset reference \"{0}\"")]
pub struct UnresolvedReference(pub String);

/// Broad error categories used by build logs and tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed document structure or missing mandatory field
    Schema,
    /// Out-of-range value or conflicting fields
    FieldValidation,
    UnknownEnumValue,
    UnresolvedReference,
    UnknownItemType,
    OutputWrite,
    CacheIo,
    InputRead,
    /// Compiler bug, e.g. disagreeing size passes
    Internal,
}

/// Errors from compiling one scene asset
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Failed to read {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Node {node}: {source}")]
    Node {
        node: usize,
        #[source]
        source: FieldError,
    },

    #[error("Node {node}, item \"{item_type}\": {source}")]
    Item {
        node: usize,
        item_type: &'static str,
        #[source]
        source: FieldError,
    },

    #[error("Node {node}: scene item type \"{name}\" is unknown")]
    UnknownItemType { node: usize, name: String },

    #[error("Item \"{item_type}\" declared {declared} bytes but wrote {written}")]
    PayloadSizeMismatch {
        item_type: &'static str,
        declared: usize,
        written: usize,
    },

    #[error("Container error: {0}")]
    Container(#[from] FormatError),

    #[error("Failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Asset catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl CompileError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputRead { .. } => ErrorKind::InputRead,
            Self::Json(_) | Self::Schema(_) => ErrorKind::Schema,
            Self::Node { source, .. } | Self::Item { source, .. } => match source {
                FieldError::Missing { .. } => ErrorKind::Schema,
                FieldError::Invalid { .. } => ErrorKind::FieldValidation,
                FieldError::UnknownEnumValue { .. } => ErrorKind::UnknownEnumValue,
                FieldError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            },
            Self::UnknownItemType { .. } => ErrorKind::UnknownItemType,
            Self::PayloadSizeMismatch { .. } | Self::Container(_) => ErrorKind::Internal,
            Self::OutputWrite { .. } => ErrorKind::OutputWrite,
            Self::Cache(_) => ErrorKind::CacheIo,
            Self::Catalog(_) => ErrorKind::InputRead,
        }
    }

    /// The field error behind a node or item error
    pub fn field_error(&self) -> Option<&FieldError> {
        match self {
            Self::Node { source, .. } | Self::Item { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = CompileError::Item {
            node: 0,
            item_type: "LightSceneItem",
            source: FieldError::UnknownEnumValue {
                field: "LightType".into(),
                value: "AREA".into(),
                accepted: vec!["DIRECTIONAL", "POINT", "SPOT"],
            },
        };
        assert_eq!(err.kind(), ErrorKind::UnknownEnumValue);
        assert!(err.to_string().contains("AREA"));
        assert!(err.to_string().contains("DIRECTIONAL, POINT, SPOT"));

        let err = CompileError::Node {
            node: 2,
            source: FieldError::missing("Mesh"),
        };
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(CompileError::Schema("no nodes".into()).kind(), ErrorKind::Schema);
    }
}
