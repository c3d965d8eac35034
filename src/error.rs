//! Error types shared across the library seams.
//!
//! The store, the introspection collaborators, the OS registry and the facet
//! schema loader each get their own enum. Application code wraps them in
//! `anyhow::Error`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures raised by the metadata store.
///
/// `Sqlite` and `Io` are persistence failures and are fatal to the operation
/// that raised them. The remaining variants reject a request that names
/// something the store does not know about.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("face {0} not found")]
    FaceNotFound(i64),

    #[error("family {0} not found")]
    FamilyNotFound(i64),

    #[error("unknown facet column '{0}'")]
    UnknownFacetColumn(String),

    #[error("unknown value '{value}' for facet column '{column}'")]
    UnknownFacetValue { column: String, value: String },

    #[error("facet column '{column}' accepts at most one value, got {count}")]
    FacetSelection { column: String, count: usize },
}

impl StoreError {
    /// True for failures of the underlying persistence layer.
    pub fn is_persistence(&self) -> bool {
        matches!(self, StoreError::Sqlite(_) | StoreError::Io(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures from a face-introspection collaborator.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported font container: {0}")]
    Unsupported(String),

    #[error("malformed font data: {0}")]
    Parse(String),

    #[error("introspection service error: {0}")]
    Remote(String),

    #[error("introspection service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("introspection service channel closed")]
    Closed,
}

/// Failures from the OS font registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no font directory available for registration")]
    NoFontDir,

    #[error("registry rejected {0}")]
    Rejected(PathBuf),
}

/// Failures loading or validating a facet schema definition.
#[derive(Debug, Error)]
pub enum FacetSchemaError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML schema: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema file extension: {0}")]
    Format(String),

    #[error("facet column key must not be empty")]
    EmptyColumnKey,

    #[error("facet column '{0}' has a value with an empty key")]
    EmptyValueKey(String),

    #[error("duplicate facet column '{0}'")]
    DuplicateColumn(String),

    #[error("duplicate value '{value}' in facet column '{column}'")]
    DuplicateValue { column: String, value: String },
}
