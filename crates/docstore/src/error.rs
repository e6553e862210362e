//! Error types for the document store layer.
//!
//! This module defines all error types used throughout the crate, following a
//! hierarchy that separates configuration errors, validation errors, session
//! errors and errors surfaced by the underlying document store.
//!
//! A read that matches nothing is not an error (it is `Ok(None)`), and a write
//! that matches nothing is not an error either (it reports zero counts). Store
//! failures are propagated unchanged: nothing in this crate retries, suppresses
//! or translates them beyond wrapping them in [`BackendError`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Invalid or missing configuration, raised before any connection is made
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Invalid input to a repository operation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Session and transaction misuse
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while validating store configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No target database was named.
    #[error("no target database name was configured")]
    MissingDatabaseName,

    /// The target database is reserved for the server's own use.
    #[error("database '{name}' is reserved for administrative use")]
    ReservedDatabaseName {
        /// The rejected database name.
        name: String,
    },

    /// The target database name is malformed.
    #[error("invalid database name '{name}': {reason}")]
    InvalidDatabaseName {
        /// The rejected database name.
        name: String,
        /// Why the name is invalid.
        reason: String,
    },

    /// The connection string could not be parsed.
    #[error("invalid connection string: {message}")]
    InvalidConnectionString {
        /// Details from the underlying check.
        message: String,
    },
}

/// Errors related to the arguments of an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier could not be converted into the entity's key type.
    #[error("invalid identifier '{id}' for key type {key_type}: {message}")]
    InvalidId {
        /// The identifier as given.
        id: String,
        /// Name of the expected key type.
        key_type: &'static str,
        /// Details from the underlying check.
        message: String,
    },

    /// An entity did not serialize its identifier under `_id`.
    #[error("entity of type {entity_type} has no '_id' field")]
    MissingId {
        /// Rust type name of the entity.
        entity_type: &'static str,
    },

    /// A filter could not be evaluated or translated.
    #[error("invalid filter on '{field}': {message}")]
    InvalidFilter {
        /// Dotted field path.
        field: String,
        /// Details from the underlying check.
        message: String,
    },

    /// A projection names a path that cannot be projected.
    #[error("invalid projection of '{field}': {message}")]
    InvalidProjection {
        /// Dotted field path.
        field: String,
        /// Details from the underlying check.
        message: String,
    },

    /// An update specification is empty or malformed.
    #[error("invalid update: {message}")]
    InvalidUpdate {
        /// Details from the underlying check.
        message: String,
    },

    /// An update tried to change a field that must never change.
    #[error("field '{field}' is immutable")]
    ImmutableField {
        /// Dotted field path.
        field: String,
    },

    /// A stored document does not have the shape of an entity.
    #[error("entity {entity_type} is not a document: {message}")]
    NotADocument {
        /// Rust type name of the entity.
        entity_type: &'static str,
        /// Details from the underlying check.
        message: String,
    },
}

/// Errors related to sessions and transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session was started by a different backend.
    #[error("session {session_id} does not belong to the {backend_name} backend")]
    ForeignSession {
        /// Identifier of the session.
        session_id: String,
        /// Name of the backend.
        backend_name: String,
    },

    /// A transaction is already running on this session.
    #[error("session {session_id} already has a transaction in progress")]
    TransactionInProgress {
        /// Identifier of the session.
        session_id: String,
    },

    /// Commit or abort was requested without a running transaction.
    #[error("session {session_id} has no transaction in progress")]
    NoTransaction {
        /// Identifier of the session.
        session_id: String,
    },
}

/// Errors originating from the document store.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        /// Name of the backend.
        backend_name: String,
        /// Message reported by the store.
        message: String,
    },

    /// A document with the same identifier already exists.
    #[error("duplicate key in collection '{collection}': {key}")]
    DuplicateKey {
        /// Collection name.
        collection: String,
        /// The duplicated identifier.
        key: String,
    },

    /// The collection already exists.
    #[error("collection '{collection}' already exists")]
    NamespaceExists {
        /// Collection name.
        collection: String,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError {
        /// Message reported by the store.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError {
        /// Message reported by the store.
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        /// Name of the backend.
        backend_name: String,
        /// Message reported by the store.
        message: String,
        /// Underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Returns `true` if this error reports a unique key collision.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StorageError::Backend(BackendError::DuplicateKey { .. }))
    }

    /// Returns `true` if this error was raised by configuration validation.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::Configuration(_))
    }
}

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        const DUPLICATE_KEY: i32 = 11000;
        const NAMESPACE_EXISTS: i32 = 48;

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_error))
                if write_error.code == DUPLICATE_KEY =>
            {
                StorageError::Backend(BackendError::DuplicateKey {
                    collection: String::new(),
                    key: write_error.message.clone(),
                })
            }
            ErrorKind::InsertMany(failure)
                if failure
                    .write_errors
                    .as_ref()
                    .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY)) =>
            {
                let key = failure
                    .write_errors
                    .iter()
                    .flatten()
                    .find(|e| e.code == DUPLICATE_KEY)
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                StorageError::Backend(BackendError::DuplicateKey {
                    collection: String::new(),
                    key,
                })
            }
            ErrorKind::Command(command_error) if command_error.code == NAMESPACE_EXISTS => {
                StorageError::Backend(BackendError::NamespaceExists {
                    collection: command_error.message.clone(),
                })
            }
            ErrorKind::ServerSelection { message, .. } => {
                StorageError::Backend(BackendError::ConnectionFailed {
                    backend_name: "mongodb".to_string(),
                    message: message.clone(),
                })
            }
            _ => StorageError::Backend(BackendError::Internal {
                backend_name: "mongodb".to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            }),
        }
    }
}
