//! Error types for ragkit.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while indexing or retrieving.
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid configuration, fatal at construction.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Backend could not be reached.
    #[error("Unable to connect to {backend}: {message}")]
    Connection { backend: String, message: String },

    /// The named index or collection has never been created (or was destroyed).
    #[error("Index not found: {name}")]
    IndexNotFound { name: String },

    /// Keyword search requested on a storage without a search target.
    #[error("Storage {name} is not searchable")]
    NotSearchable { name: String },

    /// A condition was supplied where it cannot be honoured, or is malformed.
    #[error("Unsupported condition: {message}")]
    UnsupportedCondition { message: String },

    /// A record field is not a string, integer, float or bool.
    #[error("Field {field} is not a scalar value")]
    NonScalarField { field: String },

    /// A record does not have the shape a backend requires.
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Tokenizer error.
    #[error("Tokenizer error: {message}")]
    Tokenizer { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an index-not-found error.
    pub fn index_not_found(name: impl Into<String>) -> Self {
        Self::IndexNotFound { name: name.into() }
    }

    /// Create an unsupported condition error.
    pub fn unsupported_condition(message: impl Into<String>) -> Self {
        Self::UnsupportedCondition {
            message: message.into(),
        }
    }

    /// Create an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a tokenizer error.
    pub fn tokenizer(message: impl Into<String>) -> Self {
        Self::Tokenizer {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the backend was never initialized.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IndexNotFound { .. })
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::IndexNotFound { .. } => "INDEX_NOT_FOUND",
            Self::NotSearchable { .. } => "NOT_SEARCHABLE",
            Self::UnsupportedCondition { .. } => "UNSUPPORTED_CONDITION",
            Self::NonScalarField { .. } => "NON_SCALAR_FIELD",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Tokenizer { .. } => "TOKENIZER_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
