//! Error types for sqlbind
//!
//! Provides granular error classification for the binding engine:
//! - Binding/parameter errors (configuration, malformed parameter text)
//! - Execution errors (connection, query, transaction)
//! - Batch write errors that retain the rejected payload for diagnosis

use std::fmt;
use thiserror::Error;

/// Result type for sqlbind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Binding configuration errors (missing connection setting, etc.)
    Configuration,
    /// Parameter mini-language errors
    Parameter,
    /// Command construction errors (unsupported command type)
    Command,
    /// Connection-related errors (retriable)
    Connection,
    /// Query execution errors
    Query,
    /// Transaction errors
    Transaction,
    /// Constraint violation (not retriable)
    Constraint,
    /// Schema discovery errors
    Schema,
    /// Type conversion errors (not retriable)
    TypeConversion,
    /// Transactional batch write failed
    BatchWrite,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable.
    ///
    /// The engine itself never retries; this classification is for the
    /// trigger layer that owns retry policy.
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Main error type for sqlbind
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Binding configuration is invalid or incomplete
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A parameter text segment violates the `@name=value` mini-language
    #[error("malformed parameter segment {segment:?}: expected exactly one '=' separating a non-empty name and value")]
    MalformedParameter { segment: String },

    /// A parameter name lacks the `@` sentinel prefix
    #[error("parameter name must start with '@' in segment {segment:?}")]
    MissingPrefix { segment: String },

    /// Command type is neither a raw query nor a stored procedure
    #[error("unsupported command type {value:?}: expected \"raw_query\" or \"stored_procedure\"")]
    UnsupportedCommandType { value: String },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transaction error
    #[error("transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Constraint violation (PK, FK, unique, check)
    #[error("constraint violation: {constraint_name} - {message}")]
    Constraint {
        constraint_name: String,
        message: String,
    },

    /// Schema error (column mismatch, introspection failure)
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Table not found during schema discovery
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    /// Type conversion failed
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Transactional batch write failed; the serialized batch payload is
    /// retained for diagnosis and no rows were applied
    #[error("batch write failed: {source}")]
    BatchWrite {
        payload: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::MalformedParameter { .. } | Self::MissingPrefix { .. } => {
                ErrorCategory::Parameter
            }
            Self::UnsupportedCommandType { .. } => ErrorCategory::Command,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Constraint { .. } => ErrorCategory::Constraint,
            Self::Schema { .. } | Self::TableNotFound { .. } => ErrorCategory::Schema,
            Self::TypeConversion { .. } => ErrorCategory::TypeConversion,
            Self::BatchWrite { .. } => ErrorCategory::BatchWrite,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// The serialized batch payload rejected by a failed flush, if any
    pub fn batch_payload(&self) -> Option<&str> {
        match self {
            Self::BatchWrite { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a malformed-parameter error naming the offending segment
    pub fn malformed_parameter(segment: impl Into<String>) -> Self {
        Self::MalformedParameter {
            segment: segment.into(),
        }
    }

    /// Create a missing-prefix error naming the offending segment
    pub fn missing_prefix(segment: impl Into<String>) -> Self {
        Self::MissingPrefix {
            segment: segment.into(),
        }
    }

    /// Create an unsupported-command-type error
    pub fn unsupported_command_type(value: impl Into<String>) -> Self {
        Self::UnsupportedCommandType {
            value: value.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with the SQL that failed
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            source: None,
        }
    }

    /// Create a constraint violation error
    pub fn constraint(constraint_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            constraint_name: constraint_name.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a table-not-found error
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Wrap a flush failure, retaining the serialized batch payload
    pub fn batch_write(payload: impl Into<String>, source: Error) -> Self {
        Self::BatchWrite {
            payload: payload.into(),
            source: Box::new(source),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Parameter => write!(f, "parameter"),
            Self::Command => write!(f, "command"),
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Transaction => write!(f, "transaction"),
            Self::Constraint => write!(f, "constraint"),
            Self::Schema => write!(f, "schema"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::BatchWrite => write!(f, "batch_write"),
        }
    }
}
