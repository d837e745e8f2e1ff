use thiserror::Error;

use crate::driver::NativeError;
use crate::types::RowValues;

#[derive(Debug, Error)]
pub enum OpenEdgeDbError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(#[source] NativeError),

    #[error("Transaction state error: {0}")]
    TransactionStateError(String),

    #[error("Transaction managed block ended with pending COMMIT/ROLLBACK")]
    PendingTransactionError,

    #[error("Dialect translation error: {message} (in `{fragment}`)")]
    DialectTranslationError { message: String, fragment: String },

    #[error("No key value generated for {table}.{column}")]
    KeyGenerationError { table: String, column: String },

    #[error("Unsupported lock: {0}")]
    UnsupportedLockError(String),

    #[error("Database error: {source} (sql: `{sql}`, params: {params:?})")]
    DatabaseError {
        #[source]
        source: NativeError,
        sql: String,
        params: Vec<RowValues>,
    },

    /// The table statement succeeded and was committed; only its unique index is missing.
    #[error("Unique index creation failed after table was created: {source} (sql: `{statement}`)")]
    IndexCreationError {
        #[source]
        source: NativeError,
        statement: String,
    },

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl OpenEdgeDbError {
    pub(crate) fn translation(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        OpenEdgeDbError::DialectTranslationError {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn database(source: NativeError, sql: &str, params: &[RowValues]) -> Self {
        OpenEdgeDbError::DatabaseError {
            source,
            sql: sql.to_string(),
            params: params.to_vec(),
        }
    }
}
