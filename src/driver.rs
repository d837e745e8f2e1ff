//! The native driver capability (ODBC or equivalent) this layer drives.
//!
//! Implementations are thin: they send finished SQL text with `?` markers and already
//! encoded parameters, and hand back raw rows. Everything dialect-specific happens above.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Error reported by the native driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NativeError {
    pub message: String,
    /// SQLSTATE reported by the driver, when available.
    pub sqlstate: Option<String>,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate: None,
        }
    }

    #[must_use]
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

/// A value as it crosses the driver boundary. Text travels as bytes in the connection's
/// codepage.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverValue {
    Null,
    Int(i64),
    Float(f64),
    Text(Vec<u8>),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
}

pub type DriverRow = Vec<DriverValue>;

/// Opens native connections from an assembled connection string.
pub trait NativeDriver {
    type Connection: NativeConnection;

    /// # Errors
    /// Returns the driver's error if the connection cannot be established.
    fn connect(&self, connection_string: &str) -> Result<Self::Connection, NativeError>;
}

/// One open native connection.
pub trait NativeConnection {
    type Cursor: NativeCursor;

    /// # Errors
    /// Returns the driver's error if no cursor can be allocated.
    fn cursor(&mut self) -> Result<Self::Cursor, NativeError>;

    /// # Errors
    /// Returns the driver's error if the commit fails.
    fn commit(&mut self) -> Result<(), NativeError>;

    /// # Errors
    /// Returns the driver's error if the rollback fails.
    fn rollback(&mut self) -> Result<(), NativeError>;

    /// # Errors
    /// Returns the driver's error if closing fails.
    fn close(&mut self) -> Result<(), NativeError>;
}

/// Statement handle on a native connection.
pub trait NativeCursor {
    /// Execute one statement; returns the affected row count (or -1 when unknown).
    ///
    /// # Errors
    /// Returns the driver's error if execution fails.
    fn execute(&mut self, sql: &str, params: &[DriverValue]) -> Result<i64, NativeError>;

    /// Execute one statement once per parameter row.
    ///
    /// # Errors
    /// Returns the driver's error if any execution fails.
    fn executemany(&mut self, sql: &str, param_rows: &[DriverRow]) -> Result<i64, NativeError>;

    /// # Errors
    /// Returns the driver's error if fetching fails.
    fn fetchone(&mut self) -> Result<Option<DriverRow>, NativeError>;

    /// # Errors
    /// Returns the driver's error if fetching fails.
    fn fetchmany(&mut self, size: usize) -> Result<Vec<DriverRow>, NativeError>;

    /// # Errors
    /// Returns the driver's error if fetching fails.
    fn fetchall(&mut self) -> Result<Vec<DriverRow>, NativeError>;

    /// Column names of the current result, if the last statement produced one.
    fn columns(&self) -> Option<Vec<String>>;

    /// # Errors
    /// Returns the driver's error if the handle cannot be released.
    fn close(&mut self) -> Result<(), NativeError>;
}
