//! SQL dialect translation and feature emulation for Progress OpenEdge.
//!
//! The crate sits between a query compiler that produces dialect-neutral
//! [`CompiledStatement`]s and a native driver (ODBC or equivalent) behind the
//! [`driver`] traits. It renders engine-specific SQL, keeps identifiers within the
//! engine's length limit, relocates unique constraints out of `CREATE TABLE`, emulates
//! autoincrement keys through per-table sequences, batches inserts, encodes text in the
//! database codepage and drives commit behavior for managed transaction blocks.
//!
//! ```rust,no_run
//! use openedge_sql_middleware::prelude::*;
//! # fn run<D: NativeDriver>(driver: &D) -> Result<(), OpenEdgeDbError> {
//! let options = ConnectionOptions::from_json_str(
//!     r#"{"TYPECNX": {"DSN": "sports"}, "NAME": "sports2000", "USER": "jyp", "DEFAULTSCHEMA": "PUB"}"#,
//! )?;
//! let mut conn = ConnectionContext::open(driver, options)?;
//! let mut cursor = conn.cursor()?;
//! cursor.execute("UPDATE \"customer\" SET \"balance\" = %s WHERE \"id\" = %s", &[
//!     RowValues::Float(0.0),
//!     RowValues::Int(7),
//! ])?;
//! # Ok(())
//! # }
//! ```

pub mod autoinc;
pub mod bulk_insert;
pub mod config;
pub mod connection;
pub mod ddl;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod extents;
pub mod identifiers;
pub mod operators;
pub mod pagination;
pub mod params;
pub mod prelude;
pub mod render;
pub mod results;
pub mod statement;
pub mod translation;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectionOptions, ConnectionOptionsBuilder, ConnectionType};
pub use connection::{ConnectionContext, Cursor, TransactionPhase};
pub use error::OpenEdgeDbError;
pub use results::{CustomDbRow, ResultSet};
pub use statement::CompiledStatement;
pub use types::RowValues;
