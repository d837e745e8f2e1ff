//! Helper utilities for tests.

use std::sync::Arc;

use crate::config::{ConnectionOptions, ConnectionType};
use crate::results::CustomDbRow;
use crate::types::RowValues;

/// Create a row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// Options for a `PUB` schema reached through a DSN named `test`.
#[must_use]
pub fn test_options() -> ConnectionOptions {
    let mut opts = ConnectionOptions::new(
        ConnectionType::Dsn("test".into()),
        "testdb".into(),
        "tester".into(),
    );
    opts.default_schema = "PUB".into();
    opts
}
