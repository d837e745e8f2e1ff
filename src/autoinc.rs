//! Autoincrement emulation.
//!
//! The engine has no identity columns. A table opts in by having a column named `id`
//! (its "shadow id") and a sequence named `id_<table>`; inserts that leave `id` out get
//! the next sequence value filled in.

use std::collections::HashMap;

use tracing::debug;

use crate::error::OpenEdgeDbError;
use crate::identifiers::{IdentifierPolicy, truncate_chars};
use crate::types::RowValues;

/// Column whose presence marks a table for key emulation.
pub const SHADOW_ID_COLUMN: &str = "id";

/// Catalog lookup for a table's shadow id column; binds `(table, owner)`.
pub const SHADOW_ID_QUERY: &str =
    "SELECT COL FROM SYSPROGRESS.SYSCOLUMNS WHERE TBL = %s AND OWNER = %s AND COL = 'id'";

/// Runs a query and hands back its first row.
pub trait CatalogQuery {
    /// # Errors
    /// Returns an error if the query fails.
    fn query_row(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError>;
}

/// Supplies emulated key values to the insert planner.
pub trait KeySource {
    /// # Errors
    /// Returns `OpenEdgeDbError::KeyGenerationError` if no value can be produced.
    fn next_key(&mut self, table: &str, column: &str) -> Result<i64, OpenEdgeDbError>;
}

#[derive(Debug, Clone)]
pub struct AutoincrementEmulator {
    schema: String,
    dual_table: String,
    policy: IdentifierPolicy,
    shadow_ids: HashMap<String, bool>,
}

impl AutoincrementEmulator {
    #[must_use]
    pub fn new(schema: impl Into<String>, dual_table: impl Into<String>, policy: IdentifierPolicy) -> Self {
        Self {
            schema: schema.into(),
            dual_table: dual_table.into(),
            policy,
            shadow_ids: HashMap::new(),
        }
    }

    /// Whether `table` has a shadow id column. Answers are cached per table name.
    ///
    /// # Errors
    /// Propagates the catalog query's error.
    pub fn has_shadow_id<Q: CatalogQuery + ?Sized>(
        &mut self,
        catalog: &mut Q,
        table: &str,
    ) -> Result<bool, OpenEdgeDbError> {
        let table = self.policy.truncate(table);
        if let Some(&known) = self.shadow_ids.get(table) {
            return Ok(known);
        }
        let row = catalog.query_row(
            SHADOW_ID_QUERY,
            &[RowValues::from(table), RowValues::from(self.schema.as_str())],
        )?;
        let found = row.is_some();
        debug!(table, found, "shadow id lookup");
        self.shadow_ids.insert(table.to_string(), found);
        Ok(found)
    }

    /// Drop the cached shadow-id answer for `table`.
    pub fn forget(&mut self, table: &str) {
        self.shadow_ids.remove(self.policy.truncate(table));
    }

    /// `SELECT "<schema>"."<column>_<table>".NEXTVAL FROM "<schema>"."<dual>"`, with the
    /// sequence name cut to `limit` characters.
    #[must_use]
    pub fn sequence_query(&self, table: &str, column: &str, limit: usize) -> String {
        let sequence = format!("{column}_{table}");
        format!(
            "SELECT {}.NEXTVAL FROM {}",
            self.policy
                .quote_qualified(&self.schema, truncate_chars(&sequence, limit)),
            self.policy.quote_qualified(&self.schema, &self.dual_table)
        )
    }

    /// Fetch the next value of the key sequence for `table.column`.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::KeyGenerationError` when the query yields no row or a value
    /// that is not an integer; query failures propagate unchanged.
    pub fn next_value<Q: CatalogQuery + ?Sized>(
        &self,
        catalog: &mut Q,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<i64, OpenEdgeDbError> {
        let sql = self.sequence_query(table, column, limit);
        let key_error = || OpenEdgeDbError::KeyGenerationError {
            table: table.to_string(),
            column: column.to_string(),
        };
        let row = catalog.query_row(&sql, &[])?.ok_or_else(key_error)?;
        match row.first() {
            Some(RowValues::Int(value)) => Ok(*value),
            Some(RowValues::Text(text)) => text.trim().parse().map_err(|_| key_error()),
            _ => Err(key_error()),
        }
    }

    /// Bind this emulator to a catalog as a [`KeySource`].
    pub fn keys<'e, Q: CatalogQuery + ?Sized>(
        &'e self,
        catalog: &'e mut Q,
    ) -> EmulatedKeys<'e, Q> {
        EmulatedKeys {
            emulator: self,
            catalog,
        }
    }
}

/// [`KeySource`] drawing from the per-table sequences.
pub struct EmulatedKeys<'e, Q: CatalogQuery + ?Sized> {
    emulator: &'e AutoincrementEmulator,
    catalog: &'e mut Q,
}

impl<Q: CatalogQuery + ?Sized> KeySource for EmulatedKeys<'_, Q> {
    fn next_key(&mut self, table: &str, column: &str) -> Result<i64, OpenEdgeDbError> {
        let limit = self.emulator.policy.max_name_length();
        self.emulator
            .next_value(&mut *self.catalog, table, column, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeCatalog {
        queries: Vec<(String, Vec<RowValues>)>,
        answers: Vec<Option<Vec<RowValues>>>,
    }

    impl CatalogQuery for FakeCatalog {
        fn query_row(
            &mut self,
            sql: &str,
            params: &[RowValues],
        ) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError> {
            self.queries.push((sql.to_string(), params.to_vec()));
            Ok(if self.answers.is_empty() {
                None
            } else {
                self.answers.remove(0)
            })
        }
    }

    fn emulator() -> AutoincrementEmulator {
        AutoincrementEmulator::new("PUB", "DUAL", IdentifierPolicy::default())
    }

    #[test]
    fn shadow_id_answer_is_cached() {
        let mut catalog = FakeCatalog {
            answers: vec![Some(vec![RowValues::Text("id".into())])],
            ..FakeCatalog::default()
        };
        let mut emulator = emulator();
        assert!(emulator.has_shadow_id(&mut catalog, "books").unwrap());
        assert!(emulator.has_shadow_id(&mut catalog, "books").unwrap());
        assert_eq!(catalog.queries.len(), 1);
        assert_eq!(
            catalog.queries[0].1,
            vec![RowValues::Text("books".into()), RowValues::Text("PUB".into())]
        );

        emulator.forget("books");
        assert!(!emulator.has_shadow_id(&mut catalog, "books").unwrap());
        assert_eq!(catalog.queries.len(), 2);
    }

    #[test]
    fn sequence_name_is_truncated() {
        let emulator = emulator();
        assert_eq!(
            emulator.sequence_query("books", "id", 32),
            r#"SELECT "PUB"."id_books".NEXTVAL FROM "PUB"."DUAL""#
        );
        assert_eq!(
            emulator.sequence_query("bookshelves", "id", 8),
            r#"SELECT "PUB"."id_books".NEXTVAL FROM "PUB"."DUAL""#
        );
    }

    #[test]
    fn next_value_reads_integer() {
        let mut catalog = FakeCatalog {
            answers: vec![Some(vec![RowValues::Int(41)]), Some(vec![RowValues::Text(" 42 ".into())])],
            ..FakeCatalog::default()
        };
        let emulator = emulator();
        assert_eq!(emulator.next_value(&mut catalog, "books", "id", 32).unwrap(), 41);
        assert_eq!(emulator.keys(&mut catalog).next_key("books", "id").unwrap(), 42);
    }

    #[test]
    fn missing_or_non_integer_value_is_key_error() {
        let mut catalog = FakeCatalog {
            answers: vec![None, Some(vec![RowValues::Text("abc".into())])],
            ..FakeCatalog::default()
        };
        let emulator = emulator();
        for _ in 0..2 {
            let err = emulator.next_value(&mut catalog, "books", "id", 32).unwrap_err();
            assert!(matches!(err, OpenEdgeDbError::KeyGenerationError { .. }));
        }
    }
}
