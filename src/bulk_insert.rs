//! Plans how a multi-row INSERT reaches the engine: one batched statement executed with a
//! list of parameter rows, or one statement per row.

use crate::autoinc::{KeySource, SHADOW_ID_COLUMN};
use crate::error::OpenEdgeDbError;
use crate::identifiers::IdentifierPolicy;
use crate::render::{bulk_insert_sql, insert_row_sql};
use crate::statement::CompiledInsert;
use crate::types::RowValues;

#[derive(Debug, Clone, PartialEq)]
pub enum InsertPlan {
    /// Nothing to insert; no statement is issued.
    Noop,
    /// One statement, executed once per parameter row.
    Bulk {
        sql: String,
        rows: Vec<Vec<RowValues>>,
    },
    /// One statement per row.
    Rows {
        statements: Vec<(String, Vec<RowValues>)>,
        /// Key of the inserted row when the caller asked for it.
        returned_key: Option<i64>,
    },
}

impl InsertPlan {
    #[must_use]
    pub fn statement_count(&self) -> usize {
        match self {
            InsertPlan::Noop => 0,
            InsertPlan::Bulk { .. } => 1,
            InsertPlan::Rows { statements, .. } => statements.len(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BulkInsertPlanner {
    policy: IdentifierPolicy,
    bulk_enabled: bool,
}

impl BulkInsertPlanner {
    #[must_use]
    pub fn new(policy: IdentifierPolicy, bulk_enabled: bool) -> Self {
        Self {
            policy,
            bulk_enabled,
        }
    }

    /// Plan an insert.
    ///
    /// With `has_shadow_id` set and no explicit `id` field, every row gets a fresh key from
    /// `keys` in an appended `id` column. Batching is used only when no field has a custom
    /// placeholder, no key is to be returned and bulk insert is enabled.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::ParameterError` when a key is requested for anything but a
    /// single row or a row does not match the field list; key-source errors propagate.
    pub fn plan(
        &self,
        insert: &CompiledInsert,
        has_shadow_id: bool,
        keys: &mut dyn KeySource,
    ) -> Result<InsertPlan, OpenEdgeDbError> {
        if insert.rows.is_empty() {
            return Ok(InsertPlan::Noop);
        }
        if insert.return_id && insert.rows.len() != 1 {
            return Err(OpenEdgeDbError::ParameterError(format!(
                "returning the inserted key needs exactly one row, got {}",
                insert.rows.len()
            )));
        }
        if !insert.fields.is_empty() {
            if let Some(row) = insert.rows.iter().find(|r| r.len() != insert.fields.len()) {
                return Err(OpenEdgeDbError::ParameterError(format!(
                    "insert into {} has {} columns but a row with {} values",
                    insert.table,
                    insert.fields.len(),
                    row.len()
                )));
            }
        }

        let emulate = has_shadow_id && !self.has_field(insert, SHADOW_ID_COLUMN);
        let can_bulk = self.bulk_enabled
            && !insert.return_id
            && !insert.fields.is_empty()
            && insert.fields.iter().all(|f| f.placeholder.is_none());

        if can_bulk {
            let mut rows = Vec::with_capacity(insert.rows.len());
            for row in &insert.rows {
                let mut values = row.clone();
                if emulate {
                    values.push(RowValues::Int(keys.next_key(&insert.table, SHADOW_ID_COLUMN)?));
                }
                rows.push(values);
            }
            return Ok(InsertPlan::Bulk {
                sql: bulk_insert_sql(&self.policy, insert, emulate),
                rows,
            });
        }

        let mut statements = Vec::with_capacity(insert.rows.len());
        let mut returned_key = None;
        for row in &insert.rows {
            let emulated_id = if emulate {
                Some(keys.next_key(&insert.table, SHADOW_ID_COLUMN)?)
            } else {
                None
            };
            if insert.return_id {
                returned_key = emulated_id.or_else(|| self.explicit_key(insert, row));
            }
            statements.push(insert_row_sql(&self.policy, insert, row, emulated_id)?);
        }
        Ok(InsertPlan::Rows {
            statements,
            returned_key,
        })
    }

    fn has_field(&self, insert: &CompiledInsert, column: &str) -> bool {
        insert
            .fields
            .iter()
            .any(|f| self.policy.quote(&f.column) == self.policy.quote(column))
    }

    fn explicit_key(&self, insert: &CompiledInsert, row: &[RowValues]) -> Option<i64> {
        let pk = self.policy.quote(&insert.pk_column);
        insert
            .fields
            .iter()
            .position(|f| self.policy.quote(&f.column) == pk)
            .and_then(|idx| row.get(idx))
            .and_then(RowValues::as_int)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::InsertField;

    /// Hands out 1, 2, 3, ... and records who asked.
    #[derive(Default)]
    struct Counter {
        next: i64,
        requests: Vec<(String, String)>,
    }

    impl KeySource for Counter {
        fn next_key(&mut self, table: &str, column: &str) -> Result<i64, OpenEdgeDbError> {
            self.next += 1;
            self.requests.push((table.to_string(), column.to_string()));
            Ok(self.next)
        }
    }

    fn planner() -> BulkInsertPlanner {
        BulkInsertPlanner::new(IdentifierPolicy::default(), true)
    }

    fn titles(n: usize) -> CompiledInsert {
        CompiledInsert::new(
            "books",
            vec![InsertField::new("title")],
            (0..n).map(|i| vec![RowValues::Text(format!("t{i}"))]).collect(),
        )
    }

    #[test]
    fn zero_rows_is_noop() {
        let mut keys = Counter::default();
        let plan = planner().plan(&titles(0), true, &mut keys).unwrap();
        assert_eq!(plan, InsertPlan::Noop);
        assert_eq!(plan.statement_count(), 0);
        assert!(keys.requests.is_empty());
    }

    #[test]
    fn bulk_appends_distinct_keys() {
        let mut keys = Counter::default();
        let plan = planner().plan(&titles(3), true, &mut keys).unwrap();
        let InsertPlan::Bulk { sql, rows } = plan else {
            panic!("expected bulk plan");
        };
        assert_eq!(sql, r#"INSERT INTO "books" ("title", "id") VALUES (%s, %s)"#);
        let ids: Vec<_> = rows.iter().map(|r| r[1].clone()).collect();
        assert_eq!(ids, vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]);
        assert_eq!(keys.requests[0], ("books".to_string(), "id".to_string()));
    }

    #[test]
    fn explicit_id_disables_emulation() {
        let insert = CompiledInsert::new(
            "books",
            vec![InsertField::new("id"), InsertField::new("title")],
            vec![vec![RowValues::Int(10), "Dune".into()]],
        );
        let mut keys = Counter::default();
        let plan = planner().plan(&insert, true, &mut keys).unwrap();
        assert!(matches!(
            plan,
            InsertPlan::Bulk { ref sql, .. } if sql == r#"INSERT INTO "books" ("id", "title") VALUES (%s, %s)"#
        ));
        assert!(keys.requests.is_empty());
    }

    #[test]
    fn row_mode_when_bulk_disabled() {
        let mut keys = Counter::default();
        let plan = BulkInsertPlanner::new(IdentifierPolicy::default(), false)
            .plan(&titles(2), false, &mut keys)
            .unwrap();
        let InsertPlan::Rows { statements, returned_key } = plan else {
            panic!("expected row plan");
        };
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].0, r#"INSERT INTO "books" ("title") VALUES (%s)"#);
        assert_eq!(statements[1].1, vec![RowValues::Text("t1".into())]);
        assert_eq!(returned_key, None);
    }

    #[test]
    fn returned_key_is_the_emulated_one() {
        let mut keys = Counter { next: 6, ..Counter::default() };
        let plan = planner().plan(&titles(1).returning_id(), true, &mut keys).unwrap();
        let InsertPlan::Rows { statements, returned_key } = plan else {
            panic!("expected row plan");
        };
        assert_eq!(returned_key, Some(7));
        assert_eq!(statements[0].1.last(), Some(&RowValues::Int(7)));
    }

    #[test]
    fn returned_key_falls_back_to_explicit_id() {
        let insert = CompiledInsert::new(
            "books",
            vec![InsertField::new("id"), InsertField::new("title")],
            vec![vec![RowValues::Int(55), "Emma".into()]],
        )
        .returning_id();
        let mut keys = Counter::default();
        let plan = planner().plan(&insert, true, &mut keys).unwrap();
        assert!(matches!(plan, InsertPlan::Rows { returned_key: Some(55), .. }));
    }

    #[test]
    fn returning_key_for_many_rows_fails() {
        let mut keys = Counter::default();
        let err = planner()
            .plan(&titles(2).returning_id(), true, &mut keys)
            .unwrap_err();
        assert!(matches!(err, OpenEdgeDbError::ParameterError(_)));
    }

    #[test]
    fn custom_placeholder_forces_row_mode() {
        let insert = CompiledInsert::new(
            "events",
            vec![InsertField::new("at").with_placeholder("TO_DATE(%s)")],
            vec![vec!["2024-01-01".into()]],
        );
        let mut keys = Counter::default();
        let plan = planner().plan(&insert, false, &mut keys).unwrap();
        let InsertPlan::Rows { statements, .. } = plan else {
            panic!("expected row plan");
        };
        assert_eq!(statements[0].0, r#"INSERT INTO "events" ("at") VALUES (TO_DATE(%s))"#);
    }

    #[test]
    fn no_fields_inserts_only_the_key() {
        let insert = CompiledInsert::new("tags", Vec::new(), vec![Vec::new(), Vec::new()]);
        let mut keys = Counter::default();
        let plan = planner().plan(&insert, true, &mut keys).unwrap();
        let InsertPlan::Rows { statements, .. } = plan else {
            panic!("expected row plan");
        };
        assert_eq!(
            statements,
            vec![
                (r#"INSERT INTO "tags" ("id") VALUES (%s)"#.to_string(), vec![RowValues::Int(1)]),
                (r#"INSERT INTO "tags" ("id") VALUES (%s)"#.to_string(), vec![RowValues::Int(2)]),
            ]
        );
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let insert = CompiledInsert::new(
            "books",
            vec![InsertField::new("title")],
            vec![vec!["a".into()], vec!["b".into(), "c".into()]],
        );
        let mut keys = Counter::default();
        assert!(planner().plan(&insert, false, &mut keys).is_err());
    }
}
