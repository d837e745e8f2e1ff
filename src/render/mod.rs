//! Final SQL assembly for the engine's dialect.

use crate::ddl::DdlRewriter;
use crate::error::OpenEdgeDbError;
use crate::identifiers::IdentifierPolicy;
use crate::statement::CompiledStatement;
use crate::translation::count_placeholders;
use crate::types::{DatabaseFeatures, RowValues};

mod dml;
mod select;

pub(crate) use dml::{bulk_insert_sql, insert_row_sql};

/// Appended to plain SELECTs so readers do not queue behind writers.
pub const NOLOCK_HINT: &str = "WITH (NOLOCK)";

/// Default name of the single-row sentinel table.
pub const DEFAULT_DUAL_TABLE: &str = "DUAL";

/// SQL ready for the cursor.
///
/// `params` bind to the first statement; any further statements (for example a relocated
/// `CREATE UNIQUE INDEX`) take no parameters and must run after the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub statements: Vec<String>,
    pub params: Vec<RowValues>,
}

impl RenderedStatement {
    /// Build a rendered statement, checking that the primary statement has one `%s`
    /// marker per parameter.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::ParameterError` on a marker/parameter count mismatch.
    pub fn checked(statements: Vec<String>, params: Vec<RowValues>) -> Result<Self, OpenEdgeDbError> {
        let markers = statements.first().map_or(0, |sql| count_placeholders(sql));
        if markers != params.len() {
            return Err(OpenEdgeDbError::ParameterError(format!(
                "statement has {markers} placeholders but {} parameters were supplied",
                params.len()
            )));
        }
        Ok(Self { statements, params })
    }

    #[must_use]
    pub fn primary(&self) -> &str {
        self.statements.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn secondary(&self) -> &[String] {
        self.statements.get(1..).unwrap_or(&[])
    }
}

/// Turns [`CompiledStatement`]s into dialect SQL.
#[derive(Debug, Clone)]
pub struct DialectRenderer {
    policy: IdentifierPolicy,
    features: DatabaseFeatures,
    ddl: DdlRewriter,
    dual_table: String,
}

impl DialectRenderer {
    #[must_use]
    pub fn new(policy: IdentifierPolicy, features: DatabaseFeatures) -> Self {
        Self {
            policy,
            features,
            ddl: DdlRewriter::new(policy),
            dual_table: policy.quote(DEFAULT_DUAL_TABLE),
        }
    }

    /// Use `"schema"."dual"` for SELECTs that have no FROM clause.
    #[must_use]
    pub fn with_dual_table(mut self, schema: &str, dual: &str) -> Self {
        self.dual_table = self.policy.quote_qualified(schema, dual);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &IdentifierPolicy {
        &self.policy
    }

    #[must_use]
    pub fn features(&self) -> &DatabaseFeatures {
        &self.features
    }

    #[must_use]
    pub fn ddl(&self) -> &DdlRewriter {
        &self.ddl
    }

    /// Render a compiled statement.
    ///
    /// `in_transaction` tells the renderer whether a managed transaction is open, which row
    /// locking requires. An INSERT renders only for a single row and without key emulation;
    /// use the insert planner for the general case.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::UnsupportedLockError` for invalid locking requests,
    /// `OpenEdgeDbError::DialectTranslationError` for statements the dialect cannot express,
    /// and `OpenEdgeDbError::ParameterError` if fragments and parameters disagree.
    pub fn render(
        &self,
        statement: &CompiledStatement,
        in_transaction: bool,
    ) -> Result<RenderedStatement, OpenEdgeDbError> {
        match statement {
            CompiledStatement::Select(select) => self.render_select(select, in_transaction),
            CompiledStatement::Update(update) => self.render_update(update),
            CompiledStatement::Delete(delete) => self.render_delete(delete),
            CompiledStatement::Ddl(sql) => RenderedStatement::checked(self.ddl.rewrite(sql)?, Vec::new()),
            CompiledStatement::Insert(insert) => match insert.rows.as_slice() {
                [row] => {
                    let (sql, params) = insert_row_sql(&self.policy, insert, row, None)?;
                    RenderedStatement::checked(vec![sql], params)
                }
                _ => Err(OpenEdgeDbError::translation(
                    "only single-row INSERTs render directly; plan multi-row inserts",
                    insert.table.clone(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{CompiledInsert, InsertField};

    #[test]
    fn checked_rejects_mismatched_params() {
        let err = RenderedStatement::checked(vec!["SELECT %s".into()], Vec::new()).unwrap_err();
        assert!(matches!(err, OpenEdgeDbError::ParameterError(_)));
    }

    #[test]
    fn ddl_renders_through_rewriter() {
        let renderer = DialectRenderer::new(IdentifierPolicy::new(20), DatabaseFeatures::default());
        let rendered = renderer
            .render(
                &CompiledStatement::Ddl(
                    r#"CREATE TABLE "very_long_table_name_exceeding_limit" ("x" INT, UNIQUE ("x"))"#.into(),
                ),
                false,
            )
            .unwrap();
        assert_eq!(rendered.primary(), r#"CREATE TABLE "very_long_table_name" ("x" INT)"#);
        assert_eq!(rendered.secondary().len(), 1);
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn single_row_insert_renders_directly() {
        let renderer = DialectRenderer::new(IdentifierPolicy::default(), DatabaseFeatures::default());
        let insert = CompiledInsert::new(
            "books",
            vec![InsertField::new("title")],
            vec![vec![RowValues::Text("Dune".into())]],
        );
        let rendered = renderer.render(&CompiledStatement::Insert(insert), false).unwrap();
        assert_eq!(rendered.primary(), r#"INSERT INTO "books" ("title") VALUES (%s)"#);
        assert_eq!(rendered.params, vec![RowValues::Text("Dune".into())]);
    }

    #[test]
    fn multi_row_insert_needs_planner() {
        let renderer = DialectRenderer::new(IdentifierPolicy::default(), DatabaseFeatures::default());
        let insert = CompiledInsert::new(
            "books",
            vec![InsertField::new("title")],
            vec![vec![RowValues::Null], vec![RowValues::Null]],
        );
        assert!(renderer.render(&CompiledStatement::Insert(insert), false).is_err());
    }
}
