use std::sync::Arc;

use tracing::{debug, error};

use crate::autoinc::{AutoincrementEmulator, CatalogQuery};
use crate::bulk_insert::InsertPlan;
use crate::ddl::{DdlRewriter, table_statement_kind, target_table};
use crate::driver::{DriverRow, NativeConnection, NativeCursor};
use crate::encoding::Codepage;
use crate::error::OpenEdgeDbError;
use crate::params::{Params, decode_row};
use crate::results::ResultSet;
use crate::statement::{CompiledInsert, CompiledSelect, CompiledStatement};
use crate::translation::{clean_statement, count_placeholders, translate_placeholders};
use crate::types::RowValues;

use super::ConnectionContext;
use super::tx::TransactionState;

/// Statement handle bound to a [`ConnectionContext`].
///
/// SQL given to [`execute`](Cursor::execute) uses `%s` markers; the cursor translates them,
/// encodes text parameters in the connection codepage and commits after each successful
/// statement unless a managed block is open.
pub struct Cursor<'a, C: NativeConnection> {
    ctx: &'a mut ConnectionContext<C>,
    native: C::Cursor,
    last_sql: Option<String>,
    last_params: Vec<RowValues>,
}

impl<'a, C: NativeConnection> Cursor<'a, C> {
    pub(super) fn new(ctx: &'a mut ConnectionContext<C>, native: C::Cursor) -> Self {
        Self {
            ctx,
            native,
            last_sql: None,
            last_params: Vec::new(),
        }
    }

    /// The connection this cursor runs on, for transaction control between statements.
    pub fn connection(&mut self) -> &mut ConnectionContext<C> {
        self.ctx
    }

    /// Last SQL text sent to the driver.
    #[must_use]
    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    /// Parameters of the last statement.
    #[must_use]
    pub fn last_params(&self) -> &[RowValues] {
        &self.last_params
    }

    fn split(&mut self) -> (Exec<'_, C>, &mut AutoincrementEmulator) {
        let ctx = &mut *self.ctx;
        let exec = Exec {
            conn: &mut ctx.conn,
            tx: &mut ctx.tx,
            ddl: ctx.renderer.ddl(),
            codepage: ctx.options.codepage,
            native: &mut self.native,
            last_sql: &mut self.last_sql,
            last_params: &mut self.last_params,
        };
        (exec, &mut ctx.autoinc)
    }

    /// Execute one statement. `CREATE TABLE`/`ALTER TABLE` statements are rewritten for the
    /// engine first and may run as two statements.
    ///
    /// Returns the driver's affected-row count for the (first) statement.
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError::DatabaseError` when the driver rejects the statement,
    /// `OpenEdgeDbError::IndexCreationError` when only a relocated unique index fails, and
    /// `OpenEdgeDbError::ParameterError`/`EncodingError` before anything is sent.
    pub fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<i64, OpenEdgeDbError> {
        let (mut exec, autoinc) = self.split();
        let statements = exec.prepare(sql)?;
        if let Some(table) = target_table(sql) {
            autoinc.forget(table);
        }
        exec.run_statements(&statements, params)
    }

    /// Execute one statement once per parameter row.
    ///
    /// An empty row list with markers in `sql` sends nothing.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::DatabaseError` when the driver rejects the statement.
    pub fn executemany(
        &mut self,
        sql: &str,
        param_rows: &[Vec<RowValues>],
    ) -> Result<i64, OpenEdgeDbError> {
        self.split().0.run_many(sql, param_rows)
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::DatabaseError` if fetching fails, or
    /// `OpenEdgeDbError::EncodingError` if text cannot be decoded.
    pub fn fetchone(&mut self) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError> {
        self.split().0.fetchone()
    }

    /// # Errors
    /// See [`fetchone`](Cursor::fetchone).
    pub fn fetchmany(&mut self, size: usize) -> Result<Vec<Vec<RowValues>>, OpenEdgeDbError> {
        let (mut exec, _) = self.split();
        let rows = exec.native.fetchmany(size).map_err(|e| exec.fetch_error(e))?;
        exec.decode_rows(rows)
    }

    /// # Errors
    /// See [`fetchone`](Cursor::fetchone).
    pub fn fetchall(&mut self) -> Result<Vec<Vec<RowValues>>, OpenEdgeDbError> {
        self.split().0.fetchall()
    }

    /// Column names of the current result.
    #[must_use]
    pub fn columns(&self) -> Option<Vec<String>> {
        self.native.columns()
    }

    /// Execute `sql` and return its first row.
    ///
    /// # Errors
    /// See [`execute`](Cursor::execute) and [`fetchone`](Cursor::fetchone).
    pub fn query_row(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError> {
        self.split().0.query_row(sql, params)
    }

    /// Render and run a compiled SELECT, collecting every row.
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError::UnsupportedLockError` for a lock the connection cannot
    /// honor, before anything reaches the driver; otherwise as [`execute`](Cursor::execute).
    pub fn query(&mut self, select: &CompiledSelect) -> Result<ResultSet, OpenEdgeDbError> {
        let statement = CompiledStatement::Select(select.clone());
        let rendered = self
            .ctx
            .renderer
            .render(&statement, self.ctx.tx.is_managed())?;
        let (mut exec, _) = self.split();
        exec.run_statements(&rendered.statements, &rendered.params)?;
        let rows = exec.fetchall()?;

        let column_names = self
            .native
            .columns()
            .unwrap_or_else(|| result_column_names(select, rows.first().map_or(0, Vec::len)));
        let mut result_set = ResultSet::with_capacity(Arc::new(column_names), rows.len());
        for row in rows {
            result_set.add_row_values(row);
        }
        Ok(result_set)
    }

    /// Render and run any compiled statement.
    ///
    /// INSERTs go through [`insert`](Cursor::insert) and report the number of rows; a
    /// SELECT leaves its rows to be fetched.
    ///
    /// # Errors
    /// As [`execute`](Cursor::execute), plus rendering errors.
    pub fn execute_compiled(&mut self, statement: &CompiledStatement) -> Result<i64, OpenEdgeDbError> {
        if let CompiledStatement::Insert(insert) = statement {
            self.insert(insert)?;
            return i64::try_from(insert.rows.len())
                .map_err(|e| OpenEdgeDbError::ParameterError(e.to_string()));
        }
        let rendered = self
            .ctx
            .renderer
            .render(statement, self.ctx.tx.is_managed())?;
        if let CompiledStatement::Ddl(sql) = statement {
            if let Some(table) = target_table(sql) {
                self.ctx.autoinc.forget(table);
            }
        }
        self.split()
            .0
            .run_statements(&rendered.statements, &rendered.params)
    }

    /// Insert rows, filling emulated keys where the table has a shadow id.
    ///
    /// Returns the key of the inserted row when `insert.return_id` is set and one is known.
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError::KeyGenerationError` if a key sequence yields nothing,
    /// `OpenEdgeDbError::ParameterError` for an invalid insert, and otherwise as
    /// [`execute`](Cursor::execute).
    pub fn insert(&mut self, insert: &CompiledInsert) -> Result<Option<i64>, OpenEdgeDbError> {
        if insert.rows.is_empty() {
            return Ok(None);
        }
        let planner = self.ctx.planner;
        let (mut exec, autoinc) = self.split();
        let has_shadow_id = autoinc.has_shadow_id(&mut exec, &insert.table)?;
        let plan = planner.plan(insert, has_shadow_id, &mut autoinc.keys(&mut exec))?;

        match plan {
            InsertPlan::Noop => Ok(None),
            InsertPlan::Bulk { sql, rows } => {
                exec.run_many(&sql, &rows)?;
                Ok(None)
            }
            InsertPlan::Rows {
                statements,
                returned_key,
            } => {
                for (sql, params) in &statements {
                    exec.run_statements(std::slice::from_ref(sql), params)?;
                }
                Ok(returned_key)
            }
        }
    }

    /// Release the native cursor.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::ConnectionError` if the driver fails to release it.
    pub fn close(mut self) -> Result<(), OpenEdgeDbError> {
        self.native.close().map_err(OpenEdgeDbError::ConnectionError)
    }
}

impl<C: NativeConnection> CatalogQuery for Cursor<'_, C> {
    fn query_row(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError> {
        Cursor::query_row(self, sql, params)
    }
}

fn result_column_names(select: &CompiledSelect, width: usize) -> Vec<String> {
    (0..width.max(select.columns.len()))
        .map(|idx| match select.columns.get(idx).and_then(|c| c.alias.clone()) {
            Some(alias) => alias,
            None => format!("Col{}", idx + 1),
        })
        .collect()
}

/// Marker count of the cleaned text must match the parameters actually bound.
fn check_markers(cleaned: &str, supplied: usize) -> Result<(), OpenEdgeDbError> {
    let markers = count_placeholders(cleaned);
    if markers == supplied {
        return Ok(());
    }
    Err(OpenEdgeDbError::ParameterError(format!(
        "statement has {markers} placeholders but {supplied} parameters were supplied"
    )))
}

/// Whether `sql` only reads: a SELECT (optionally parenthesized) or a WITH query.
fn is_query(sql: &str) -> bool {
    let head = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
    let keyword: String = head
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    keyword.eq_ignore_ascii_case("SELECT") || keyword.eq_ignore_ascii_case("WITH")
}

/// The parts of a connection one statement needs, borrowed apart from the key emulator.
struct Exec<'b, C: NativeConnection> {
    conn: &'b mut C,
    tx: &'b mut TransactionState,
    ddl: &'b DdlRewriter,
    codepage: Codepage,
    native: &'b mut C::Cursor,
    last_sql: &'b mut Option<String>,
    last_params: &'b mut Vec<RowValues>,
}

impl<C: NativeConnection> Exec<'_, C> {
    /// Table DDL may expand to two statements; everything else runs as given.
    fn prepare(&self, sql: &str) -> Result<Vec<String>, OpenEdgeDbError> {
        if table_statement_kind(sql).is_some() {
            self.ddl.rewrite(sql)
        } else {
            Ok(vec![sql.to_string()])
        }
    }

    /// Run a primary statement with `params`, then any follow-up statements without.
    fn run_statements(
        &mut self,
        statements: &[String],
        params: &[RowValues],
    ) -> Result<i64, OpenEdgeDbError> {
        let Some((primary, follow_ups)) = statements.split_first() else {
            return Ok(0);
        };
        let cleaned = clean_statement(primary);
        check_markers(&cleaned, params.len())?;
        let sql = translate_placeholders(&cleaned, !params.is_empty()).into_owned();
        let encoded = Params::convert(params, self.codepage)?;

        *self.last_sql = Some(sql.clone());
        *self.last_params = params.to_vec();
        debug!(sql = %sql, params = params.len(), "execute");
        let affected = self.native.execute(&sql, encoded.as_slice()).map_err(|e| {
            error!(sql = %sql, error = %e, "statement failed");
            OpenEdgeDbError::database(e, &sql, params)
        })?;
        self.settle(&sql)?;

        for statement in follow_ups {
            let sql = clean_statement(statement).into_owned();
            *self.last_sql = Some(sql.clone());
            self.last_params.clear();
            debug!(sql = %sql, "execute follow-up");
            self.native.execute(&sql, &[]).map_err(|e| {
                error!(sql = %sql, error = %e, "follow-up statement failed");
                OpenEdgeDbError::IndexCreationError {
                    source: e,
                    statement: sql.clone(),
                }
            })?;
            self.settle(&sql)?;
        }
        Ok(affected)
    }

    fn run_many(&mut self, sql: &str, param_rows: &[Vec<RowValues>]) -> Result<i64, OpenEdgeDbError> {
        if param_rows.is_empty() && (count_placeholders(sql) > 0 || sql.contains('?')) {
            debug!(sql = %sql, "executemany without rows skipped");
            return Ok(0);
        }
        let cleaned = clean_statement(sql);
        let mut encoded = Vec::with_capacity(param_rows.len());
        for row in param_rows {
            check_markers(&cleaned, row.len())?;
            encoded.push(Params::convert(row, self.codepage)?.into_inner());
        }
        let sql = translate_placeholders(&cleaned, !param_rows.is_empty()).into_owned();

        let flat: Vec<RowValues> = param_rows.iter().flatten().cloned().collect();
        *self.last_sql = Some(sql.clone());
        *self.last_params = param_rows.last().cloned().unwrap_or_default();
        debug!(sql = %sql, rows = param_rows.len(), "executemany");
        let affected = self.native.executemany(&sql, &encoded).map_err(|e| {
            error!(sql = %sql, error = %e, "batched statement failed");
            OpenEdgeDbError::database(e, &sql, &flat)
        })?;
        self.settle(&sql)?;
        Ok(affected)
    }

    /// Commit a successful statement, or defer it to the open managed block. Queries leave
    /// the block clean.
    fn settle(&mut self, sql: &str) -> Result<(), OpenEdgeDbError> {
        if self.tx.is_managed() {
            if is_query(sql) {
                return Ok(());
            }
            return self.tx.mark_dirty();
        }
        self.conn.commit().map_err(|e| {
            error!(error = %e, "commit failed");
            OpenEdgeDbError::database(e, "COMMIT", &[])
        })?;
        self.tx.clear_dirty();
        Ok(())
    }

    fn fetch_error(&self, e: crate::driver::NativeError) -> OpenEdgeDbError {
        let sql = self.last_sql.as_deref().unwrap_or_default();
        error!(sql = %sql, error = %e, "fetch failed");
        OpenEdgeDbError::database(e, sql, self.last_params.as_slice())
    }

    fn fetchone(&mut self) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError> {
        match self.native.fetchone().map_err(|e| self.fetch_error(e))? {
            Some(row) => Ok(Some(decode_row(row, self.codepage)?)),
            None => Ok(None),
        }
    }

    fn fetchall(&mut self) -> Result<Vec<Vec<RowValues>>, OpenEdgeDbError> {
        let rows = self.native.fetchall().map_err(|e| self.fetch_error(e))?;
        self.decode_rows(rows)
    }

    fn decode_rows(&self, rows: Vec<DriverRow>) -> Result<Vec<Vec<RowValues>>, OpenEdgeDbError> {
        rows.into_iter()
            .map(|row| decode_row(row, self.codepage))
            .collect()
    }
}

impl<C: NativeConnection> CatalogQuery for Exec<'_, C> {
    fn query_row(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Vec<RowValues>>, OpenEdgeDbError> {
        let statements = self.prepare(sql)?;
        self.run_statements(&statements, params)?;
        self.fetchone()
    }
}
