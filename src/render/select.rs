use crate::error::OpenEdgeDbError;
use crate::pagination::Pagination;
use crate::statement::{CompiledSelect, Fragment};
use crate::types::LockMode;

use super::{DialectRenderer, NOLOCK_HINT, RenderedStatement};

impl DialectRenderer {
    pub(super) fn render_select(
        &self,
        select: &CompiledSelect,
        in_transaction: bool,
    ) -> Result<RenderedStatement, OpenEdgeDbError> {
        if select.columns.is_empty() {
            return Err(OpenEdgeDbError::translation("SELECT without columns", ""));
        }
        // Fail before producing any text: locking problems must surface ahead of execution.
        let lock_sql = match select.lock {
            Some(lock) => Some(self.for_update_sql(lock, in_transaction)?),
            None => None,
        };

        let page = Pagination::from_marks(select.low_mark, select.high_mark);
        let mut params = Vec::new();

        let mut head = String::from("SELECT");
        if let Some(prefix) = page.select_prefix() {
            head.push(' ');
            head.push_str(&prefix);
        }
        let mut result = vec![head];

        if select.distinct {
            result.push("DISTINCT".to_string());
        }

        let mut out_cols = Vec::with_capacity(select.columns.len());
        let mut col_idx = 1;
        for column in &select.columns {
            let expr = self.policy.rewrite_quoted_identifiers(&column.expr.sql);
            let sql = match &column.alias {
                Some(alias) => format!("{expr} AS {}", self.policy.quote(alias)),
                None if select.with_col_aliases => {
                    let aliased = format!("{expr} AS Col{col_idx}");
                    col_idx += 1;
                    aliased
                }
                None => expr.into_owned(),
            };
            params.extend(column.expr.params.iter().cloned());
            out_cols.push(sql);
        }
        result.push(out_cols.join(", "));

        result.push("FROM".to_string());
        if select.from.is_empty() {
            result.push(self.dual_table.clone());
        } else {
            for source in &select.from {
                result.push(self.fragment_sql(source, &mut params));
            }
        }

        if let Some(predicate) = &select.where_clause {
            let sql = self.fragment_sql(predicate, &mut params);
            result.push(format!("WHERE {sql}"));
        }

        let grouping = self.join_fragments(&select.group_by, &mut params);
        let order_by: &[Fragment] = if !select.group_by.is_empty() && select.order_by.is_empty() {
            // Grouped results come back in no defined order otherwise.
            &select.group_by
        } else {
            &select.order_by
        };
        if let Some(grouping) = grouping {
            result.push(format!("GROUP BY {grouping}"));
        }

        if let Some(having) = &select.having {
            let sql = self.fragment_sql(having, &mut params);
            result.push(format!("HAVING {sql}"));
        }

        if let Some(ordering) = self.join_fragments(order_by, &mut params) {
            result.push(format!("ORDER BY {ordering}"));
        }

        if let Some(clause) = page.trailing_clause() {
            result.push(clause);
        }

        match lock_sql {
            Some(lock_sql) => result.push(lock_sql.to_string()),
            None => result.push(NOLOCK_HINT.to_string()),
        }

        RenderedStatement::checked(vec![result.join(" ")], params)
    }

    fn for_update_sql(
        &self,
        lock: LockMode,
        in_transaction: bool,
    ) -> Result<&'static str, OpenEdgeDbError> {
        if !self.features.has_select_for_update {
            return Err(OpenEdgeDbError::UnsupportedLockError(
                "row locking is not supported on this database backend".into(),
            ));
        }
        if !in_transaction {
            return Err(OpenEdgeDbError::UnsupportedLockError(
                "select for update cannot be used outside of a transaction".into(),
            ));
        }
        match lock {
            LockMode::ForUpdate => Ok("FOR UPDATE"),
            LockMode::ForUpdateNowait if self.features.has_select_for_update_nowait => {
                Ok("FOR UPDATE NOWAIT")
            }
            LockMode::ForUpdateNowait => Err(OpenEdgeDbError::UnsupportedLockError(
                "NOWAIT is not supported on this database backend".into(),
            )),
        }
    }

    pub(super) fn fragment_sql(
        &self,
        fragment: &Fragment,
        params: &mut Vec<crate::types::RowValues>,
    ) -> String {
        params.extend(fragment.params.iter().cloned());
        self.policy.rewrite_quoted_identifiers(&fragment.sql).into_owned()
    }

    fn join_fragments(
        &self,
        fragments: &[Fragment],
        params: &mut Vec<crate::types::RowValues>,
    ) -> Option<String> {
        if fragments.is_empty() {
            return None;
        }
        let parts: Vec<String> = fragments
            .iter()
            .map(|f| self.fragment_sql(f, params))
            .collect();
        Some(parts.join(", "))
    }
}
