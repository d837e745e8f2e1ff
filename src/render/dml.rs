use crate::autoinc::SHADOW_ID_COLUMN;
use crate::error::OpenEdgeDbError;
use crate::identifiers::IdentifierPolicy;
use crate::statement::{CompiledDelete, CompiledInsert, CompiledUpdate};
use crate::translation::count_placeholders;
use crate::types::RowValues;

use super::{DialectRenderer, RenderedStatement};

impl DialectRenderer {
    pub(super) fn render_update(
        &self,
        update: &CompiledUpdate,
    ) -> Result<RenderedStatement, OpenEdgeDbError> {
        if update.assignments.is_empty() {
            return Err(OpenEdgeDbError::translation(
                "UPDATE without assignments",
                update.table.clone(),
            ));
        }
        let mut params = Vec::new();
        let mut sets = Vec::with_capacity(update.assignments.len());
        for (column, value) in &update.assignments {
            let value_sql = self.fragment_sql(value, &mut params);
            sets.push(format!("{} = {value_sql}", self.policy.quote(column)));
        }
        let mut sql = format!("UPDATE {} SET {}", self.policy.quote(&update.table), sets.join(", "));
        if let Some(predicate) = &update.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&self.fragment_sql(predicate, &mut params));
        }
        RenderedStatement::checked(vec![sql], params)
    }

    pub(super) fn render_delete(
        &self,
        delete: &CompiledDelete,
    ) -> Result<RenderedStatement, OpenEdgeDbError> {
        if delete.table.trim().is_empty() {
            return Err(OpenEdgeDbError::translation("DELETE needs exactly one table", ""));
        }
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.policy.quote(&delete.table));
        if let Some(predicate) = &delete.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&self.fragment_sql(predicate, &mut params));
        }
        RenderedStatement::checked(vec![sql], params)
    }
}

/// `INSERT INTO "t" ("a", "b"[, "id"])`, the part shared by every insert form.
fn insert_head(policy: &IdentifierPolicy, insert: &CompiledInsert, with_id: bool) -> String {
    let mut columns: Vec<String> = insert.fields.iter().map(|f| policy.quote(&f.column)).collect();
    if with_id {
        columns.push(policy.quote(SHADOW_ID_COLUMN));
    }
    format!("INSERT INTO {} ({})", policy.quote(&insert.table), columns.join(", "))
}

/// Template for a batched insert: plain `%s` markers only.
pub(crate) fn bulk_insert_sql(policy: &IdentifierPolicy, insert: &CompiledInsert, with_id: bool) -> String {
    let width = insert.fields.len() + usize::from(with_id);
    format!(
        "{} VALUES ({})",
        insert_head(policy, insert, with_id),
        vec!["%s"; width].join(", ")
    )
}

/// Render the INSERT for one row, honoring custom placeholders.
///
/// A custom placeholder without a `%s` marker is inlined and its value dropped. With no
/// fields at all the row inserts only `emulated_id`, or the primary key's `DEFAULT`.
pub(crate) fn insert_row_sql(
    policy: &IdentifierPolicy,
    insert: &CompiledInsert,
    row: &[RowValues],
    emulated_id: Option<i64>,
) -> Result<(String, Vec<RowValues>), OpenEdgeDbError> {
    if insert.fields.is_empty() {
        let table = policy.quote(&insert.table);
        return Ok(match emulated_id {
            Some(id) => (
                format!("INSERT INTO {table} ({}) VALUES (%s)", policy.quote(SHADOW_ID_COLUMN)),
                vec![RowValues::Int(id)],
            ),
            None => (
                format!("INSERT INTO {table} ({}) VALUES (DEFAULT)", policy.quote(&insert.pk_column)),
                Vec::new(),
            ),
        });
    }
    if row.len() != insert.fields.len() {
        return Err(OpenEdgeDbError::ParameterError(format!(
            "insert into {} has {} columns but a row with {} values",
            insert.table,
            insert.fields.len(),
            row.len()
        )));
    }

    let mut placeholders = Vec::with_capacity(row.len() + 1);
    let mut params = Vec::with_capacity(row.len() + 1);
    for (field, value) in insert.fields.iter().zip(row) {
        let placeholder = field.placeholder.as_deref().unwrap_or("%s");
        match count_placeholders(placeholder) {
            0 => {}
            1 => params.push(value.clone()),
            n => {
                return Err(OpenEdgeDbError::ParameterError(format!(
                    "placeholder `{placeholder}` for column {} has {n} markers",
                    field.column
                )));
            }
        }
        placeholders.push(placeholder.to_string());
    }
    if let Some(id) = emulated_id {
        placeholders.push("%s".to_string());
        params.push(RowValues::Int(id));
    }

    let sql = format!(
        "{} VALUES ({})",
        insert_head(policy, insert, emulated_id.is_some()),
        placeholders.join(", ")
    );
    Ok((sql, params))
}
