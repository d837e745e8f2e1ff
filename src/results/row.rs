use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One result row.
///
/// Column names and the name-to-index map are shared by every row of a [`ResultSet`].
///
/// [`ResultSet`]: super::ResultSet
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    pub column_names: Arc<Vec<String>>,
    pub rows: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            rows,
            column_index,
        }
    }

    /// Position of a column. Exact names win; otherwise the lookup ignores ASCII case, since
    /// the engine reports unquoted names in upper case.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index.get(column_name) {
            return Some(idx);
        }
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }
}

pub(super) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_ignores_case() {
        let row = CustomDbRow::new(
            Arc::new(vec!["ID".to_string(), "Title".to_string()]),
            vec![RowValues::Int(1), RowValues::Text("Dune".into())],
        );
        assert_eq!(row.get("ID"), Some(&RowValues::Int(1)));
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
        assert_eq!(row.get("title").and_then(RowValues::as_text), Some("Dune"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(1), Some(&RowValues::Text("Dune".into())));
    }
}
