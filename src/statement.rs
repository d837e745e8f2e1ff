//! Dialect-neutral statements as handed over by the query compiler.
//!
//! Every clause arrives as a [`Fragment`]: SQL text using portable `%s` markers plus the
//! parameters for those markers, in order.

use crate::types::{LockMode, RowValues, StatementKind};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<RowValues>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Fragment without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub expr: Fragment,
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn new(expr: Fragment) -> Self {
        Self { expr, alias: None }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledSelect {
    pub columns: Vec<SelectColumn>,
    pub distinct: bool,
    pub from: Vec<Fragment>,
    pub where_clause: Option<Fragment>,
    pub group_by: Vec<Fragment>,
    pub having: Option<Fragment>,
    pub order_by: Vec<Fragment>,
    pub low_mark: u64,
    pub high_mark: Option<u64>,
    pub lock: Option<LockMode>,
    /// Alias unaliased columns `Col1`, `Col2`, ... for positional access.
    pub with_col_aliases: bool,
}

impl CompiledSelect {
    pub fn new(columns: Vec<SelectColumn>, from: Vec<Fragment>) -> Self {
        Self {
            columns,
            from,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_where(mut self, predicate: Fragment) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_group_by(mut self, group_by: Vec<Fragment>) -> Self {
        self.group_by = group_by;
        self
    }

    #[must_use]
    pub fn with_having(mut self, having: Fragment) -> Self {
        self.having = Some(having);
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, order_by: Vec<Fragment>) -> Self {
        self.order_by = order_by;
        self
    }

    #[must_use]
    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Restrict to the row window `[low_mark, high_mark)`.
    #[must_use]
    pub fn with_limits(mut self, low_mark: u64, high_mark: Option<u64>) -> Self {
        self.low_mark = low_mark;
        self.high_mark = high_mark;
        self
    }

    #[must_use]
    pub fn with_lock(mut self, lock: LockMode) -> Self {
        self.lock = Some(lock);
        self
    }

    #[must_use]
    pub fn with_col_aliases(mut self, enabled: bool) -> Self {
        self.with_col_aliases = enabled;
        self
    }
}

/// Target column of an INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertField {
    pub column: String,
    /// Custom placeholder SQL (e.g. `TO_DATE(%s)`); `None` means a plain `%s`.
    pub placeholder: Option<String>,
}

impl InsertField {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            placeholder: None,
        }
    }

    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledInsert {
    pub table: String,
    pub pk_column: String,
    pub fields: Vec<InsertField>,
    /// One value list per object, in field order.
    pub rows: Vec<Vec<RowValues>>,
    /// The caller needs the key of the inserted row back.
    pub return_id: bool,
}

impl CompiledInsert {
    pub fn new(table: impl Into<String>, fields: Vec<InsertField>, rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            table: table.into(),
            pk_column: "id".to_string(),
            fields,
            rows,
            return_id: false,
        }
    }

    #[must_use]
    pub fn returning_id(mut self) -> Self {
        self.return_id = true;
        self
    }

    #[must_use]
    pub fn with_pk_column(mut self, pk_column: impl Into<String>) -> Self {
        self.pk_column = pk_column.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUpdate {
    pub table: String,
    /// `(column, value)` pairs; the value fragment is usually `%s`.
    pub assignments: Vec<(String, Fragment)>,
    pub where_clause: Option<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDelete {
    pub table: String,
    pub where_clause: Option<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledStatement {
    Select(CompiledSelect),
    Insert(CompiledInsert),
    Update(CompiledUpdate),
    Delete(CompiledDelete),
    Ddl(String),
}

impl CompiledStatement {
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        match self {
            CompiledStatement::Select(_) => StatementKind::Select,
            CompiledStatement::Insert(_) => StatementKind::Insert,
            CompiledStatement::Update(_) => StatementKind::Update,
            CompiledStatement::Delete(_) => StatementKind::Delete,
            CompiledStatement::Ddl(_) => StatementKind::Ddl,
        }
    }
}
