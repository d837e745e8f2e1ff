//! CREATE/ALTER TABLE rewriting.
//!
//! Table names are cut to the identifier limit, and an inline `UNIQUE (...)` table
//! constraint is moved out of `CREATE TABLE` into a follow-up `CREATE UNIQUE INDEX`, which
//! is the only form of multi-column uniqueness the engine accepts at creation time.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::OpenEdgeDbError;
use crate::identifiers::{IdentifierPolicy, truncate_chars};
use crate::translation::is_code_at;

/// Appended to the table name to build the relocated unique index name.
pub const UNIQUE_INDEX_SUFFIX: &str = "_UK";

static TABLE_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<kw>CREATE|ALTER)\s+TABLE\s+").expect("table statement pattern is valid")
});

static QUOTED_TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:"(?P<schema>[^"]+)"\.)?"(?P<name>[^"]+)""#)
        .expect("table name pattern is valid")
});

static UNIQUE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"UNIQUE\s*\(").expect("unique keyword pattern is valid"));

static UNIQUE_CONSTRAINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#",\s*UNIQUE\s*\((?P<cols>\s*"[^"]+"(?:\s*,\s*"[^"]+")*\s*)\)"#)
        .expect("unique constraint pattern is valid")
});

static QUOTED_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?P<col>[^"]+)""#).expect("column pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatement {
    Create,
    Alter,
}

impl TableStatement {
    fn keyword(self) -> &'static str {
        match self {
            TableStatement::Create => "CREATE TABLE",
            TableStatement::Alter => "ALTER TABLE",
        }
    }
}

/// Detect whether `sql` is a `CREATE TABLE` or `ALTER TABLE` statement.
#[must_use]
pub fn table_statement_kind(sql: &str) -> Option<TableStatement> {
    let caps = TABLE_STATEMENT.captures(sql)?;
    match &caps["kw"] {
        "CREATE" => Some(TableStatement::Create),
        _ => Some(TableStatement::Alter),
    }
}

/// Unqualified name of the table a `CREATE TABLE`/`ALTER TABLE` statement targets.
#[must_use]
pub fn target_table(sql: &str) -> Option<&str> {
    let head = TABLE_STATEMENT.find(sql)?;
    let caps = QUOTED_TABLE_NAME.captures(&sql[head.end()..])?;
    caps.name("name").map(|m| m.as_str())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DdlRewriter {
    policy: IdentifierPolicy,
}

impl DdlRewriter {
    #[must_use]
    pub fn new(policy: IdentifierPolicy) -> Self {
        Self { policy }
    }

    /// Rewrite a DDL statement into the ordered statements the engine must run.
    ///
    /// Statements other than `CREATE TABLE`/`ALTER TABLE` come back unchanged.
    ///
    /// ```rust
    /// use openedge_sql_middleware::ddl::DdlRewriter;
    /// use openedge_sql_middleware::identifiers::IdentifierPolicy;
    ///
    /// let rewriter = DdlRewriter::new(IdentifierPolicy::new(20));
    /// let statements = rewriter
    ///     .rewrite(r#"CREATE TABLE "very_long_table_name_exceeding_limit" ("x" INT, UNIQUE ("x"))"#)
    ///     .unwrap();
    /// assert_eq!(
    ///     statements,
    ///     vec![
    ///         r#"CREATE TABLE "very_long_table_name" ("x" INT)"#.to_string(),
    ///         r#"CREATE UNIQUE INDEX "very_long_table_UK" ON "very_long_table_name" ("x")"#.to_string(),
    ///     ]
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError::DialectTranslationError` if the table name is not a quoted
    /// identifier, if more than one inline `UNIQUE (...)` constraint is present, or if a
    /// `UNIQUE (` clause cannot be parsed.
    pub fn rewrite(&self, sql: &str) -> Result<Vec<String>, OpenEdgeDbError> {
        let Some(head) = TABLE_STATEMENT.captures(sql) else {
            return Ok(vec![sql.to_string()]);
        };
        let kind = if &head["kw"] == "CREATE" {
            TableStatement::Create
        } else {
            TableStatement::Alter
        };
        let head_end = head.get(0).map_or(0, |m| m.end());

        let rest = &sql[head_end..];
        let name_caps = QUOTED_TABLE_NAME.captures(rest).ok_or_else(|| {
            OpenEdgeDbError::translation(
                format!("{} must be followed by a quoted table name", kind.keyword()),
                sql,
            )
        })?;
        let table = self.policy.truncate(&name_caps["name"]).to_string();
        let qualified = match name_caps.name("schema") {
            Some(schema) => self.policy.quote_qualified(schema.as_str(), &table),
            None => self.policy.quote(&table),
        };
        let name_end = name_caps.get(0).map_or(0, |m| m.end());
        let body = self.policy.rewrite_quoted_identifiers(rest[name_end..].trim_start());

        let mut unique_index = None;
        let body = if kind == TableStatement::Create {
            let inline_unique = UNIQUE_KEYWORD
                .find_iter(&body)
                .filter(|m| is_code_at(&body, m.start()))
                .count();
            match inline_unique {
                0 => body.into_owned(),
                1 => {
                    let (index_sql, range) =
                        self.relocate_unique(&body, &table, &qualified, sql)?;
                    unique_index = Some(index_sql);
                    let mut stripped = body.into_owned();
                    stripped.replace_range(range, "");
                    stripped
                }
                _ => {
                    return Err(OpenEdgeDbError::translation(
                        "multiple inline UNIQUE constraints are not supported",
                        sql,
                    ));
                }
            }
        } else {
            body.into_owned()
        };

        let mut statements = Vec::with_capacity(2);
        if body.is_empty() {
            statements.push(format!("{} {}", kind.keyword(), qualified));
        } else {
            statements.push(format!("{} {} {}", kind.keyword(), qualified, body));
        }
        statements.extend(unique_index);
        Ok(statements)
    }

    fn relocate_unique(
        &self,
        body: &str,
        table: &str,
        qualified: &str,
        sql: &str,
    ) -> Result<(String, std::ops::Range<usize>), OpenEdgeDbError> {
        let caps = UNIQUE_CONSTRAINT
            .captures_iter(body)
            .find(|c| c.get(0).is_some_and(|m| is_code_at(body, m.start())))
            .ok_or_else(|| OpenEdgeDbError::translation("unrecognized UNIQUE constraint", sql))?;
        let columns: Vec<String> = QUOTED_COLUMN
            .captures_iter(&caps["cols"])
            .map(|c| self.policy.quote(&c["col"]))
            .collect();
        let index_name = create_index_name(table, self.policy.max_index_name_length());
        let statement = format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.policy.quote(&index_name),
            qualified,
            columns.join(", ")
        );
        let range = caps.get(0).map_or(0..0, |m| m.range());
        Ok((statement, range))
    }
}

/// Deterministic unique-index name: the table name, shortened so that the suffix fits.
#[must_use]
pub fn create_index_name(table: &str, limit: usize) -> String {
    if limit <= UNIQUE_INDEX_SUFFIX.len() {
        return truncate_chars(table, limit).to_string();
    }
    let keep = limit - UNIQUE_INDEX_SUFFIX.len();
    format!("{}{}", truncate_chars(table, keep), UNIQUE_INDEX_SUFFIX)
}
