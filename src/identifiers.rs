//! Identifier length policy.
//!
//! The engine caps identifiers (table, column, index, sequence names) at a fixed length.
//! Everything this layer emits goes through [`IdentifierPolicy`] so no emitted identifier
//! exceeds the cap, while quoted values that are *not* identifiers (literals in `LIKE`
//! patterns, members of `IN (...)` lists) are left untouched. An `IN (SELECT ...)` subquery
//! is ordinary SQL and its identifiers are cut like any other.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Default identifier length limit of the engine.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 32;

static COLLATE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"COLLATE (\w+) ").expect("COLLATE pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierPolicy {
    max_name_length: usize,
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NAME_LENGTH)
    }
}

impl IdentifierPolicy {
    #[must_use]
    pub const fn new(max_name_length: usize) -> Self {
        Self { max_name_length }
    }

    #[must_use]
    pub const fn max_name_length(&self) -> usize {
        self.max_name_length
    }

    /// Limit for generated index names.
    #[must_use]
    pub const fn max_index_name_length(&self) -> usize {
        self.max_name_length.saturating_sub(2)
    }

    #[must_use]
    pub const fn max_constraint_name_length(&self) -> usize {
        self.max_name_length
    }

    /// Limit for emulated-key sequence names.
    #[must_use]
    pub const fn max_sequence_name_length(&self) -> usize {
        self.max_name_length.saturating_sub(3)
    }

    /// Cut `name` to the identifier limit (in characters).
    #[must_use]
    pub fn truncate<'a>(&self, name: &'a str) -> &'a str {
        truncate_chars(name, self.max_name_length)
    }

    /// Truncate and double-quote a name. Already-quoted names are re-quoted after truncation.
    #[must_use]
    pub fn quote(&self, name: &str) -> String {
        let bare = name
            .strip_prefix('"')
            .and_then(|n| n.strip_suffix('"'))
            .unwrap_or(name);
        format!("\"{}\"", self.truncate(bare))
    }

    /// Quote a schema-qualified name, `"schema"."name"`.
    #[must_use]
    pub fn quote_qualified(&self, schema: &str, name: &str) -> String {
        format!("{}.{}", self.quote(schema), self.quote(name))
    }

    /// Truncate every double-quoted identifier in a SQL fragment.
    ///
    /// Single-quoted literals and the members of an `IN (...)` list are copied verbatim.
    /// When the fragment is an `IN (` or ` LIKE ` predicate, a `COLLATE <name> ` clause is
    /// dropped. A fragment without double quotes is returned unchanged.
    ///
    /// ```rust
    /// use openedge_sql_middleware::identifiers::IdentifierPolicy;
    ///
    /// let policy = IdentifierPolicy::new(8);
    /// assert_eq!(
    ///     policy.rewrite_quoted_identifiers("\"customers\".\"customer_name\" LIKE '\"long_pattern\"'"),
    ///     "\"customer\".\"customer\" LIKE '\"long_pattern\"'"
    /// );
    /// ```
    #[must_use]
    pub fn rewrite_quoted_identifiers<'a>(&self, fragment: &'a str) -> Cow<'a, str> {
        if !fragment.contains('"') {
            return Cow::Borrowed(fragment);
        }

        let predicate = fragment.contains("IN (") || fragment.contains(" LIKE ");
        let source = if predicate && fragment.contains("COLLATE") {
            COLLATE_CLAUSE.replace_all(fragment, "")
        } else {
            Cow::Borrowed(fragment)
        };

        match self.truncate_identifiers(&source) {
            Some(rewritten) => Cow::Owned(rewritten),
            None => source,
        }
    }

    fn truncate_identifiers(&self, text: &str) -> Option<String> {
        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        // One entry per open parenthesis: whether it encloses literal `IN` list members.
        let mut frames: Vec<bool> = Vec::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    out.push(c);
                    while let Some(lc) = chars.next() {
                        out.push(lc);
                        if lc == '\'' {
                            if chars.peek() == Some(&'\'') {
                                out.push('\'');
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                '"' => {
                    let mut ident = String::new();
                    let mut closed = false;
                    while let Some(ic) = chars.next() {
                        if ic == '"' {
                            if chars.peek() == Some(&'"') {
                                ident.push_str("\"\"");
                                chars.next();
                            } else {
                                closed = true;
                                break;
                            }
                        } else {
                            ident.push(ic);
                        }
                    }
                    out.push('"');
                    if closed && frames.last() != Some(&true) {
                        let cut = self.truncate(&ident);
                        changed |= cut.len() != ident.len();
                        out.push_str(cut);
                    } else {
                        out.push_str(&ident);
                    }
                    if closed {
                        out.push('"');
                    }
                }
                '(' => {
                    let protected = if starts_subquery(chars.clone()) {
                        false
                    } else if frames.last() == Some(&true) {
                        true
                    } else {
                        ends_with_in_keyword(&out)
                    };
                    frames.push(protected);
                    out.push(c);
                }
                ')' => {
                    frames.pop();
                    out.push(c);
                }
                _ => out.push(c),
            }
        }

        changed.then_some(out)
    }
}

pub(crate) fn truncate_chars(name: &str, limit: usize) -> &str {
    match name.char_indices().nth(limit) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

/// Whether the text after an opening parenthesis starts a `SELECT`.
fn starts_subquery(rest: impl Iterator<Item = char>) -> bool {
    let word: String = rest
        .skip_while(|c| c.is_whitespace())
        .take_while(char::is_ascii_alphabetic)
        .collect();
    word.eq_ignore_ascii_case("SELECT")
}

fn ends_with_in_keyword(text: &str) -> bool {
    let bytes = text.trim_end().as_bytes();
    let len = bytes.len();
    if len < 2 || !bytes[len - 2..].eq_ignore_ascii_case(b"IN") {
        return false;
    }
    len == 2 || !(bytes[len - 3].is_ascii_alphanumeric() || bytes[len - 3] == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_limit_and_is_idempotent() {
        let policy = IdentifierPolicy::new(5);
        let once = policy.truncate("abcdefghij");
        assert_eq!(once, "abcde");
        assert_eq!(policy.truncate(once), once);
        assert_eq!(policy.truncate("abc"), "abc");
    }

    #[test]
    fn truncates_by_characters() {
        let policy = IdentifierPolicy::new(3);
        assert_eq!(policy.truncate("élève"), "élè");
    }

    #[test]
    fn derived_limits() {
        let policy = IdentifierPolicy::default();
        assert_eq!(policy.max_index_name_length(), 30);
        assert_eq!(policy.max_sequence_name_length(), 29);
        assert_eq!(policy.max_constraint_name_length(), 32);
    }

    #[test]
    fn quote_requotes_after_truncation() {
        let policy = IdentifierPolicy::new(4);
        assert_eq!(policy.quote("orders"), "\"orde\"");
        assert_eq!(policy.quote("\"orders\""), "\"orde\"");
        assert_eq!(policy.quote_qualified("PUB", "orders"), "\"PUB\".\"orde\"");
    }

    #[test]
    fn fragment_without_quotes_is_borrowed() {
        let policy = IdentifierPolicy::new(2);
        let fragment = "COUNT(*) LIKE COLLATE x ";
        assert!(matches!(
            policy.rewrite_quoted_identifiers(fragment),
            Cow::Borrowed(f) if f == fragment
        ));
    }

    #[test]
    fn truncates_only_quoted_text() {
        let policy = IdentifierPolicy::new(6);
        assert_eq!(
            policy.rewrite_quoted_identifiers("\"invoice_lines\".\"quantity\" > %s"),
            "\"invoic\".\"quanti\" > %s"
        );
    }

    #[test]
    fn in_list_members_are_not_truncated() {
        let policy = IdentifierPolicy::new(4);
        assert_eq!(
            policy.rewrite_quoted_identifiers("\"status\" IN (\"pending_review\", 'archived')"),
            "\"stat\" IN (\"pending_review\", 'archived')"
        );
    }

    #[test]
    fn like_literal_with_quotes_is_not_truncated() {
        let policy = IdentifierPolicy::new(4);
        assert_eq!(
            policy.rewrite_quoted_identifiers("\"title\" LIKE '%\"quoted words\"%'"),
            "\"titl\" LIKE '%\"quoted words\"%'"
        );
    }

    #[test]
    fn collate_clause_dropped_in_predicates() {
        let policy = IdentifierPolicy::new(32);
        assert_eq!(
            policy.rewrite_quoted_identifiers("\"name\" COLLATE Latin1_General_CI_AS LIKE %s"),
            "\"name\" LIKE %s"
        );
        assert_eq!(
            policy.rewrite_quoted_identifiers("\"name\" COLLATE Latin1 = %s"),
            "\"name\" COLLATE Latin1 = %s"
        );
    }

    #[test]
    fn in_keyword_needs_word_boundary() {
        let policy = IdentifierPolicy::new(3);
        assert_eq!(
            policy.rewrite_quoted_identifiers("JOIN (\"accounts\")"),
            "JOIN (\"acc\")"
        );
        assert_eq!(
            policy.rewrite_quoted_identifiers("\"a\" NOT IN (\"accounts\")"),
            "\"a\" NOT IN (\"accounts\")"
        );
    }

    #[test]
    fn in_subquery_identifiers_are_truncated() {
        let policy = IdentifierPolicy::new(8);
        assert_eq!(
            policy.rewrite_quoted_identifiers(
                "\"orders\".\"customer_id\" IN (SELECT U0.\"id\" FROM \"customers_archive\" U0)"
            ),
            "\"orders\".\"customer\" IN (SELECT U0.\"id\" FROM \"customer\" U0)"
        );
    }

    #[test]
    fn literal_list_inside_subquery_stays_intact() {
        let policy = IdentifierPolicy::new(4);
        assert_eq!(
            policy.rewrite_quoted_identifiers(
                "\"a\" IN ( select \"bbbbbb\" FROM \"t\" WHERE \"kind\" IN (\"longvalue\"))"
            ),
            "\"a\" IN ( select \"bbbb\" FROM \"t\" WHERE \"kind\" IN (\"longvalue\"))"
        );
    }
}
