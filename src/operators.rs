//! Field lookups as the engine spells them.
//!
//! `=` on text follows the database collation, so `exact` cannot be made case sensitive;
//! the `i*` lookups upper-case both sides instead. The engine has no regular expressions
//! and `regex`/`iregex` degrade to `LIKE`.

use std::str::FromStr;

use crate::error::OpenEdgeDbError;
use crate::statement::Fragment;
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    Gt,
    Gte,
    Lt,
    Lte,
    StartsWith,
    EndsWith,
    IStartsWith,
    IEndsWith,
    Regex,
    IRegex,
}

impl Lookup {
    /// Right-hand side of the predicate, with `%s` for the value.
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Lookup::Exact => "= %s",
            Lookup::IExact => "= UPPER(%s)",
            Lookup::Contains | Lookup::StartsWith | Lookup::EndsWith => r"LIKE %s ESCAPE '\'",
            Lookup::IContains | Lookup::IStartsWith | Lookup::IEndsWith => {
                r"LIKE UPPER(%s) ESCAPE '\'"
            }
            Lookup::Gt => "> %s",
            Lookup::Gte => ">= %s",
            Lookup::Lt => "< %s",
            Lookup::Lte => "<= %s",
            Lookup::Regex | Lookup::IRegex => "LIKE %s",
        }
    }

    #[must_use]
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Lookup::IExact | Lookup::IContains | Lookup::IStartsWith | Lookup::IEndsWith
        )
    }

    /// Wrap a text value in the `%` wildcards the lookup needs, escaping `\`, `%` and `_`.
    #[must_use]
    pub fn prepare_pattern(self, value: &str) -> String {
        let escaped = || {
            value
                .replace('\\', r"\\")
                .replace('%', r"\%")
                .replace('_', r"\_")
        };
        match self {
            Lookup::Contains | Lookup::IContains => format!("%{}%", escaped()),
            Lookup::StartsWith | Lookup::IStartsWith => format!("{}%", escaped()),
            Lookup::EndsWith | Lookup::IEndsWith => format!("%{}", escaped()),
            _ => value.to_string(),
        }
    }

    /// Build the predicate `lhs <op> %s` with its parameter.
    ///
    /// ```rust
    /// use openedge_sql_middleware::operators::Lookup;
    /// use openedge_sql_middleware::types::RowValues;
    ///
    /// let predicate = Lookup::IContains.predicate(r#""title""#, RowValues::Text("50%".into()));
    /// assert_eq!(predicate.sql, r#"UPPER("title") LIKE UPPER(%s) ESCAPE '\'"#);
    /// assert_eq!(predicate.params, vec![RowValues::Text(r"%50\%%".into())]);
    /// ```
    #[must_use]
    pub fn predicate(self, lhs: &str, value: RowValues) -> Fragment {
        let lhs = if self.is_case_insensitive() {
            format!("UPPER({lhs})")
        } else {
            lhs.to_string()
        };
        let value = match value {
            RowValues::Text(text) => RowValues::Text(self.prepare_pattern(&text)),
            other => other,
        };
        Fragment::new(format!("{lhs} {}", self.template()), vec![value])
    }
}

impl FromStr for Lookup {
    type Err = OpenEdgeDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "exact" => Lookup::Exact,
            "iexact" => Lookup::IExact,
            "contains" => Lookup::Contains,
            "icontains" => Lookup::IContains,
            "gt" => Lookup::Gt,
            "gte" => Lookup::Gte,
            "lt" => Lookup::Lt,
            "lte" => Lookup::Lte,
            "startswith" => Lookup::StartsWith,
            "endswith" => Lookup::EndsWith,
            "istartswith" => Lookup::IStartsWith,
            "iendswith" => Lookup::IEndsWith,
            "regex" => Lookup::Regex,
            "iregex" => Lookup::IRegex,
            other => {
                return Err(OpenEdgeDbError::translation("unsupported lookup", other));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::count_placeholders;

    #[test]
    fn every_template_has_one_marker() {
        for name in [
            "exact", "iexact", "contains", "icontains", "gt", "gte", "lt", "lte", "startswith",
            "endswith", "istartswith", "iendswith", "regex", "iregex",
        ] {
            let lookup: Lookup = name.parse().unwrap();
            assert_eq!(count_placeholders(lookup.template()), 1, "{name}");
        }
    }

    #[test]
    fn unknown_lookup_is_rejected() {
        assert!(matches!(
            "search".parse::<Lookup>(),
            Err(OpenEdgeDbError::DialectTranslationError { .. })
        ));
    }

    #[test]
    fn patterns_are_escaped() {
        assert_eq!(Lookup::StartsWith.prepare_pattern("a_b"), r"a\_b%");
        assert_eq!(Lookup::EndsWith.prepare_pattern(r"c:\"), r"%c:\\");
        assert_eq!(Lookup::Exact.prepare_pattern("100%"), "100%");
    }

    #[test]
    fn non_text_values_pass_through() {
        let predicate = Lookup::Gte.predicate(r#""year""#, RowValues::Int(1965));
        assert_eq!(predicate.sql, r#""year" >= %s"#);
        assert_eq!(predicate.params, vec![RowValues::Int(1965)]);
    }
}
