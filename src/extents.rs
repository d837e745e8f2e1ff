//! Extent (multi-valued) column codec.
//!
//! The engine exposes an `EXTENT n` field as one character column whose elements are joined
//! with `;`. A `;` inside an element is written `~;` and a `~` is written `~~`:
//!
//! ```rust
//! use openedge_sql_middleware::extents::{decode, encode};
//!
//! let values = vec!["AAA;BBB".to_string(), "CCC".to_string()];
//! assert_eq!(encode(&values), "AAA~;BBB;CCC");
//! assert_eq!(decode("AAA~;BBB;CCC"), values);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::types::RowValues;

pub const SEPARATOR: char = ';';
pub const ESCAPE: char = '~';

/// Join extent elements into the engine's delimited representation.
#[must_use]
pub fn encode<S: AsRef<str>>(values: &[S]) -> String {
    let capacity = values.iter().map(|v| v.as_ref().len() + 1).sum();
    let mut out = String::with_capacity(capacity);
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            out.push(SEPARATOR);
        }
        // `~` first, otherwise the escape we add for `;` would be doubled.
        let escaped = value
            .as_ref()
            .replace(ESCAPE, "~~")
            .replace(SEPARATOR, "~;");
        out.push_str(&escaped);
    }
    out
}

/// Split the engine's delimited representation back into extent elements.
///
/// Empty input yields a single empty element. A `~` that does not start a known escape is
/// kept literally, which is how the engine reports unescaped tildes.
#[must_use]
pub fn decode(text: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.peek() {
                Some(&next) if next == ESCAPE || next == SEPARATOR => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push(ESCAPE),
            },
            SEPARATOR => values.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    values.push(current);
    values
}

/// Owned extent value, convertible to and from the text column representation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtentValue(pub Vec<String>);

impl ExtentValue {
    #[must_use]
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode an extent from a result value. Only text values carry extents.
    #[must_use]
    pub fn from_row_value(value: &RowValues) -> Option<Self> {
        value.as_text().map(|text| Self(decode(text)))
    }
}

impl fmt::Display for ExtentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl FromStr for ExtentValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(decode(s)))
    }
}

impl From<ExtentValue> for RowValues {
    fn from(value: ExtentValue) -> Self {
        RowValues::Text(encode(&value.0))
    }
}
