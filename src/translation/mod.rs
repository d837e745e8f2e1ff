//! Text-level statement preparation: placeholder translation and statement cleanup.
//!
//! Statements arrive with portable `%s` markers; the engine's ODBC layer wants `?`. The
//! engine also rejects a trailing `;` and embedded line breaks in some contexts.

use std::borrow::Cow;

mod scanner;

pub(crate) use scanner::State;
pub(crate) use scanner::step;

/// Translate portable `%s` markers into the engine's positional `?` marker.
///
/// Markers inside quoted text and comments are left alone. When the statement carries
/// parameters, `%%` collapses to a literal `%` (the portable escaping for percent signs).
///
/// ```rust
/// use openedge_sql_middleware::translation::translate_placeholders;
///
/// let sql = "SELECT \"a\" FROM \"t\" WHERE \"b\" = %s AND \"c\" LIKE '10%%'";
/// assert_eq!(
///     translate_placeholders(sql, true),
///     "SELECT \"a\" FROM \"t\" WHERE \"b\" = ? AND \"c\" LIKE '10%'"
/// );
/// ```
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn translate_placeholders(sql: &str, has_params: bool) -> Cow<'_, str> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        let percent_context = matches!(state, State::Normal | State::SingleQuoted);
        if b == b'%' && percent_context {
            let next = bytes.get(idx + 1).copied();
            let replacement = match next {
                Some(b's') if state == State::Normal => Some("?"),
                Some(b'%') if has_params => Some("%"),
                Some(b'%') => {
                    idx += 2;
                    continue;
                }
                _ => None,
            };
            if let Some(replacement) = replacement {
                let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                buf.push_str(&sql[copied_to..idx]);
                buf.push_str(replacement);
                idx += 2;
                copied_to = idx;
                continue;
            }
        }

        let (next_state, skip) = step(state, bytes, idx);
        state = next_state;
        idx += 1 + skip;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

/// Whether byte offset `pos` of `sql` falls in plain SQL, outside quoted text and comments.
pub(crate) fn is_code_at(sql: &str, pos: usize) -> bool {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut idx = 0;
    while idx < pos && idx < bytes.len() {
        let (next_state, skip) = step(state, bytes, idx);
        state = next_state;
        idx += 1 + skip;
    }
    idx == pos && state == State::Normal
}

/// Count the portable `%s` markers outside quoted text and comments.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut idx = 0;
    let mut count = 0;

    while idx < bytes.len() {
        if state == State::Normal && bytes[idx] == b'%' {
            match bytes.get(idx + 1) {
                Some(b's') => {
                    count += 1;
                    idx += 2;
                    continue;
                }
                Some(b'%') => {
                    idx += 2;
                    continue;
                }
                _ => {}
            }
        }
        let (next_state, skip) = step(state, bytes, idx);
        state = next_state;
        idx += 1 + skip;
    }
    count
}

/// Strip a trailing statement terminator, `--` comments and embedded line breaks.
///
/// A line break that separated two tokens becomes a single space so the tokens do not fuse.
/// Line comments are dropped rather than joined, otherwise they would swallow the rest of
/// the statement.
#[must_use]
pub fn clean_statement(sql: &str) -> Cow<'_, str> {
    let trimmed = strip_terminator(sql);
    if !trimmed.contains(['\n', '\r']) {
        return Cow::Borrowed(trimmed);
    }

    let bytes = trimmed.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut state = State::Normal;
    let mut pending_break = false;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if b == b'\n' || b == b'\r' {
            if state == State::LineComment {
                state = State::Normal;
            }
            pending_break = true;
            idx += 1;
            continue;
        }
        if state == State::LineComment {
            idx += 1;
            continue;
        }
        if pending_break {
            if out.last().is_some_and(|p| !p.is_ascii_whitespace()) && !b.is_ascii_whitespace() {
                out.push(b' ');
            }
            pending_break = false;
        }

        let (next_state, skip) = step(state, bytes, idx);
        if next_state != State::LineComment {
            out.extend_from_slice(&bytes[idx..=idx + skip]);
        }
        state = next_state;
        idx += 1 + skip;
    }

    // Only ASCII bytes were removed or inserted, so `out` is still valid UTF-8.
    let cleaned = String::from_utf8_lossy(&out);
    Cow::Owned(strip_terminator(&cleaned).to_string())
}

fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim_end();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}
