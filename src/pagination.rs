//! Row-window selection. The engine knows `SELECT TOP n` and `OFFSET m ROWS FETCH NEXT n
//! ROWS ONLY`, but the two forms cannot be combined in one statement.

/// Row count standing in for "no upper bound" when only an offset is requested.
pub const NO_LIMIT_VALUE: u64 = 2_147_483_647;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    None,
    Top(u64),
    OffsetFetch { offset: u64, fetch: u64 },
}

impl Pagination {
    /// Pick the pagination form for the half-open row window `[low_mark, high_mark)`.
    #[must_use]
    pub fn from_marks(low_mark: u64, high_mark: Option<u64>) -> Self {
        if low_mark > 0 {
            let upper = high_mark.unwrap_or(NO_LIMIT_VALUE);
            Pagination::OffsetFetch {
                offset: low_mark,
                fetch: upper.saturating_sub(low_mark),
            }
        } else if let Some(high) = high_mark {
            Pagination::Top(high)
        } else {
            Pagination::None
        }
    }

    /// Modifier that goes right after the `SELECT` keyword, e.g. `TOP 10`.
    #[must_use]
    pub fn select_prefix(&self) -> Option<String> {
        match self {
            Pagination::Top(n) => Some(format!("TOP {n}")),
            _ => None,
        }
    }

    /// Clause appended after `ORDER BY`.
    #[must_use]
    pub fn trailing_clause(&self) -> Option<String> {
        match self {
            Pagination::OffsetFetch { offset, fetch } => {
                Some(format!("OFFSET {offset} ROWS FETCH NEXT {fetch} ROWS ONLY"))
            }
            _ => None,
        }
    }
}
