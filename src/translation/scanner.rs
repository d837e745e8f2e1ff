/// Lexical position while walking SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

pub(crate) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(crate) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(crate) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Advance the state machine past `bytes[idx]`.
///
/// Returns the next state and how many extra bytes the caller must skip (doubled quotes,
/// two-byte comment delimiters). Only called for bytes that the caller does not consume
/// itself.
pub(crate) fn step(state: State, bytes: &[u8], idx: usize) -> (State, usize) {
    let b = bytes[idx];
    match state {
        State::Normal => match b {
            b'\'' => (State::SingleQuoted, 0),
            b'"' => (State::DoubleQuoted, 0),
            _ if is_line_comment_start(bytes, idx) => (State::LineComment, 1),
            _ if is_block_comment_start(bytes, idx) => (State::BlockComment(1), 1),
            _ => (State::Normal, 0),
        },
        State::SingleQuoted => {
            if b == b'\'' {
                if bytes.get(idx + 1) == Some(&b'\'') {
                    (State::SingleQuoted, 1)
                } else {
                    (State::Normal, 0)
                }
            } else {
                (state, 0)
            }
        }
        State::DoubleQuoted => {
            if b == b'"' {
                if bytes.get(idx + 1) == Some(&b'"') {
                    (State::DoubleQuoted, 1)
                } else {
                    (State::Normal, 0)
                }
            } else {
                (state, 0)
            }
        }
        State::LineComment => {
            if b == b'\n' {
                (State::Normal, 0)
            } else {
                (state, 0)
            }
        }
        State::BlockComment(depth) => {
            if is_block_comment_start(bytes, idx) {
                (State::BlockComment(depth + 1), 1)
            } else if is_block_comment_end(bytes, idx) {
                if depth == 1 {
                    (State::Normal, 1)
                } else {
                    (State::BlockComment(depth - 1), 1)
                }
            } else {
                (state, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubled_quotes_stay_inside_literal() {
        let bytes = b"'it''s'";
        let (state, skip) = step(State::Normal, bytes, 0);
        assert_eq!((state, skip), (State::SingleQuoted, 0));
        assert_eq!(step(State::SingleQuoted, bytes, 3), (State::SingleQuoted, 1));
        assert_eq!(step(State::SingleQuoted, bytes, 6), (State::Normal, 0));
    }

    #[test]
    fn nested_block_comments() {
        let bytes = b"/* /* */ */";
        assert_eq!(step(State::Normal, bytes, 0), (State::BlockComment(1), 1));
        assert_eq!(step(State::BlockComment(1), bytes, 3), (State::BlockComment(2), 1));
        assert_eq!(step(State::BlockComment(2), bytes, 6), (State::BlockComment(1), 1));
        assert_eq!(step(State::BlockComment(1), bytes, 9), (State::Normal, 1));
    }
}
