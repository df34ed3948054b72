//! Structured error type for UCI command handling and engine setup.
//!
//! The teacher has no `thiserror` dependency and reports failures as plain
//! `String`s (see `Board::validate`); this keeps that pattern but gives
//! callers a matchable enum instead of an opaque string, implementing
//! `Display`/`std::error::Error` by hand.

use std::fmt;

#[derive(Debug, Clone)]
pub enum EngineError {
    /// `position fen ...` failed FEN validation. Non-fatal: surfaced as
    /// `info string` and the command is ignored.
    InvalidFen(String),
    /// A UCI move token does not correspond to any legal move from the
    /// current position. Non-fatal: ignored with a log note.
    InvalidMove(String),
    /// `setoption` named an option this engine doesn't expose, or gave it a
    /// value outside its declared range. Non-fatal: logged, no state change.
    InvalidOption { name: String, reason: String },
    /// Opening a Polyglot book failed, or its size wasn't a multiple of the
    /// 16-byte record. Non-fatal: logged, book use disabled for the session.
    BookIoError(String),
    /// The transposition table allocator returned null. Fatal: the process
    /// exits with this diagnostic.
    TTAllocFailure { size_mb: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidFen(reason) => write!(f, "invalid FEN: {reason}"),
            EngineError::InvalidMove(mv) => write!(f, "invalid move: {mv}"),
            EngineError::InvalidOption { name, reason } => {
                write!(f, "invalid option '{name}': {reason}")
            }
            EngineError::BookIoError(reason) => write!(f, "opening book I/O error: {reason}"),
            EngineError::TTAllocFailure { size_mb } => {
                write!(f, "failed to allocate {size_mb} MB transposition table")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<String> for EngineError {
    fn from(reason: String) -> Self {
        EngineError::InvalidFen(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_option_name_and_reason() {
        let err = EngineError::InvalidOption {
            name: "Hash".to_string(),
            reason: "value 999999 exceeds max 131072".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Hash"));
        assert!(msg.contains("131072"));
    }

    #[test]
    fn from_string_wraps_as_invalid_fen() {
        let err: EngineError = "8 ranks expected".to_string().into();
        assert!(matches!(err, EngineError::InvalidFen(_)));
    }
}
