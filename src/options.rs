//! UCI option table and `setoption` handling.

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct UciOptions {
    pub threads: usize,
    pub hash_mb: usize,
    pub hash_times_threads: bool,
    pub clear_hash_on_new_game: bool,
    pub ponder: bool,
    pub uci_chess960: bool,
    pub show_cpu_usage: bool,
    pub use_book: bool,
    pub book: Option<String>,
    pub best_book_move: bool,
}

impl Default for UciOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 256,
            hash_times_threads: true,
            clear_hash_on_new_game: false,
            ponder: false,
            uci_chess960: false,
            show_cpu_usage: false,
            use_book: false,
            book: None,
            best_book_move: false,
        }
    }
}

const MIN_THREADS: usize = 1;
const MAX_THREADS: usize = 512;
const MIN_HASH_MB: usize = 1;
const MAX_HASH_MB: usize = 131_072;

impl UciOptions {
    /// Emits the `option name ... type ...` lines expected after `uci`.
    pub fn describe() -> Vec<String> {
        vec![
            format!("option name Threads type spin default 1 min {MIN_THREADS} max {MAX_THREADS}"),
            format!("option name Hash type spin default 256 min {MIN_HASH_MB} max {MAX_HASH_MB}"),
            "option name Hash * Threads type check default true".to_string(),
            "option name Clear Hash type button".to_string(),
            "option name Clear hash on new game type check default false".to_string(),
            "option name Ponder type check default false".to_string(),
            "option name UCI_Chess960 type check default false".to_string(),
            "option name Show CPU usage type check default false".to_string(),
            "option name Use book type check default false".to_string(),
            "option name Books type combo default <empty>".to_string(),
            "option name Best Book Move type check default false".to_string(),
        ]
    }

    /// Applies `setoption name <name> value <value>`. `parts` is the
    /// whitespace-split command line, e.g. `["setoption", "name", "Hash",
    /// "value", "512"]`.
    pub fn apply(&mut self, parts: &[&str]) -> Result<(), EngineError> {
        let name_idx = parts
            .iter()
            .position(|&p| p == "name")
            .ok_or_else(|| EngineError::InvalidOption {
                name: parts.join(" "),
                reason: "missing 'name' token".to_string(),
            })?;
        let value_idx = parts.iter().position(|&p| p == "value");

        let name_end = value_idx.unwrap_or(parts.len());
        let name = parts[name_idx + 1..name_end].join(" ");
        let value = value_idx.map(|i| parts[i + 1..].join(" "));

        match name.as_str() {
            "Threads" => self.threads = parse_bounded(&name, value, MIN_THREADS, MAX_THREADS)?,
            "Hash" => self.hash_mb = parse_bounded(&name, value, MIN_HASH_MB, MAX_HASH_MB)?,
            "Hash * Threads" => self.hash_times_threads = parse_bool(&name, value)?,
            "Clear Hash" => {} // button: handled by the caller clearing the TT, no state here
            "Clear hash on new game" => self.clear_hash_on_new_game = parse_bool(&name, value)?,
            "Ponder" => self.ponder = parse_bool(&name, value)?,
            "UCI_Chess960" => self.uci_chess960 = parse_bool(&name, value)?,
            "Show CPU usage" => self.show_cpu_usage = parse_bool(&name, value)?,
            "Use book" => self.use_book = parse_bool(&name, value)?,
            "Books" => self.book = value.filter(|v| !v.is_empty() && v != "<empty>"),
            "Best Book Move" => self.best_book_move = parse_bool(&name, value)?,
            other => {
                return Err(EngineError::InvalidOption {
                    name: other.to_string(),
                    reason: "unknown option".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool, EngineError> {
    match value.as_deref() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        other => Err(EngineError::InvalidOption {
            name: name.to_string(),
            reason: format!("expected true/false, got {other:?}"),
        }),
    }
}

fn parse_bounded(
    name: &str,
    value: Option<String>,
    min: usize,
    max: usize,
) -> Result<usize, EngineError> {
    let value = value.ok_or_else(|| EngineError::InvalidOption {
        name: name.to_string(),
        reason: "missing value".to_string(),
    })?;
    let parsed: usize = value.parse().map_err(|_| EngineError::InvalidOption {
        name: name.to_string(),
        reason: format!("'{value}' is not an integer"),
    })?;
    if parsed < min || parsed > max {
        return Err(EngineError::InvalidOption {
            name: name.to_string(),
            reason: format!("{parsed} outside range {min}..{max}"),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_the_spec_table() {
        let opts = UciOptions::default();
        assert_eq!(opts.threads, 1);
        assert_eq!(opts.hash_mb, 256);
        assert!(opts.hash_times_threads);
        assert!(!opts.use_book);
    }

    #[test]
    fn setoption_updates_hash_within_range() {
        let mut opts = UciOptions::default();
        opts.apply(&["setoption", "name", "Hash", "value", "512"])
            .unwrap();
        assert_eq!(opts.hash_mb, 512);
    }

    #[test]
    fn setoption_rejects_out_of_range_hash() {
        let mut opts = UciOptions::default();
        let err = opts
            .apply(&["setoption", "name", "Hash", "value", "999999"])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOption { .. }));
    }

    #[test]
    fn setoption_handles_multi_word_option_names() {
        let mut opts = UciOptions::default();
        opts.apply(&[
            "setoption", "name", "Clear", "hash", "on", "new", "game", "value", "true",
        ])
        .unwrap();
        assert!(opts.clear_hash_on_new_game);
    }

    #[test]
    fn setoption_rejects_unknown_option() {
        let mut opts = UciOptions::default();
        let err = opts
            .apply(&["setoption", "name", "NotAnOption", "value", "1"])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOption { .. }));
    }
}
