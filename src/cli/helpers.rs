//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::{Config, Context, TermId};

/// Load the layered config, applying global flags on top
pub fn load_config(global: &GlobalOpts) -> Result<Config> {
    let mut config = Config::load(global.config.as_deref()).into_diagnostic()?;
    if global.offline {
        config.offline = true;
    }
    Ok(config)
}

/// Build the runtime context; configuration problems are fatal here
pub fn open_context(global: &GlobalOpts) -> Result<Context> {
    Context::init(load_config(global)?).into_diagnostic()
}

/// Parse a term ID, reporting malformed input the same way as an unknown term
pub fn parse_term_id(raw: &str) -> Option<TermId> {
    TermId::parse(raw).ok()
}

/// Truncate a string to max_len, adding "..." if truncated
///
/// Cuts on a character boundary so multi-byte names stay valid.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Make a value safe for a single TSV cell
pub fn escape_tsv(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("αβγδεζηθ", 5), "αβ...");
    }

    #[test]
    fn test_escape_tsv() {
        assert_eq!(escape_tsv("a\tb\nc"), "a b c");
        assert_eq!(escape_tsv("plain"), "plain");
    }

    #[test]
    fn test_parse_term_id() {
        assert!(parse_term_id("CL:0000062").is_some());
        assert!(parse_term_id("CL0000062").is_none());
    }
}
