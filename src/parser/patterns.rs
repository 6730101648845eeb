// file: src/parser/patterns.rs
// description: compiled regex patterns for text cleanup, sentence splitting and term extraction
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Sentence terminator plus optional closing quote/bracket, then whitespace
    pub static ref SENTENCE_BOUNDARY: Regex = Regex::new(
        r#"[.!?]+["')\]]*\s+"#
    ).expect("SENTENCE_BOUNDARY regex is valid");

    pub static ref PARAGRAPH_BREAK: Regex = Regex::new(
        r"\n[ \t]*\n"
    ).expect("PARAGRAPH_BREAK regex is valid");

    // "con-\ntext" as laid out by pdf line wrapping
    pub static ref HYPHENATED_BREAK: Regex = Regex::new(
        r"(\p{L})-\n[ \t]*(\p{Ll})"
    ).expect("HYPHENATED_BREAK regex is valid");

    pub static ref EXCESS_BLANK_LINES: Regex = Regex::new(
        r"\n{3,}"
    ).expect("EXCESS_BLANK_LINES regex is valid");

    pub static ref TERM: Regex = Regex::new(
        r"[\p{L}\p{N}]+"
    ).expect("TERM regex is valid");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_boundary() {
        let text = "First one. Second (really!) two? \"Third.\" end";
        assert_eq!(SENTENCE_BOUNDARY.find_iter(text).count(), 4);
    }

    #[test]
    fn test_hyphenated_break_only_joins_lowercase_continuations() {
        assert!(HYPHENATED_BREAK.is_match("con-\ntext"));
        assert!(!HYPHENATED_BREAK.is_match("LLaMA-\n2"));
    }

    #[test]
    fn test_terms() {
        let terms: Vec<_> = TERM
            .find_iter("32,768-token context (LLaMA 2)")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(terms, vec!["32", "768", "token", "context", "LLaMA", "2"]);
    }
}
