// file: src/parser/normalizer.rs
// description: cleanup of text extracted from pdf pages before chunking

use crate::parser::patterns::{EXCESS_BLANK_LINES, HYPHENATED_BREAK};

pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, content: &str) -> String {
        let mut normalized = self.normalize_control_chars(content);

        normalized = self.normalize_line_ends(&normalized);
        normalized = self.join_hyphenated_words(&normalized);
        normalized = self.collapse_blank_lines(&normalized);

        normalized.trim().to_string()
    }

    fn normalize_control_chars(&self, content: &str) -> String {
        content
            .replace("\r\n", "\n")
            .chars()
            .filter(|&c| c != '\0')
            .map(|c| match c {
                '\r' | '\u{c}' => '\n',
                '\u{a0}' => ' ',
                other => other,
            })
            .collect()
    }

    fn normalize_line_ends(&self, content: &str) -> String {
        content
            .lines()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn join_hyphenated_words(&self, content: &str) -> String {
        HYPHENATED_BREAK.replace_all(content, "$1$2").into_owned()
    }

    fn collapse_blank_lines(&self, content: &str) -> String {
        EXCESS_BLANK_LINES.replace_all(content, "\n\n").into_owned()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphenation_repair() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize("long con-\ntext window");
        assert_eq!(normalized, "long context window");
    }

    #[test]
    fn test_line_break_normalization() {
        let normalizer = TextNormalizer::new();
        let content = "Line 1   \r\n\n\n\n\u{c}Line 2\0";
        let normalized = normalizer.normalize(content);

        assert_eq!(normalized, "Line 1\n\nLine 2");
    }

    #[test]
    fn test_blank_input() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize(" \n\n \u{c} "), "");
    }
}
