// file: src/models/answer.rs
// description: response returned by the query engine together with its sources

use crate::models::SearchResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub response: String,
    pub model: String,
    pub sources: Vec<SearchResult>,
    pub elapsed_ms: u64,
}

impl Answer {
    pub fn format_sources(&self, max_content_len: usize) -> String {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, source)| format!("{}. {}", i + 1, source.format_summary(max_content_len)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    #[test]
    fn test_format_sources_numbers_hits() {
        let answer = Answer {
            question: "q".to_string(),
            response: "r".to_string(),
            model: "m".to_string(),
            sources: vec![
                SearchResult::new(Chunk::new("h", "u", 0, "first".to_string()), 0.9, None),
                SearchResult::new(Chunk::new("h", "u", 1, "second".to_string()), 0.5, None),
            ],
            elapsed_ms: 10,
        };

        let text = answer.format_sources(80);
        assert!(text.starts_with("1. Score: 0.9000"));
        assert!(text.contains("2. Score: 0.5000 | chunk #1"));
    }
}
