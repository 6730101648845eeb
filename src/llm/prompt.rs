// file: src/llm/prompt.rs
// description: question-answering prompt template and retrieved-context packing
// reference: placeholder substitution in a single pass over the template

use crate::error::{RagError, Result};
use crate::models::SearchResult;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

pub const CONTEXT_PLACEHOLDER: &str = "context_str";
pub const QUERY_PLACEHOLDER: &str = "query_str";
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub const DEFAULT_TEXT_QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("PLACEHOLDER regex is valid");
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new() -> Self {
        Self {
            template: DEFAULT_TEXT_QA_TEMPLATE.to_string(),
        }
    }

    pub fn with_custom_template(template: String) -> Result<Self> {
        for required in [CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER] {
            if !template.contains(&format!("{{{}}}", required)) {
                return Err(RagError::Config(format!(
                    "qa_template is missing the {{{}}} placeholder",
                    required
                )));
            }
        }
        Ok(Self { template })
    }

    pub fn format(&self, context: &str, query: &str) -> String {
        let mut values = HashMap::new();
        values.insert(CONTEXT_PLACEHOLDER.to_string(), context.to_string());
        values.insert(QUERY_PLACEHOLDER.to_string(), query.to_string());
        self.format_with_map(&values)
    }

    /// Substituted values are never re-scanned, so braces inside retrieved
    /// text survive verbatim. Unknown placeholders are left as written.
    pub fn format_with_map(&self, values: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| {
                values
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Joins retrieved chunk texts in rank order, cut to `max_chars`
    /// characters on a char boundary.
    pub fn build_context(results: &[SearchResult], max_chars: usize) -> String {
        let joined = results
            .iter()
            .map(|r| r.text().trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        match joined.char_indices().nth(max_chars) {
            None => joined,
            Some((byte_idx, _)) => joined[..byte_idx].to_string(),
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use pretty_assertions::assert_eq;

    fn hit(index: usize, text: &str) -> SearchResult {
        SearchResult::new(Chunk::new("h", "u", index, text.to_string()), 0.5, None)
    }

    #[test]
    fn test_default_template_layout() {
        let prompt = PromptTemplate::new().format(
            "LLaMA 2 Long reaches 32,768 tokens.",
            "What's the maximum context window of LLama 2 long context?",
        );

        assert_eq!(
            prompt,
            "Context information is below.\n\
             ---------------------\n\
             LLaMA 2 Long reaches 32,768 tokens.\n\
             ---------------------\n\
             Given the context information and not prior knowledge, answer the query.\n\
             Query: What's the maximum context window of LLama 2 long context?\n\
             Answer: "
        );
    }

    #[test]
    fn test_braces_in_values_are_not_expanded() {
        let template =
            PromptTemplate::with_custom_template("{context_str} | {query_str}".to_string())
                .unwrap();
        let prompt = template.format("set {query_str} = 1", "why {context_str}?");
        assert_eq!(prompt, "set {query_str} = 1 | why {context_str}?");
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        let template =
            PromptTemplate::with_custom_template("{system} {context_str} {query_str}".to_string())
                .unwrap();
        assert_eq!(template.format("c", "q"), "{system} c q");
    }

    #[test]
    fn test_custom_template_requires_placeholders() {
        assert!(PromptTemplate::with_custom_template("Answer: {query_str}".to_string()).is_err());
        assert!(PromptTemplate::with_custom_template("{context_str}".to_string()).is_err());
    }

    #[test]
    fn test_build_context_joins_and_truncates() {
        let results = vec![hit(0, " first chunk "), hit(1, ""), hit(2, "second chunk")];
        assert_eq!(
            PromptTemplate::build_context(&results, 1000),
            "first chunk\n\nsecond chunk"
        );
        assert_eq!(PromptTemplate::build_context(&results, 5), "first");
        assert_eq!(PromptTemplate::build_context(&[], 10), "");
    }
}
