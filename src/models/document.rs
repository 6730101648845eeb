// file: src/models/document.rs
// description: single concatenated document record built from extracted pdf pages
// reference: internal data structures

use crate::error::Result;
use crate::utils::Validator;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_url: String,
    pub text: String,
    pub content_hash: String,
    pub page_count: usize,
    pub byte_size: u64,
    /// Unix seconds
    pub fetched_at: u64,
}

impl Document {
    pub fn new(source_url: String, text: String, page_count: usize) -> Self {
        let content_hash = Self::compute_hash(&text);
        let byte_size = text.len() as u64;

        Self {
            source_url,
            text,
            content_hash,
            page_count,
            byte_size,
            fetched_at: chrono::Utc::now().timestamp().max(0) as u64,
        }
    }

    /// Concatenates page texts into one record; blank pages are dropped.
    pub fn from_pages(source_url: String, pages: &[String]) -> Result<Self> {
        let text = pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR);

        Validator::validate_content_not_empty(&text)?;

        Ok(Self::new(source_url, text, pages.len()))
    }

    pub fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn short_hash(&self) -> &str {
        &self.content_hash[..12]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    #[test]
    fn test_document_from_pages() {
        let pages = vec![
            "Effective Long-Context Scaling".to_string(),
            "   ".to_string(),
            "  context window of 32,768 tokens ".to_string(),
        ];
        let doc = Document::from_pages("https://arxiv.org/pdf/2309.16039.pdf".to_string(), &pages)
            .unwrap();

        assert_eq!(
            doc.text,
            "Effective Long-Context Scaling\n\ncontext window of 32,768 tokens"
        );
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.byte_size, doc.text.len() as u64);
        assert_eq!(doc.content_hash.len(), 64);
        assert_eq!(doc.short_hash().len(), 12);
    }

    #[test]
    fn test_empty_pages_rejected() {
        let pages = vec![String::new(), " \n ".to_string()];
        let err = Document::from_pages("file.pdf".to_string(), &pages).unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
    }

    #[test]
    fn test_hash_consistency() {
        let hash1 = Document::compute_hash("Test content");
        let hash2 = Document::compute_hash("Test content");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, Document::compute_hash("Other content"));
    }
}
