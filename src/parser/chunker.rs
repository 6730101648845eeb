// file: src/parser/chunker.rs
// description: sentence-aware splitting of a document into overlapping chunks
// reference: sizes are counted in whitespace-separated words

use crate::error::{RagError, Result};
use crate::parser::patterns::{PARAGRAPH_BREAK, SENTENCE_BOUNDARY};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    words: usize,
}

impl Sentence {
    fn from_words(words: &[&str]) -> Self {
        Self {
            text: words.join(" "),
            words: words.len(),
        }
    }
}

/// Packs whole sentences into chunks of at most `chunk_size` words.
///
/// Consecutive chunks share the trailing sentences of the previous chunk,
/// up to `chunk_overlap` words. Sentences longer than a chunk are cut into
/// word windows.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let sentences = self.split_sentences(text);
        let mut chunks = Vec::new();
        let mut current: Vec<Sentence> = Vec::new();
        let mut current_words = 0;

        for sentence in sentences {
            if current_words + sentence.words > self.chunk_size && !current.is_empty() {
                chunks.push(Self::join(&current));

                current = self.overlap_tail(&current, sentence.words);
                current_words = current.iter().map(|s| s.words).sum();
            }

            current_words += sentence.words;
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(Self::join(&current));
        }

        debug!(
            "Split {} chars into {} chunks (size {}, overlap {})",
            text.len(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );
        chunks
    }

    /// Trailing sentences carried into the next chunk, trimmed from the front
    /// until the incoming sentence still fits.
    fn overlap_tail(&self, current: &[Sentence], incoming_words: usize) -> Vec<Sentence> {
        let mut tail: Vec<Sentence> = Vec::new();
        let mut tail_words = 0;

        for sentence in current.iter().rev() {
            if tail_words + sentence.words > self.chunk_overlap {
                break;
            }
            tail_words += sentence.words;
            tail.push(sentence.clone());
        }
        tail.reverse();

        while !tail.is_empty() && tail_words + incoming_words > self.chunk_size {
            tail_words -= tail.remove(0).words;
        }

        tail
    }

    fn split_sentences(&self, text: &str) -> Vec<Sentence> {
        let mut sentences = Vec::new();

        for paragraph in PARAGRAPH_BREAK.split(text) {
            let mut start = 0;
            for boundary in SENTENCE_BOUNDARY.find_iter(paragraph) {
                let end = boundary.start() + boundary.as_str().trim_end().len();
                self.push_sentence(&paragraph[start..end], &mut sentences);
                start = boundary.end();
            }
            self.push_sentence(&paragraph[start..], &mut sentences);
        }

        sentences
    }

    fn push_sentence(&self, raw: &str, sentences: &mut Vec<Sentence>) {
        let words: Vec<&str> = raw.split_whitespace().collect();
        for window in words.chunks(self.chunk_size) {
            sentences.push(Sentence::from_words(window));
        }
    }

    fn join(sentences: &[Sentence]) -> String {
        sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word_count(chunk: &str) -> usize {
        chunk.split_whitespace().count()
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let splitter = SentenceSplitter::default();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("  \n\n \t ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = SentenceSplitter::default();
        let chunks = splitter.split("LLaMA 2 Long supports\n long context. It was trained on 32,768 tokens.");
        assert_eq!(
            chunks,
            vec!["LLaMA 2 Long supports long context. It was trained on 32,768 tokens."]
        );
    }

    #[test]
    fn test_sentences_are_packed_without_overlap() {
        let splitter = SentenceSplitter::new(10, 0).unwrap();
        let text = "a b c one. d e f two. g h i three.";
        let chunks = splitter.split(text);
        assert_eq!(chunks, vec!["a b c one. d e f two.", "g h i three."]);
    }

    #[test]
    fn test_trailing_sentences_overlap() {
        let splitter = SentenceSplitter::new(10, 4).unwrap();
        let text = "a b c one. d e f two. g h i three.";
        let chunks = splitter.split(text);
        assert_eq!(
            chunks,
            vec!["a b c one. d e f two.", "d e f two. g h i three."]
        );
    }

    #[test]
    fn test_overlap_dropped_when_sentence_would_not_fit() {
        let splitter = SentenceSplitter::new(6, 3).unwrap();
        let text = "a b. c d e f g h.";
        let chunks = splitter.split(text);
        assert_eq!(chunks, vec!["a b.", "c d e f g h."]);
    }

    #[test]
    fn test_long_sentence_split_into_windows() {
        let splitter = SentenceSplitter::new(3, 0).unwrap();
        let chunks = splitter.split("one two three four five six seven");
        assert_eq!(chunks, vec!["one two three", "four five six", "seven"]);
    }

    #[test]
    fn test_paragraph_break_ends_sentence() {
        let splitter = SentenceSplitter::new(4, 0).unwrap();
        let chunks = splitter.split("Abstract without period\n\nIntroduction starts here");
        assert_eq!(
            chunks,
            vec!["Abstract without period", "Introduction starts here"]
        );
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let splitter = SentenceSplitter::new(12, 5).unwrap();
        let text = "We present a series of long-context LLMs. They support effective context windows \
                    of up to 32,768 tokens. Our model series are built through continual pretraining \
                    from Llama 2 with longer training sequences and on a dataset where long texts are \
                    upsampled! We perform extensive evaluation? Yes.";

        let chunks = splitter.split(text);
        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
            assert!(word_count(chunk) <= 12, "chunk too long: {}", chunk);
        }
        assert!(chunks.iter().any(|c| c.contains("32,768")));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(SentenceSplitter::new(0, 0).is_err());
        assert!(SentenceSplitter::new(5, 5).is_err());
        assert!(SentenceSplitter::new(5, 4).is_ok());
    }
}
