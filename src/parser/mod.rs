// file: src/parser/mod.rs
// description: pdf text extraction, cleanup and chunking module exports
// reference: internal module structure

pub mod chunker;
pub mod normalizer;
pub mod patterns;
pub mod pdf;

pub use chunker::SentenceSplitter;
pub use normalizer::TextNormalizer;
pub use pdf::PdfExtractor;
