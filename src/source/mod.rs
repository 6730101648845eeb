// file: src/source/mod.rs
// description: document source module exports
// reference: internal module structure

pub mod fetcher;

pub use fetcher::{DocumentFetcher, FetchedPdf};
