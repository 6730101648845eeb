// file: src/llm/mod.rs
// description: hosted LLM client and prompt construction module exports
// reference: internal module structure

pub mod client;
pub mod prompt;

pub use client::{ChatClient, ChatMessage, Completion, Usage};
pub use prompt::{DEFAULT_TEXT_QA_TEMPLATE, PromptTemplate};
