//! # JeongirIt Core
//!
//! Runtime-agnostic logic for the JeongirIt assistant: data models, the
//! error taxonomy, text chunking, the per-request similarity index and
//! retriever, answer synthesis, chat orchestration, and the electrical
//! calculators.
//!
//! Providers are reached only through the [`embedding::Embedder`] and
//! [`llm::ChatModel`] traits. This crate has no tokio, HTTP, or
//! filesystem dependencies.

pub mod calc;
pub mod chat;
pub mod chunk;
pub mod circuit;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod retriever;
pub mod schematic;
pub mod synth;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
