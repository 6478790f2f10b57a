//! # JeongirIt
//!
//! Backend for an electrical-engineering study assistant: chat with
//! follow-up suggestions, question answering over an uploaded PDF, and a
//! set of circuit calculators, served over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │  HTTP (axum) │──▶│   Pipeline   │──▶│  jeongirit-core  │
//! │  CLI (clap)  │   │ extract+chunk│   │ index/synth/chat │
//! └──────────────┘   └──────┬───────┘   └────────┬─────────┘
//!                           │                    │
//!                           ▼                    ▼
//!                     pdf-extract        OpenAI-compatible API
//!                                        (embeddings + chat)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`openai`] | Shared HTTP client and retry policy |
//! | [`embedding`] | OpenAI-compatible embedding provider |
//! | [`completion`] | OpenAI-compatible chat-completion provider |
//! | [`extract`] | PDF / text page extraction |
//! | [`pipeline`] | Document question answering |
//! | [`server`] | HTTP API |

pub mod completion;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod openai;
pub mod pipeline;
pub mod server;
