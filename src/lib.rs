//! # docchat
//!
//! A retrieval-augmented document chat service.
//!
//! docchat lets a user upload documents (PDF, plain text, Markdown), builds
//! a per-document semantic index in the background, and answers natural-
//! language questions by retrieving relevant passages across a session's
//! documents and conditioning a language model on them.
//!
//! ## Architecture
//!
//! ```text
//! build path:
//! ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌─────────────┐
//! │  upload   │──▶│ extract │──▶│  chunk  │──▶│ index build │
//! │ (pending) │   │ pdf/txt │   │ overlap │   │ per document│
//! └──────────┘   └─────────┘   └─────────┘   └─────────────┘
//!
//! query path:
//! ┌────────┐   ┌───────────┐   ┌────────┐   ┌───────┐   ┌─────────┐
//! │ search │──▶│ merge +    │──▶│ prompt │──▶│ model │──▶│ persist │
//! │ per doc│   │ rank (k)   │   │ asm    │   │ call  │   │ + reply │
//! └────────┘   └───────────┘   └────────┘   └───────┘   └─────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types and API shapes |
//! | [`extract`] | Text extraction (PDF, txt, md) |
//! | [`chunk`] | Overlapping line-boundary chunking |
//! | [`embedding`] | Embedding backend abstraction |
//! | [`index`] | Per-document vector index engine |
//! | [`retrieval`] | Cross-document retrieval merging |
//! | [`prompt`] | Prompt assembly |
//! | [`llm`] | Language-model backend |
//! | [`ingest`] | Upload and background indexing |
//! | [`chat`] | Answer orchestration |
//! | [`store`] | Document/session/message CRUD |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod store;
