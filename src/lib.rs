//! # Document QA
//!
//! A retrieval-augmented document question-answering service.
//!
//! Heterogeneous documents (PDF, Word, Excel, PowerPoint, CSV, HTML, JSON,
//! XML, Markdown, plain text, images) are extracted to text, split into
//! overlapping chunks, embedded, and stored in a persistent vector index.
//! Questions are classified by intent and routed to summarization, answer
//! refinement, or grounded question answering over the retrieved chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────┐
//! │  Bytes   │──▶│   Pipeline     │──▶│  SQLite   │
//! │ file/URL │   │ Extract+Chunk │   │  vectors  │
//! └──────────┘   │    +Embed     │   └────┬─────┘
//!                └───────────────┘        │
//!                     ┌───────────────────┤
//!                     ▼                   ▼
//!                ┌──────────┐       ┌──────────┐
//!                │   CLI    │       │   HTTP   │
//!                │  (dqa)   │       │  (axum)  │
//!                └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dqa init                          # create database
//! dqa ingest ./handbook.pdf         # ingest a document
//! dqa ask "What is the PTO policy?" # grounded question answering
//! dqa serve api                     # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction |
//! | [`chunk`] | Overlapping-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Generative model abstraction |
//! | [`store`] | Vector store trait + SQLite / in-memory backends |
//! | [`cache`] | Per-tenant last-answer cache |
//! | [`ask`] | Intent classification and answer routing |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod server;
pub mod store;
