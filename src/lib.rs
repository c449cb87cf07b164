//! # Lexvox
//!
//! A retrieval-assisted legal voice answering service.
//!
//! Lexvox turns a free-text legal question into a long-form written answer
//! and a short spoken-style answer, grounded in excerpts retrieved from a
//! local full-text index of statute text, and hands the spoken answer to a
//! hosted voice synthesizer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │  e-Gov    │──▶│ Indexer   │──▶│  SQLite    │
//! │  statutes │   │ (windows) │   │  FTS5      │
//! └──────────┘   └──────────┘   └────┬──────┘
//!                                    │
//!   question ──▶ Retriever ──▶ Context ──▶ [LLM ×2] ──▶ Sanitizer ──▶ [TTS]
//!                                    │
//!                      ┌─────────────┤
//!                      ▼             ▼
//!                 ┌─────────┐  ┌─────────┐
//!                 │   CLI    │  │  HTTP    │
//!                 │ (lexvox) │  │ (axum)   │
//!                 └─────────┘  └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexvox init                                   # create database
//! lexvox fetch-law "労働基準法" sources/rouki.xml  # download statute XML
//! lexvox index sources/rouki.xml                # chunk + index it
//! lexvox search "残業"                           # ranked excerpts
//! lexvox serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`indexer`] | Source normalization and overlapping-window chunking |
//! | [`search`] | Ranked FTS5 retrieval |
//! | [`context`] | Evidence block assembly |
//! | [`vague`] | Under-specified question heuristic |
//! | [`sanitize`] | Voice-draft post-processing rules |
//! | [`generation`] | Generation collaborator adapter |
//! | [`synthesis`] | Speech-synthesis collaborator adapter |
//! | [`egov`] | e-Gov statute retrieval |
//! | [`pipeline`] | Request orchestration |
//! | [`server`] | HTTP API and LINE webhook |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod context;
pub mod db;
pub mod egov;
pub mod error;
pub mod generation;
pub mod indexer;
pub mod migrate;
pub mod pipeline;
pub mod sanitize;
pub mod search;
pub mod server;
pub mod synthesis;
pub mod vague;
