//! # Tour Scout
//!
//! A query-to-card recommendation pipeline over the Korea Tourism API.
//!
//! Tour Scout turns a free-text Korean travel query into a short list of
//! tourist-site cards by chaining a language-model extraction call and the
//! KorService lookup endpoints, with a flat-file embedding cache to avoid
//! redundant model calls on repeated queries.
//!
//! ## Pipeline
//!
//! ```text
//! ┌───────┐   ┌───────────┐   ┌────────────┐   ┌────────────┐   ┌───────┐
//! │ query │──▶│ extract    │──▶│ region code │──▶│ listing +  │──▶│ cards │
//! │ text  │   │ region/cat │   │ resolution  │   │ enrichment │   │       │
//! └───────┘   └───────────┘   └────────────┘   └────────────┘   └───────┘
//!      │
//!      ▼
//! ┌──────────────────┐
//! │ embedding cache  │  append-only JSONL, cosine lookup
//! └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! export TOUR_API_KEY=...
//! tscout recommend "제주 자연"
//! tscout extract "부산 박물관"
//! tscout regions
//! tscout cache stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`llm`] | Chat-completion transport |
//! | [`extract`] | Field extraction and one-line summaries |
//! | [`embedding`] | Embedding client abstraction |
//! | [`cache`] | Append-only embedding cache |
//! | [`tour_api`] | Korea Tourism API client |
//! | [`image`] | Image URL validation, homepage normalization |
//! | [`pipeline`] | Query → cards orchestration |
//! | [`present`] | Card rendering |

pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod image;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod present;
pub mod tour_api;
