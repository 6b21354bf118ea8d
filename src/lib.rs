//! # Rephrase
//!
//! A small service that runs short texts through Gemini for four tasks:
//! humanizing rewrites, AI-likelihood detection, similarity audits and topic
//! research. Usage counts are pushed live to WebSocket clients.
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/process                       GET /ws
//!          │                                   │ upgrade
//!          ▼                                   ▼
//!   ┌──────────────┐  increment   ┌──────────────┐ snapshot ┌──────────────┐
//!   │  Dispatcher  │─────────────▶│ UsageCounter │◀─────────│   StatsHub   │
//!   └──────┬───────┘              └──────────────┘  (tick)  │ (one task,   │
//!          │ prompts::*                                     │  owns the    │
//!          ▼                                                │  listeners)  │
//!   ┌──────────────┐  retry/backoff   ┌──────────┐          └──────────────┘
//!   │ GeminiClient │─────────────────▶│  Gemini  │
//!   └──────┬───────┘                  └──────────┘
//!          │ structured::parse_structured (detect / plagiarize / research)
//!          ▼
//!      TaskResult
//! ```
//!
//! ## Modules
//! - `llm`: generation client, retry policy, structured reply parsing
//! - `tasks`: task kinds, prompt builders, dispatcher
//! - `stats`: usage counters
//! - `hub`: live-stats broadcast loop
//! - `api`: HTTP routes

pub mod api;
pub mod config;
pub mod hub;
pub mod llm;
pub mod stats;
pub mod tasks;

pub use config::Config;
