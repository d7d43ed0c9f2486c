//! # Title Genie
//!
//! Batch generation of marketplace product titles. Each product row is sent
//! to a text-generation service; every candidate that comes back is
//! normalized, brand-checked, deduplicated against the same row and against
//! all previously accepted titles, scored for SEO health, and refined when
//! the score falls short.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────┐   ┌─────────────┐
//! │ input.csv  │──▶│  BatchOrchestrator   │──▶│ results.csv │
//! └────────────┘   │  (title-genie-core)  │   └─────────────┘
//!                  └──┬────────┬───────┬──┘
//!                     ▼        ▼       ▼
//!               ┌─────────┐ ┌───────┐ ┌────────────┐
//!               │ LLM API │ │history│ │ checkpoint │
//!               └─────────┘ └───────┘ └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! genie init                                   # create database
//! genie analyze report.csv                     # inspect high-CTR keywords
//! genie run products.csv --output titles.csv   # generate (resumable)
//! genie status products.csv
//! genie history stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`generation`] | Chat-completions client and disabled provider |
//! | [`rows`] | CSV row source and result sink |
//! | [`analyzer`] | High-CTR keyword extraction |
//! | [`history_backend`] | File and SQLite history persistence |
//! | [`checkpoint`] | SQLite batch checkpoints |
//! | [`progress`] | Progress reporters |
//! | [`run`] | `run`, `status`, `reset` commands |
//! | [`history_cmd`] | `history` subcommands |

pub mod analyzer;
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod generation;
pub mod history_backend;
pub mod history_cmd;
pub mod migrate;
pub mod progress;
pub mod rows;
pub mod run;
