//! # Title Genie Core
//!
//! The title generation and quality-control pipeline: prompt composition,
//! candidate parsing, normalization, brand enforcement, batch and history
//! deduplication, SEO scoring, and bounded self-correction.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! application crate plugs in native backends through three async traits:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`generate::TextGenerator`] | `generate(prompt) -> text` |
//! | [`history::HistoryBackend`] | durable get/set for the title history |
//! | [`checkpoint::CheckpointStore`] | durable batch cursor |

pub mod batch;
pub mod checkpoint;
pub mod error;
pub mod generate;
pub mod history;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod prompt;
pub mod refine;
pub mod seo;
pub mod settings;
pub mod similarity;
pub mod validate;
