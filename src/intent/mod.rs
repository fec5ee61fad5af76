//! # Intent Matching Engine
//!
//! Turns free-form command text into a catalogue intent plus slot values.
//!
//! ## Module Organization:
//! - **vector**: Tensor flattening, normalization, cosine similarity
//! - **catalogue**: Command catalogue and precomputed phrase embeddings
//! - **adapter**: Backend trait and the adapter that normalizes its output
//! - **single_flight**: Shared one-at-a-time initialization
//! - **matcher**: Threshold-gated nearest-neighbour search
//! - **slots**: Rule-based parameter extraction
//! - **parser**: The `CommandParser` facade
//! - **action**: Typed commands built from match results
//! - **embedder**: Candle sentence-transformer backend

pub mod action;
pub mod adapter;
pub mod catalogue;
pub mod embedder;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod single_flight;
pub mod slots;
pub mod vector;

pub use action::CommandAction;
pub use adapter::EmbeddingAdapter;
pub use catalogue::Catalogue;
pub use error::EngineError;
pub use parser::{CommandParser, MatchResult};
pub use slots::SlotExtractor;
