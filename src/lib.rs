//! Multi-agent claim verification pipeline
//!
//! A claim moves through a fixed sequence of agents: the normalizer
//! validates and cleans the input, the classifier assigns a category and
//! extracts entities, the decomposer splits the claim into independently
//! verifiable sub-claims, the gatherer researches each sub-claim against
//! external sources with a cache-first policy, and the synthesizer turns
//! the collected evidence into a verdict with a confidence score. The
//! pipeline degrades gracefully: failed sources and providers are skipped
//! and every claim ends with exactly one verdict.

pub mod agents;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod search;

pub use error::{Result, VerificationError};
pub use pipeline::VerificationPipeline;
