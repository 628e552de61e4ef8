//! Pipeline agents, one per verification stage
//!
//! The orchestrator runs them in a fixed order: normalizer, classifier,
//! decomposer, gatherer, synthesizer.

pub mod classifier;
pub mod decomposer;
pub mod gatherer;
pub mod normalizer;
pub mod synthesizer;

pub use classifier::ContextClassifier;
pub use decomposer::ClaimDecomposer;
pub use gatherer::EvidenceGatherer;
pub use normalizer::ClaimNormalizer;
pub use synthesizer::EvidenceSynthesizer;
