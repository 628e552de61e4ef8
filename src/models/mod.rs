//! Domain models for claims, evidence, and verdicts

pub mod claim;
pub mod evidence;
pub mod verdict;

pub use claim::{Claim, ClaimCategory, Entity, EntityKind, SubClaim};
pub use evidence::{AnalysisMethod, Evidence, Source, SourceKind, Stance};
pub use verdict::{SourceRef, SubClaimReport, Verdict, VerdictLabel, VerificationReport};
