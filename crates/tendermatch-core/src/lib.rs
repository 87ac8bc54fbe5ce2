//! Core types and the deterministic scoring path: findings → canonical sections → scorecard.

pub mod checks;
pub mod error;
pub mod parse;
pub mod request;
pub mod scoring;
pub mod taxonomy;

pub use checks::{Check, CheckResult, FindingSection, Findings};
pub use error::{RequestError, WeightError};
pub use parse::parse_findings;
pub use request::{AssessmentRequest, DeclaredDocument, DEFAULT_LANGUAGE};
pub use scoring::{
    Aggregate, ConfidenceLevel, DeterminismMode, FORMULA_V1, Meta, RiskLevel, Scorecard,
    ScoringFormula, Section, SectionWeights, build_degraded_scorecard, build_scorecard,
    score_generated,
};
pub use taxonomy::{Canonicalized, SectionKind, canonicalize};
