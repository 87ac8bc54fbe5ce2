//! Deterministic scoring engine.
//!
//! Check results map to fixed values (`PASS=1.0`, `PARTIAL=0.5`, `FAIL=0.0`,
//! `ND` excluded). A section's raw score is the mean of its determinable
//! checks; the overall raw score is the weighted mean of the determinable
//! sections, renormalized over the weights actually used. Anything with no
//! determinable input is `ND` with null score, never zero.
//!
//! All constants live in a [`ScoringFormula`] pinned to a version string that
//! is stamped into every scorecard. Changing any of them means a new formula
//! version.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checks::{Check, CheckResult, FindingSection, Findings};
use crate::error::WeightError;
use crate::parse::parse_findings;
use crate::taxonomy::{SectionKind, canonicalize};

pub const SCHEMA_VERSION: &str = "compliance-scorecard-v1";

/// Id of the single pseudo-section of a degraded scorecard.
pub const DEGRADED_SECTION_ID: &str = "analisi_non_completata";

/// Scoring constants for one formula version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringFormula {
    pub version: &'static str,
    pub pass_value: f64,
    pub partial_value: f64,
    pub fail_value: f64,
    /// Percent at or above which an aggregate is `PASS`.
    pub pass_threshold: f64,
    /// Percent at or above which an aggregate is `PARTIAL`.
    pub partial_threshold: f64,
    /// Share of determinable checks at or above which confidence is `HIGH`.
    pub confidence_high: f64,
    /// Share of determinable checks at or above which confidence is `MEDIUM`.
    pub confidence_medium: f64,
    /// Decimal places a percent is rounded to before it is compared with a
    /// threshold or published as a score.
    pub percent_precision: i32,
    pub default_weights: [(SectionKind, f64); 5],
}

pub const FORMULA_V1: ScoringFormula = ScoringFormula {
    version: "score-formula-v1",
    pass_value: 1.0,
    partial_value: 0.5,
    fail_value: 0.0,
    pass_threshold: 80.0,
    partial_threshold: 50.0,
    confidence_high: 0.8,
    confidence_medium: 0.5,
    percent_precision: 9,
    default_weights: [
        (SectionKind::Administrative, 0.25),
        (SectionKind::Technical, 0.30),
        (SectionKind::Economic, 0.20),
        (SectionKind::GeneralDocumentation, 0.15),
        (SectionKind::Certifications, 0.10),
    ],
};

/// Status, 0–100 score and 0–1 raw value of a section or of the whole scorecard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub status: CheckResult,
    pub score: Option<u32>,
    pub raw: Option<f64>,
}

impl Aggregate {
    pub const ND: Aggregate = Aggregate {
        status: CheckResult::Nd,
        score: None,
        raw: None,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub label: String,
    pub checks: Vec<Check>,
    pub status: CheckResult,
    pub score: Option<u32>,
    pub raw: Option<f64>,
}

impl Section {
    pub fn aggregate(&self) -> Aggregate {
        Aggregate {
            status: self.status,
            score: self.score,
            raw: self.raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Nd,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Nd => "ND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Nd,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Nd => "ND",
        }
    }
}

/// The same findings always yield the same score; there is no other mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeterminismMode {
    #[default]
    Locked,
}

/// Audit metadata stamped on every scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub schema_version: String,
    pub formula_version: String,
    pub determinism_mode: DeterminismMode,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceLevel>,
}

/// Section weights keyed by canonical section id. Weights are non-negative
/// and need not sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionWeights(BTreeMap<String, f64>);

impl SectionWeights {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn for_formula(formula: &ScoringFormula) -> Self {
        Self(
            formula
                .default_weights
                .iter()
                .map(|(kind, w)| (kind.id().to_string(), *w))
                .collect(),
        )
    }

    /// Set the weight of a section, resolving its id through the taxonomy.
    pub fn set(&mut self, section: &str, weight: f64) -> Result<(), WeightError> {
        let kind = SectionKind::resolve(section)
            .ok_or_else(|| WeightError::UnknownSection(section.to_string()))?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(WeightError::Invalid {
                section: kind.id().to_string(),
                weight,
            });
        }
        self.0.insert(kind.id().to_string(), weight);
        Ok(())
    }

    /// Weight for a section id; unknown ids weigh zero.
    pub fn get(&self, section_id: &str) -> f64 {
        self.0.get(section_id).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The published, auditable scorecard. Built once per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub sections: Vec<Section>,
    pub overall: Aggregate,
    pub risk_level: RiskLevel,
    pub weights: SectionWeights,
    pub meta: Meta,
}

impl Scorecard {
    /// True for the fallback scorecard built when findings were unusable.
    ///
    /// A scorecard built from findings whose checks are all `ND` is not
    /// degraded, even though its overall aggregate is `ND` too.
    pub fn is_degraded(&self) -> bool {
        matches!(self.sections.as_slice(), [only] if only.id == DEGRADED_SECTION_ID)
    }
}

impl ScoringFormula {
    fn value(&self, result: CheckResult) -> Option<f64> {
        match result {
            CheckResult::Pass => Some(self.pass_value),
            CheckResult::Partial => Some(self.partial_value),
            CheckResult::Fail => Some(self.fail_value),
            CheckResult::Nd => None,
        }
    }

    /// `raw * 100`, rounded to [`ScoringFormula::percent_precision`] places.
    fn percent(&self, raw: f64) -> f64 {
        let scale = 10f64.powi(self.percent_precision);
        (raw * 100.0 * scale).round() / scale
    }

    pub fn status_from_raw(&self, raw: f64) -> CheckResult {
        let percent = self.percent(raw);
        if percent >= self.pass_threshold {
            CheckResult::Pass
        } else if percent >= self.partial_threshold {
            CheckResult::Partial
        } else {
            CheckResult::Fail
        }
    }

    fn aggregate_from_raw(&self, raw: f64) -> Aggregate {
        Aggregate {
            status: self.status_from_raw(raw),
            score: Some(self.percent(raw).round() as u32),
            raw: Some(raw),
        }
    }

    /// Mean of the determinable check values.
    pub fn score_section(&self, checks: &[Check]) -> Aggregate {
        let values: Vec<f64> = checks.iter().filter_map(|c| self.value(c.result)).collect();
        if values.is_empty() {
            return Aggregate::ND;
        }
        let raw = values.iter().sum::<f64>() / values.len() as f64;
        self.aggregate_from_raw(raw)
    }

    /// Weighted mean over sections with a raw score and a positive weight.
    ///
    /// An `ND` section is excluded from numerator and denominator alike.
    pub fn score_overall(&self, sections: &[Section], weights: &SectionWeights) -> Aggregate {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for section in sections {
            let Some(raw) = section.raw else { continue };
            let weight = weights.get(&section.id);
            if weight <= 0.0 {
                continue;
            }
            weighted_sum += weight * raw;
            total_weight += weight;
        }

        if total_weight == 0.0 {
            return Aggregate::ND;
        }
        self.aggregate_from_raw(weighted_sum / total_weight)
    }

    pub fn risk_level(&self, overall: &Aggregate) -> RiskLevel {
        match overall.status {
            CheckResult::Pass => RiskLevel::Low,
            CheckResult::Partial => RiskLevel::Medium,
            CheckResult::Fail => RiskLevel::High,
            CheckResult::Nd => RiskLevel::Nd,
        }
    }

    /// Confidence from evidence coverage: the share of determinable checks.
    pub fn confidence(&self, sections: &[Section]) -> ConfidenceLevel {
        let total: usize = sections.iter().map(|s| s.checks.len()).sum();
        let determinable = sections
            .iter()
            .flat_map(|s| &s.checks)
            .filter(|c| c.result.is_determinable())
            .count();
        if determinable == 0 {
            return ConfidenceLevel::Nd;
        }
        let coverage = determinable as f64 / total as f64;
        if coverage >= self.confidence_high {
            ConfidenceLevel::High
        } else if coverage >= self.confidence_medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn build_section(&self, section: FindingSection) -> Section {
        let agg = self.score_section(&section.checks);
        Section {
            id: section.id,
            label: section.label,
            checks: section.checks,
            status: agg.status,
            score: agg.score,
            raw: agg.raw,
        }
    }

    /// Build a scorecard from canonicalized findings. Total: never fails.
    pub fn build_scorecard(
        &self,
        findings: Findings,
        weights: &SectionWeights,
        generated_at: DateTime<Utc>,
    ) -> Scorecard {
        let sections: Vec<Section> = findings
            .sections
            .into_iter()
            .map(|s| self.build_section(s))
            .collect();
        let overall = self.score_overall(&sections, weights);
        let confidence = self.confidence(&sections);

        Scorecard {
            risk_level: self.risk_level(&overall),
            overall,
            weights: weights.clone(),
            meta: self.meta(generated_at, confidence),
            sections,
        }
    }

    /// Fallback when findings are unusable: one explanatory `ND` section, overall `ND`.
    pub fn build_degraded_scorecard(&self, reason: &str, generated_at: DateTime<Utc>) -> Scorecard {
        let check = Check::new("findings_unavailable", CheckResult::Nd).with_rationale(reason);
        Scorecard {
            sections: vec![Section {
                id: DEGRADED_SECTION_ID.to_string(),
                label: "Analisi non completata".to_string(),
                checks: vec![check],
                status: CheckResult::Nd,
                score: None,
                raw: None,
            }],
            overall: Aggregate::ND,
            risk_level: RiskLevel::Nd,
            weights: SectionWeights::empty(),
            meta: self.meta(generated_at, ConfidenceLevel::Nd),
        }
    }

    fn meta(&self, generated_at: DateTime<Utc>, confidence: ConfidenceLevel) -> Meta {
        Meta {
            schema_version: SCHEMA_VERSION.to_string(),
            formula_version: self.version.to_string(),
            determinism_mode: DeterminismMode::Locked,
            generated_at,
            confidence: Some(confidence),
        }
    }
}

/// [`ScoringFormula::build_scorecard`] with [`FORMULA_V1`], stamped now.
pub fn build_scorecard(findings: Findings, weights: &SectionWeights) -> Scorecard {
    FORMULA_V1.build_scorecard(findings, weights, Utc::now())
}

/// [`ScoringFormula::build_degraded_scorecard`] with [`FORMULA_V1`], stamped now.
pub fn build_degraded_scorecard(reason: &str) -> Scorecard {
    warn!(reason, "emitting degraded scorecard");
    FORMULA_V1.build_degraded_scorecard(reason, Utc::now())
}

/// Parse, canonicalize and score raw generated text, degrading on any failure.
pub fn score_generated(raw: &str, weights: &SectionWeights) -> Scorecard {
    let Some(findings) = parse_findings(raw) else {
        return build_degraded_scorecard("generated text contained no decodable findings");
    };
    let canonical = canonicalize(findings);
    if canonical.mapped == 0 {
        return build_degraded_scorecard("no generated section matched the canonical taxonomy");
    }

    let scorecard = build_scorecard(canonical.findings, weights);
    info!(
        status = %scorecard.overall.status,
        score = ?scorecard.overall.score,
        dropped = canonical.dropped.len(),
        "scorecard built"
    );
    scorecard
}
