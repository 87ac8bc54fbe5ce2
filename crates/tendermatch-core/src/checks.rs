//! Discrete findings extracted from generated text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome of a single check. `Nd` (not determinable) never carries a numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum CheckResult {
    Pass,
    Partial,
    Fail,
    Nd,
}

impl CheckResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Partial => "PARTIAL",
            Self::Fail => "FAIL",
            Self::Nd => "ND",
        }
    }

    pub fn is_determinable(&self) -> bool {
        !matches!(self, Self::Nd)
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckResult {
    type Err = String;

    /// Case-insensitive; `N/D`, `NA` and `N/A` are read as `ND`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Ok(Self::Pass),
            "PARTIAL" => Ok(Self::Partial),
            "FAIL" => Ok(Self::Fail),
            "ND" | "N/D" | "NA" | "N/A" => Ok(Self::Nd),
            other => Err(format!("unknown check result {other:?}")),
        }
    }
}

impl TryFrom<String> for CheckResult {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One atomic finding. The id is unique within its section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub result: CheckResult,
    /// Text snippets substantiating the result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Check {
    pub fn new(id: impl Into<String>, result: CheckResult) -> Self {
        Self {
            id: id.into(),
            label: None,
            result,
            evidence: Vec::new(),
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// A group of checks under a section identifier, before or after canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingSection {
    pub id: String,
    pub label: String,
    pub checks: Vec<Check>,
}

/// A fully-typed batch of findings. Only produced by a successful decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub sections: Vec<FindingSection>,
}

impl Findings {
    pub fn check_count(&self) -> usize {
        self.sections.iter().map(|s| s.checks.len()).sum()
    }
}
