//! Decode structured findings out of untrusted generated text.
//!
//! The generator is asked for bare JSON but may wrap it in a fenced block or in
//! prose. Decoding is strict: either the whole payload becomes a typed
//! [`Findings`] or the result is `None` and the caller falls back to a
//! degraded scorecard.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::checks::{Check, CheckResult, FindingSection, Findings};

#[derive(Deserialize)]
struct RawFindings {
    sections: Vec<RawSection>,
}

#[derive(Deserialize)]
struct RawSection {
    #[serde(default, alias = "id")]
    section_id: Option<String>,
    #[serde(default, alias = "label", alias = "name")]
    section_name: Option<String>,
    #[serde(default)]
    checks: Vec<RawCheck>,
}

#[derive(Deserialize)]
struct RawCheck {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default)]
    label: Option<String>,
    #[serde(alias = "result")]
    status: CheckResult,
    #[serde(default)]
    evidence: Option<RawEvidence>,
    #[serde(default)]
    rationale: Option<String>,
}

/// A check id as emitted: text or a bare JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEvidence {
    One(String),
    Many(Vec<String>),
}

/// Parse generated text into findings, or `None` if nothing decodable is found.
pub fn parse_findings(raw: &str) -> Option<Findings> {
    let mut last_err = None;

    for candidate in candidates(raw) {
        match serde_json::from_str::<RawFindings>(candidate) {
            Ok(decoded) => return Some(validate(decoded)),
            Err(e) => last_err = Some(e),
        }
    }

    match last_err {
        Some(e) => warn!(error = %e, len = raw.len(), "generated text is not decodable findings"),
        None => warn!(len = raw.len(), "generated text contains no JSON object"),
    }
    None
}

/// Decode attempts in order of preference: fenced body, whole text, outermost braces.
fn candidates(raw: &str) -> Vec<&str> {
    let mut out = Vec::with_capacity(3);
    if let Some(body) = fenced_body(raw) {
        out.push(body);
    }
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        out.push(trimmed);
    }
    if let Some(span) = brace_span(raw)
        && !out.contains(&span)
    {
        out.push(span);
    }
    out
}

/// Body of the first ```-fenced block, skipping an optional language tag.
fn fenced_body(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after = &raw[open + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let close = body.find("```").unwrap_or(body.len());
    let body = body[..close].trim();
    (!body.is_empty()).then_some(body)
}

/// From the first `{` to the last `}` inclusive.
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn validate(raw: RawFindings) -> Findings {
    let sections: Vec<FindingSection> = raw
        .sections
        .into_iter()
        .enumerate()
        .map(|(i, section)| {
            let label = non_blank(section.section_name);
            let id = non_blank(section.section_id)
                .or_else(|| label.clone())
                .unwrap_or_else(|| format!("section_{}", i + 1));
            let checks = section
                .checks
                .into_iter()
                .enumerate()
                .map(|(j, check)| Check {
                    id: non_blank(check.id.map(String::from))
                        .unwrap_or_else(|| format!("check_{}", j + 1)),
                    label: non_blank(check.label),
                    result: check.status,
                    evidence: match check.evidence {
                        Some(RawEvidence::One(s)) => non_blank(Some(s)).into_iter().collect(),
                        Some(RawEvidence::Many(v)) => {
                            v.into_iter().filter_map(|s| non_blank(Some(s))).collect()
                        }
                        None => Vec::new(),
                    },
                    rationale: non_blank(check.rationale),
                })
                .collect();
            FindingSection {
                label: label.unwrap_or_else(|| id.clone()),
                id,
                checks,
            }
        })
        .collect();

    let findings = Findings { sections };
    debug!(
        sections = findings.sections.len(),
        checks = findings.check_count(),
        "decoded findings"
    );
    findings
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
