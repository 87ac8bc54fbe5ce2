//! The fixed five-section taxonomy and canonicalization of generated section ids.
//!
//! Generators misname sections ("Technical requirements", "requisiti-tecnici",
//! "Capacità economica"), omit them, or invent new ones. Canonicalization maps
//! every known spelling onto one [`SectionKind`], drops the rest, and
//! synthesizes empty sections for the ones that are missing, so a scorecard
//! always enumerates all five in the same order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::checks::{Check, FindingSection, Findings};

/// Canonical section taxonomy, in scorecard order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    #[serde(rename = "requisiti_amministrativi")]
    Administrative,
    #[serde(rename = "requisiti_tecnici")]
    Technical,
    #[serde(rename = "requisiti_economici")]
    Economic,
    #[serde(rename = "documentazione_generale")]
    GeneralDocumentation,
    #[serde(rename = "certificazioni")]
    Certifications,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        Self::Administrative,
        Self::Technical,
        Self::Economic,
        Self::GeneralDocumentation,
        Self::Certifications,
    ];

    /// Wire identifier, as requested from the generator.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Administrative => "requisiti_amministrativi",
            Self::Technical => "requisiti_tecnici",
            Self::Economic => "requisiti_economici",
            Self::GeneralDocumentation => "documentazione_generale",
            Self::Certifications => "certificazioni",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Administrative => "Requisiti Amministrativi",
            Self::Technical => "Requisiti Tecnici",
            Self::Economic => "Requisiti Economici",
            Self::GeneralDocumentation => "Documentazione Generale",
            Self::Certifications => "Certificazioni",
        }
    }

    /// Resolve an arbitrary identifier or label through the synonym table.
    pub fn resolve(raw: &str) -> Option<Self> {
        let key = normalize_id(raw);
        SYNONYMS
            .iter()
            .find(|(synonym, _)| *synonym == key)
            .map(|&(_, kind)| kind)
    }
}

/// Normalized spelling → canonical section.
const SYNONYMS: &[(&str, SectionKind)] = &[
    ("requisiti_amministrativi", SectionKind::Administrative),
    ("requisiti_amministrativa", SectionKind::Administrative),
    ("amministrativi", SectionKind::Administrative),
    ("amministrativa", SectionKind::Administrative),
    ("requisiti_generali_amministrativi", SectionKind::Administrative),
    ("administrative", SectionKind::Administrative),
    ("administrative_requirements", SectionKind::Administrative),
    ("admin", SectionKind::Administrative),
    ("requisiti_tecnici", SectionKind::Technical),
    ("requisiti_tecnico_professionali", SectionKind::Technical),
    ("capacita_tecnica", SectionKind::Technical),
    ("capacita_tecnico_professionale", SectionKind::Technical),
    ("tecnici", SectionKind::Technical),
    ("tecnica", SectionKind::Technical),
    ("technical", SectionKind::Technical),
    ("technical_requirements", SectionKind::Technical),
    ("requisiti_economici", SectionKind::Economic),
    ("requisiti_economico_finanziari", SectionKind::Economic),
    ("capacita_economica", SectionKind::Economic),
    ("capacita_economico_finanziaria", SectionKind::Economic),
    ("economici", SectionKind::Economic),
    ("economica", SectionKind::Economic),
    ("economic", SectionKind::Economic),
    ("economic_requirements", SectionKind::Economic),
    ("financial", SectionKind::Economic),
    ("financial_requirements", SectionKind::Economic),
    ("documentazione_generale", SectionKind::GeneralDocumentation),
    ("documentazione", SectionKind::GeneralDocumentation),
    ("documentazione_amministrativa_generale", SectionKind::GeneralDocumentation),
    ("documentation", SectionKind::GeneralDocumentation),
    ("general_documentation", SectionKind::GeneralDocumentation),
    ("documents", SectionKind::GeneralDocumentation),
    ("certificazioni", SectionKind::Certifications),
    ("certificazione", SectionKind::Certifications),
    ("certificazioni_qualita", SectionKind::Certifications),
    ("certifications", SectionKind::Certifications),
    ("certification", SectionKind::Certifications),
    ("certificates", SectionKind::Certifications),
];

/// Lowercase, fold Italian accented vowels, and collapse every run of
/// non-alphanumerics into a single `_`.
///
/// "Capacità Economico-Finanziaria" → "capacita_economico_finanziaria"
pub fn normalize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for ch in raw.chars().flat_map(char::to_lowercase) {
        let ch = fold_accent(ch);
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }

    out
}

fn fold_accent(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ä' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        other => other,
    }
}

/// Result of mapping a findings batch onto the canonical taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct Canonicalized {
    /// Exactly five sections, in [`SectionKind::ALL`] order.
    pub findings: Findings,
    /// Raw sections that resolved to a canonical section.
    pub mapped: usize,
    /// Identifiers of raw sections excluded from scoring.
    pub dropped: Vec<String>,
}

/// Map arbitrary section identifiers onto the canonical taxonomy.
///
/// - Each raw section resolves by id first, then by label.
/// - Raw sections resolving to the same canonical section are merged in input order.
/// - Duplicate check ids inside a canonical section get a `_<k>` suffix.
/// - Unresolvable sections are logged and dropped.
/// - Missing canonical sections are synthesized with no checks.
///
/// Idempotent: canonicalizing canonical output returns it unchanged.
pub fn canonicalize(findings: Findings) -> Canonicalized {
    let mut buckets: Vec<Vec<Check>> = vec![Vec::new(); SectionKind::ALL.len()];
    let mut mapped = 0usize;
    let mut dropped = Vec::new();

    for section in findings.sections {
        let kind = SectionKind::resolve(&section.id)
            .or_else(|| SectionKind::resolve(&section.label));
        match kind {
            Some(kind) => {
                mapped += 1;
                buckets[kind as usize].extend(section.checks);
            }
            None => {
                warn!(
                    section_id = %section.id,
                    checks = section.checks.len(),
                    "dropping section outside canonical taxonomy"
                );
                dropped.push(section.id);
            }
        }
    }

    let sections = SectionKind::ALL
        .iter()
        .zip(buckets)
        .map(|(kind, checks)| FindingSection {
            id: kind.id().to_string(),
            label: kind.label().to_string(),
            checks: dedupe_check_ids(checks),
        })
        .collect();

    Canonicalized {
        findings: Findings { sections },
        mapped,
        dropped,
    }
}

fn dedupe_check_ids(checks: Vec<Check>) -> Vec<Check> {
    let mut seen: HashSet<String> = HashSet::with_capacity(checks.len());
    checks
        .into_iter()
        .map(|mut check| {
            if !seen.insert(check.id.clone()) {
                let mut k = 2;
                while seen.contains(&format!("{}_{k}", check.id)) {
                    k += 1;
                }
                check.id = format!("{}_{k}", check.id);
                seen.insert(check.id.clone());
            }
            check
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckResult;

    fn section(id: &str, label: &str, checks: &[(&str, CheckResult)]) -> FindingSection {
        FindingSection {
            id: id.to_string(),
            label: label.to_string(),
            checks: checks
                .iter()
                .map(|&(cid, result)| Check::new(cid, result))
                .collect(),
        }
    }

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_id("Requisiti  Tecnici"), "requisiti_tecnici");
        assert_eq!(normalize_id("requisiti-tecnici"), "requisiti_tecnici");
        assert_eq!(normalize_id("  __Certificazioni__ "), "certificazioni");
        assert_eq!(normalize_id("Technical / Requirements"), "technical_requirements");
    }

    #[test]
    fn normalize_folds_accents() {
        assert_eq!(
            normalize_id("Capacità Economico-Finanziaria"),
            "capacita_economico_finanziaria"
        );
    }

    #[test]
    fn resolve_synonyms() {
        assert_eq!(SectionKind::resolve("Technical Requirements"), Some(SectionKind::Technical));
        assert_eq!(SectionKind::resolve("financial"), Some(SectionKind::Economic));
        assert_eq!(SectionKind::resolve("CERTIFICATES"), Some(SectionKind::Certifications));
        assert_eq!(
            SectionKind::resolve("Documentazione generale"),
            Some(SectionKind::GeneralDocumentation)
        );
        assert_eq!(SectionKind::resolve("sostenibilita"), None);
    }

    #[test]
    fn every_canonical_id_resolves_to_itself() {
        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::resolve(kind.id()), Some(kind));
            assert_eq!(SectionKind::resolve(kind.label()), Some(kind));
        }
    }

    #[test]
    fn serde_uses_wire_ids() {
        let json = serde_json::to_string(&SectionKind::GeneralDocumentation).unwrap();
        assert_eq!(json, "\"documentazione_generale\"");
    }

    #[test]
    fn missing_sections_are_synthesized_in_order() {
        let findings = Findings {
            sections: vec![section("certifications", "Certs", &[("iso_9001", CheckResult::Pass)])],
        };
        let out = canonicalize(findings);

        assert_eq!(out.mapped, 1);
        let ids: Vec<&str> = out.findings.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "requisiti_amministrativi",
                "requisiti_tecnici",
                "requisiti_economici",
                "documentazione_generale",
                "certificazioni",
            ]
        );
        assert!(out.findings.sections[0].checks.is_empty());
        assert_eq!(out.findings.sections[4].checks.len(), 1);
        assert_eq!(out.findings.sections[4].label, "Certificazioni");
    }

    #[test]
    fn unknown_sections_are_dropped() {
        let findings = Findings {
            sections: vec![
                section("sostenibilita", "Sostenibilità", &[("esg", CheckResult::Fail)]),
                section("requisiti_tecnici", "Requisiti Tecnici", &[("staff", CheckResult::Pass)]),
            ],
        };
        let out = canonicalize(findings);

        assert_eq!(out.mapped, 1);
        assert_eq!(out.dropped, vec!["sostenibilita".to_string()]);
        assert_eq!(out.findings.check_count(), 1);
    }

    #[test]
    fn label_used_when_id_unknown() {
        let findings = Findings {
            sections: vec![section(
                "sec_3",
                "Requisiti economici",
                &[("fatturato", CheckResult::Partial)],
            )],
        };
        let out = canonicalize(findings);
        assert_eq!(out.mapped, 1);
        assert_eq!(out.findings.sections[2].checks[0].id, "fatturato");
    }

    #[test]
    fn merged_sections_get_unique_check_ids() {
        let findings = Findings {
            sections: vec![
                section("technical", "Technical", &[("check_1", CheckResult::Pass)]),
                section(
                    "requisiti_tecnici",
                    "Requisiti Tecnici",
                    &[("check_1", CheckResult::Fail), ("check_1", CheckResult::Nd)],
                ),
            ],
        };
        let out = canonicalize(findings);
        let ids: Vec<&str> = out.findings.sections[1]
            .checks
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, ["check_1", "check_1_2", "check_1_3"]);
        assert_eq!(out.mapped, 2);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let findings = Findings {
            sections: vec![
                section("Certificazioni", "x", &[("iso", CheckResult::Pass)]),
                section("admin", "x", &[("durc", CheckResult::Fail), ("durc", CheckResult::Pass)]),
                section("other", "x", &[]),
            ],
        };
        let once = canonicalize(findings).findings;
        let twice = canonicalize(once.clone());

        assert_eq!(twice.findings, once);
        assert_eq!(twice.mapped, SectionKind::ALL.len());
        assert!(twice.dropped.is_empty());
    }

    #[test]
    fn empty_findings_map_nothing() {
        let out = canonicalize(Findings::default());
        assert_eq!(out.mapped, 0);
        assert_eq!(out.findings.sections.len(), 5);
        assert_eq!(out.findings.check_count(), 0);
    }
}
