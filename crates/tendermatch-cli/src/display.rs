//! Vertical card display for scorecards.
//!
//! Renders the overall aggregate, then each section with its checks,
//! in the same label-column layout for every block.

use std::io::{self, Write};

use tendermatch_ai::AssessmentResponse;
use tendermatch_core::{Aggregate, Check, Scorecard, Section};

const MAX_CHECKS: usize = 10;
const MAX_SNIPPET: usize = 60;

// ── Public API ──

/// Print narrative (when present) and scorecard card.
pub fn print_response(response: &AssessmentResponse) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    if !response.data.is_empty() {
        writeln!(out, "{}", response.data.trim_end())?;
        writeln!(out)?;
    }
    write_scorecard(&mut out, &response.scorecard)?;
    Ok(())
}

pub fn print_scorecard(scorecard: &Scorecard) -> anyhow::Result<()> {
    write_scorecard(&mut io::stdout().lock(), scorecard)?;
    Ok(())
}

pub fn write_scorecard(out: &mut impl Write, scorecard: &Scorecard) -> io::Result<()> {
    let meta = &scorecard.meta;

    writeln!(out, "=== Scorecard ===")?;
    writeln!(
        out,
        "{} / {}  ({})",
        meta.schema_version,
        meta.formula_version,
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out)?;

    writeln!(out, "Overall")?;
    write_aggregate(out, &scorecard.overall)?;
    writeln!(out, "  {:<26} {}", "risk", scorecard.risk_level.as_str())?;
    let confidence = meta.confidence.map(|c| c.as_str()).unwrap_or("-");
    writeln!(out, "  {:<26} {}", "confidence", confidence)?;
    writeln!(out)?;

    for section in &scorecard.sections {
        write_section(out, scorecard, section)?;
    }
    Ok(())
}

// ── Section rendering ──

fn write_section(
    out: &mut impl Write,
    scorecard: &Scorecard,
    section: &Section,
) -> io::Result<()> {
    writeln!(out, "{}  [{}]", section.label, section.id)?;
    if !scorecard.weights.is_empty() {
        let weight = scorecard.weights.get(&section.id);
        writeln!(out, "  {:<26} {:.2}", "weight", weight)?;
    }
    write_aggregate(out, &section.aggregate())?;

    let len = section.checks.len();
    if len > 0 {
        writeln!(out, "  checks ({len}):")?;
        for check in section.checks.iter().take(MAX_CHECKS) {
            write_check(out, check)?;
        }
        if len > MAX_CHECKS {
            writeln!(out, "    ... and {} more", len - MAX_CHECKS)?;
        }
    }
    writeln!(out)
}

fn write_aggregate(out: &mut impl Write, aggregate: &Aggregate) -> io::Result<()> {
    writeln!(out, "  {:<26} {}", "status", aggregate.status)?;
    match aggregate.score {
        Some(score) => writeln!(out, "  {:<26} {}/100", "score", score),
        None => writeln!(out, "  {:<26} -", "score"),
    }
}

fn write_check(out: &mut impl Write, check: &Check) -> io::Result<()> {
    write!(out, "    {:<8} {}", check.result.as_str(), check.id)?;
    if let Some(label) = &check.label {
        write!(out, "  {}", shorten(label))?;
    }
    writeln!(out)?;
    for snippet in &check.evidence {
        writeln!(out, "      evidence: {}", shorten(snippet))?;
    }
    if let Some(rationale) = &check.rationale {
        writeln!(out, "      why: {}", shorten(rationale))?;
    }
    Ok(())
}

// ── Helpers ──

fn shorten(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > MAX_SNIPPET {
        let head: String = flat.chars().take(MAX_SNIPPET - 3).collect();
        format!("{head}...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use tendermatch_core::{SectionWeights, build_degraded_scorecard, score_generated};

    use super::*;

    fn render(scorecard: &Scorecard) -> String {
        let mut buf = Vec::new();
        write_scorecard(&mut buf, scorecard).unwrap();
        String::from_utf8(buf).unwrap()
    }

    const FINDINGS: &str = r#"{"sections":[{"section_id":"certificazioni","checks":[
        {"id":"iso9001","label":"ISO 9001","status":"PASS","evidence":"certificato n. 1234"},
        {"id":"soa","status":"ND","rationale":"categoria SOA non indicata"}]}]}"#;

    #[test]
    fn card_lists_every_section_and_check() {
        let card = render(&score_generated(
            FINDINGS,
            &SectionWeights::for_formula(&tendermatch_core::FORMULA_V1),
        ));
        assert!(card.starts_with("=== Scorecard ==="));
        assert!(card.contains("Certificazioni  [certificazioni]"));
        assert!(card.contains("Requisiti Tecnici  [requisiti_tecnici]"));
        assert!(card.contains("PASS     iso9001  ISO 9001"));
        assert!(card.contains("evidence: certificato n. 1234"));
        assert!(card.contains("why: categoria SOA non indicata"));
        assert!(card.contains("100/100"));
    }

    #[test]
    fn degraded_card_has_no_weights_or_score() {
        let card = render(&build_degraded_scorecard("provider unavailable"));
        assert!(card.contains("Analisi non completata"));
        assert!(!card.contains("weight"));
        assert!(card.contains("why: provider unavailable"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_propagate() {
        let card = build_degraded_scorecard("x");
        let err = write_scorecard(&mut ClosedPipe, &card).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn shorten_flattens_and_truncates() {
        assert_eq!(shorten("due\n  righe"), "due righe");
        let long = "à".repeat(100);
        let short = shorten(&long);
        assert_eq!(short.chars().count(), MAX_SNIPPET);
        assert!(short.ends_with("..."));
    }
}
