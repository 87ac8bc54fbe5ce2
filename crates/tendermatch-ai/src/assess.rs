//! Report assembly: one findings call, one narrative call, one scorecard.

use serde::Serialize;
use tendermatch_core::{
    AssessmentRequest, FORMULA_V1, RequestError, Scorecard, SectionWeights,
    build_degraded_scorecard, score_generated,
};
use tracing::{info, warn};

use crate::gateway::Gateway;
use crate::provider::{GenerateRequest, GenerationProvider};

const CHECKS_SYSTEM: &str = r#"You are TenderMatch, an engine that assesses how well a company fits a public tender.

ABSOLUTE RULES:
1. NEVER produce numeric scores (no "36/100", no "80%", no percentages or points).
2. Produce ONLY discrete checks with a status of PASS | PARTIAL | FAIL | ND.
3. For each check give evidence (a snippet from the text) and a rationale (a short justification).
4. When the text does not contain enough information to judge, use ND.

Reply ONLY with valid JSON of this shape:
{
  "sections": [
    {
      "section_id": "requisiti_amministrativi",
      "section_name": "Requisiti Amministrativi",
      "checks": [
        {
          "id": "check_1",
          "label": "Chamber of Commerce registration",
          "status": "PASS",
          "evidence": "snippet from the document",
          "rationale": "short justification"
        }
      ]
    }
  ]
}

The sections to assess are:
- requisiti_amministrativi: registrations, certificates, tax compliance
- requisiti_tecnici: skills, prior experience, qualified staff
- requisiti_economici: turnover, financial standing, bank references
- documentazione_generale: completeness and formal conformity of the documents
- certificazioni: ISO, SOA, sector certifications"#;

const REPORT_SYSTEM: &str = "You are TenderMatch, an assistant that helps Italian companies judge their \
eligibility for public tenders.

Write a clear, structured markdown report containing:
1. A short summary of the tender (at most 5 lines)
2. The mandatory requirements identified
3. The main gaps between the company and the tender
4. Recommended actions (clear operational points)
5. Final considerations

Do NOT include numeric scores in the report; they are computed separately.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 8000,
            temperature: 0.3,
        }
    }
}

/// What the inbound layer hands back to its caller. The scorecard is always present.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentResponse {
    /// False only when no narrative could be produced.
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Narrative markdown; empty when unavailable.
    pub data: String,
    pub scorecard: Scorecard,
}

pub struct Assessor<'a, P> {
    gateway: &'a Gateway<P>,
    settings: GenerationSettings,
    weights: SectionWeights,
}

impl<'a, P: GenerationProvider> Assessor<'a, P> {
    pub fn new(gateway: &'a Gateway<P>) -> Self {
        Self {
            gateway,
            settings: GenerationSettings::default(),
            weights: SectionWeights::for_formula(&FORMULA_V1),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_weights(mut self, weights: SectionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Validate, run both generation calls concurrently, and pair narrative with scorecard.
    ///
    /// Only a validation failure is an `Err`; generation and parse failures are
    /// folded into the response.
    pub async fn assess(
        &self,
        request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, RequestError> {
        request.validate()?;
        let kind = request.kind();
        let language = request.language();
        let evidence = request.evidence_prompt();
        info!(kind, language, "assessment started");

        let checks = self.generation(
            format!("{CHECKS_SYSTEM}\n\nWrite labels, evidence and rationales in {language}."),
            format!("{evidence}\n\nGenerate the structured checks."),
        );
        let report = self.generation(format!("{REPORT_SYSTEM}\nAnswer in {language}."), evidence);

        let (checks_out, report_out) = tokio::join!(
            self.gateway.generate(&checks),
            self.gateway.generate(&report)
        );

        let scorecard = match checks_out {
            Ok(generated) => score_generated(&generated.text, &self.weights),
            Err(err) => {
                warn!(kind, error = %err, "findings generation failed");
                build_degraded_scorecard(&format!("findings generation failed: {err}"))
            }
        };

        let response = match report_out {
            Ok(generated) => AssessmentResponse {
                ok: true,
                error: None,
                data: generated.text,
                scorecard,
            },
            Err(err) => {
                warn!(kind, error = %err, "report generation failed");
                AssessmentResponse {
                    ok: false,
                    error: Some(err.to_string()),
                    data: String::new(),
                    scorecard,
                }
            }
        };
        info!(
            kind,
            ok = response.ok,
            overall = %response.scorecard.overall.status,
            "assessment finished"
        );
        Ok(response)
    }

    fn generation(&self, system: String, content: String) -> GenerateRequest {
        GenerateRequest {
            system,
            content,
            max_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        }
    }
}
