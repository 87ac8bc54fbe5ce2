//! Inbound assessment requests and their validation.

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

pub const DEFAULT_LANGUAGE: &str = "italiano";

/// A document the company declares it can submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredDocument {
    pub name: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub summary: String,
}

/// The two request shapes accepted by the assessment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum AssessmentRequest {
    /// Company profile against a tender text.
    TenderReady {
        company_profile: String,
        tender_text: String,
        #[serde(default)]
        language: Option<String>,
    },
    /// Declared documents against a tender identifier.
    ComplianceCheck {
        tender_id: String,
        documents: Vec<DeclaredDocument>,
        #[serde(default)]
        language: Option<String>,
    },
}

impl AssessmentRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TenderReady { .. } => "tender-ready",
            Self::ComplianceCheck { .. } => "compliance-check",
        }
    }

    /// Reject blank required fields. Runs before any generation call.
    pub fn validate(&self) -> Result<(), RequestError> {
        match self {
            Self::TenderReady {
                company_profile,
                tender_text,
                ..
            } => {
                require(company_profile, "companyProfile")?;
                require(tender_text, "tenderText")?;
            }
            Self::ComplianceCheck {
                tender_id,
                documents,
                ..
            } => {
                require(tender_id, "tenderId")?;
                if documents.is_empty() {
                    return Err(RequestError::NoDocuments);
                }
                if let Some(index) = documents.iter().position(|d| d.name.trim().is_empty()) {
                    return Err(RequestError::UnnamedDocument { index });
                }
            }
        }
        Ok(())
    }

    /// Requested answer language, defaulting to [`DEFAULT_LANGUAGE`].
    pub fn language(&self) -> &str {
        let language = match self {
            Self::TenderReady { language, .. } | Self::ComplianceCheck { language, .. } => language,
        };
        language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// The evidence block shared by both generation calls.
    pub fn evidence_prompt(&self) -> String {
        match self {
            Self::TenderReady {
                company_profile,
                tender_text,
                ..
            } => format!(
                "COMPANY PROFILE:\n{}\n\n---\n\nTENDER TEXT:\n{}\n\n---\n\nAnswer in {}.",
                company_profile.trim(),
                tender_text.trim(),
                self.language(),
            ),
            Self::ComplianceCheck {
                tender_id,
                documents,
                ..
            } => format!(
                "TENDER: {}\n\nDECLARED DOCUMENTS:\n{}\n\n---\n\nAnswer in {}.",
                tender_id.trim(),
                render_documents(documents),
                self.language(),
            ),
        }
    }
}

fn require(value: &str, field: &'static str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        Err(RequestError::MissingField(field))
    } else {
        Ok(())
    }
}

fn render_documents(documents: &[DeclaredDocument]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "{}. {}\n   Type: {}\n   Summary: {}",
                i + 1,
                doc.name.trim(),
                or_dash(&doc.doc_type),
                or_dash(&doc.summary),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_dash(s: &str) -> &str {
    let s = s.trim();
    if s.is_empty() { "-" } else { s }
}
