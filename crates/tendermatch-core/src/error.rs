use thiserror::Error;

/// Inbound request rejected before any generation call is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("at least one document is required")]
    NoDocuments,

    #[error("document {index} has no name")]
    UnnamedDocument { index: usize },
}

/// Rejected section weight override.
#[derive(Debug, Error, PartialEq)]
pub enum WeightError {
    #[error("unknown section {0:?}")]
    UnknownSection(String),

    #[error("weight for {section} must be a finite non-negative number, got {weight}")]
    Invalid { section: String, weight: f64 },
}
