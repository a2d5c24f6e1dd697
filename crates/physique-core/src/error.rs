//! Error taxonomy shared by the core pipeline.
//!
//! Every failure is caught at the request boundary and turned into a
//! user-visible message; nothing here is meant to crash the process.

use std::time::Duration;

use thiserror::Error;

/// Input problems detected before any request is issued.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Please provide at least one photo")]
    NoPhotos,

    #[error("Please provide your {0}")]
    MissingField(&'static str),

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: u16,
        max: u16,
        value: u16,
    },

    #[error("Unsupported image '{0}': expected png, jpg or jpeg")]
    UnsupportedImage(String),

    #[error("Could not read image '{path}': {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the inference call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Could not reach the inference service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Inference request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Inference service reported an error: {0}")]
    Remote(String),

    #[error("Malformed response line: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Inference request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Inference service returned no content")]
    EmptyResponse,
}

/// Failures while rendering the plan document.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Character {ch:?} at offset {offset} is not supported by the document font")]
    UnsupportedCharacter { ch: char, offset: usize },

    #[error("Failed to write PDF: {0}")]
    Pdf(String),
}

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum PhysiqueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl PhysiqueError {
    /// Validation problems are shown as warnings rather than errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, PhysiqueError::Validation(_))
    }
}
