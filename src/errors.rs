// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const GENERIC_HINT: &str = "Hint: avoid revealing outfits, public figures, logos or heavy \
     retouching, and retry with images where the person and the garment are clearly visible.";

/// Upstream failure category used to pick the user-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    QuotaExceeded,
    Generic,
}

#[derive(Error, Debug)]
pub enum TryOnError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Image normalization error: {0}")]
    Normalization(String),

    #[error("Generation failed: {message}")]
    Generation {
        kind: GenerationErrorKind,
        message: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("no images generated")]
    EmptyResult,

    #[error("request cancelled")]
    Cancelled,

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),
}

impl TryOnError {
    pub fn quota(message: impl Into<String>) -> Self {
        TryOnError::Generation {
            kind: GenerationErrorKind::QuotaExceeded,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        TryOnError::Generation {
            kind: GenerationErrorKind::Generic,
            message: message.into(),
        }
    }

    /// Anything that is not an upstream quota rejection counts as generic.
    pub fn generation_kind(&self) -> GenerationErrorKind {
        match self {
            TryOnError::Generation { kind, .. } => *kind,
            _ => GenerationErrorKind::Generic,
        }
    }
}

impl From<actix_multipart::MultipartError> for TryOnError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        TryOnError::Multipart(err.to_string())
    }
}

impl ResponseError for TryOnError {
    fn status_code(&self) -> StatusCode {
        match self {
            TryOnError::Validation(_) | TryOnError::Normalization(_) | TryOnError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            TryOnError::Generation {
                kind: GenerationErrorKind::QuotaExceeded,
                ..
            } => StatusCode::TOO_MANY_REQUESTS,
            TryOnError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            TryOnError::NotFound(_) => StatusCode::NOT_FOUND,
            TryOnError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            TryOnError::Generation { .. } | TryOnError::Persistence(_) | TryOnError::EmptyResult => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (title, message) = match self {
            TryOnError::Validation(_) => ("Validation error", self.to_string()),
            TryOnError::Normalization(_) => ("Image processing error", self.to_string()),
            TryOnError::Multipart(_) => ("Invalid upload", self.to_string()),
            TryOnError::PayloadTooLarge(_) => ("Upload too large", self.to_string()),
            TryOnError::Generation {
                kind: GenerationErrorKind::QuotaExceeded,
                ..
            } => (
                "Service temporarily unavailable",
                "The generation service is busy right now. Please wait a moment and retry."
                    .to_string(),
            ),
            TryOnError::Generation { .. } | TryOnError::EmptyResult => (
                "Generation failed",
                format!("{} {}", self, GENERIC_HINT),
            ),
            TryOnError::Persistence(_) => ("Storage error", self.to_string()),
            TryOnError::NotFound(_) => ("Not found", self.to_string()),
            TryOnError::Cancelled => ("Request cancelled", self.to_string()),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": title,
            "message": message
        }))
    }
}
