// src/services/gateway.rs
use crate::errors::{GenerationErrorKind, TryOnError};
use crate::models::{GenerationRequest, GenerationResult};
use crate::services::error_classifier;
use async_trait::async_trait;
use log::info;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    Upstream(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Wraps free-form upstream text, picking the kind from its content.
    pub fn from_upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        match error_classifier::classify(&message) {
            GenerationErrorKind::QuotaExceeded => GatewayError::QuotaExceeded(message),
            GenerationErrorKind::Generic => GatewayError::Upstream(message),
        }
    }

    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            GatewayError::QuotaExceeded(_) => GenerationErrorKind::QuotaExceeded,
            GatewayError::Upstream(_) | GatewayError::Cancelled => GenerationErrorKind::Generic,
        }
    }
}

impl From<GatewayError> for TryOnError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::QuotaExceeded(message) => TryOnError::quota(format!(
                "service temporarily unavailable due to high demand: {}",
                message
            )),
            GatewayError::Upstream(message) => {
                TryOnError::generic(format!("try-on generation failed: {}", message))
            }
            GatewayError::Cancelled => TryOnError::Cancelled,
        }
    }
}

/// External try-on capability: one person image, one garment image.
///
/// Implementations must return promptly with [`GatewayError::Cancelled`]
/// once `cancel` fires.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GatewayError>;

    fn name(&self) -> &str;
}

/// Echoes the garment image back `sample_count` times. Used when no
/// credentials are configured.
pub struct DryRunGateway;

#[async_trait]
impl GenerationGateway for DryRunGateway {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GatewayError> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        info!("Dry-run generation for request {}", request.id);

        let images = (0..request.parameters.sample_count())
            .map(|_| request.garment_image.as_ref().clone())
            .collect();

        Ok(GenerationResult::new(request.id.clone(), images))
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationParameters;
    use crate::services::image_normalizer::{ImageNormalizer, test_images};
    use std::sync::Arc;

    #[test]
    fn upstream_text_is_classified_at_the_boundary() {
        assert_eq!(
            GatewayError::from_upstream("429: Quota exceeded for base_model").kind(),
            GenerationErrorKind::QuotaExceeded
        );
        assert_eq!(
            GatewayError::from_upstream("bad gateway").kind(),
            GenerationErrorKind::Generic
        );
    }

    #[test]
    fn gateway_errors_convert_into_try_on_errors() {
        let quota: TryOnError = GatewayError::QuotaExceeded("x".into()).into();
        assert_eq!(quota.generation_kind(), GenerationErrorKind::QuotaExceeded);

        let generic: TryOnError = GatewayError::Upstream("boom".into()).into();
        assert_eq!(generic.generation_kind(), GenerationErrorKind::Generic);
        assert!(generic.to_string().contains("boom"));

        let cancelled: TryOnError = GatewayError::Cancelled.into();
        assert!(matches!(cancelled, TryOnError::Cancelled));
    }

    #[tokio::test]
    async fn dry_run_echoes_garment_per_sample() {
        let person = Arc::new(ImageNormalizer::normalize(test_images::jpeg_stub(64)).unwrap());
        let garment = Arc::new(ImageNormalizer::normalize(test_images::jpeg_stub(80)).unwrap());
        let params = GenerationParameters::new(
            true,
            32,
            Default::default(),
            Default::default(),
            3,
            0,
            Default::default(),
            0,
        )
        .unwrap();
        let request = GenerationRequest::new(person, Arc::clone(&garment), params);

        let result = DryRunGateway
            .generate(&request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.request_id, request.id);
        assert_eq!(result.images.len(), 3);
        assert!(result.images.iter().all(|img| img == garment.as_ref()));

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert_eq!(
            DryRunGateway.generate(&request, &cancelled).await.unwrap_err(),
            GatewayError::Cancelled
        );
    }
}
