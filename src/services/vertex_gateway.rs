// src/services/vertex_gateway.rs
use crate::models::{GenerationParameters, GenerationRequest, GenerationResult};
use crate::services::gateway::{GatewayError, GenerationGateway};
use crate::services::image_normalizer::ImageNormalizer;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
}

/// Calls the virtual try-on model's `:predict` REST endpoint.
pub struct VertexTryOnGateway {
    endpoint: String,
    access_token: String,
    client: Client,
}

impl VertexTryOnGateway {
    pub fn new(
        project_id: &str,
        location: &str,
        model: &str,
        access_token: String,
    ) -> Result<Self, reqwest::Error> {
        let endpoint = format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project_id}/locations/{location}/publishers/google/models/{model}:predict"
        );

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            endpoint,
            access_token,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &GenerationRequest) -> Result<GenerationResult, GatewayError> {
        let start = Instant::now();
        let body = build_predict_body(request);

        debug!(
            "Predict request {} parameters: {}",
            request.id, body["parameters"]
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::from_upstream(format!("failed to send request: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::from_upstream(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = format!("API request failed with status {}: {}", status.as_u16(), text);
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(GatewayError::QuotaExceeded(message));
            }
            return Err(GatewayError::from_upstream(message));
        }

        let result = parse_predict_response(request, &text)?;

        info!(
            "Request {} produced {} image(s) in {}ms",
            request.id,
            result.images.len(),
            start.elapsed().as_millis()
        );

        Ok(result)
    }
}

#[async_trait]
impl GenerationGateway for VertexTryOnGateway {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = self.send(request) => result,
        }
    }

    fn name(&self) -> &str {
        "vertex-virtual-try-on"
    }
}

fn build_parameters(params: &GenerationParameters) -> Value {
    let mut output_options = json!({
        "mimeType": params.output_format().mime_type(),
    });
    if params.compression_quality() > 0 {
        output_options["compressionQuality"] = json!(params.compression_quality());
    }

    let mut parameters = json!({
        "addWatermark": params.add_watermark(),
        "baseSteps": params.base_steps(),
        "personGeneration": params.person_generation().as_str(),
        "safetySetting": params.safety_setting().as_str(),
        "sampleCount": params.sample_count(),
        "outputOptions": output_options,
    });

    // The API rejects a seed while watermarking is on.
    if !params.add_watermark() && params.seed() > 0 {
        parameters["seed"] = json!(params.seed());
    }

    parameters
}

fn build_predict_body(request: &GenerationRequest) -> Value {
    json!({
        "instances": [{
            "personImage": {
                "image": {
                    "bytesBase64Encoded": general_purpose::STANDARD.encode(request.person_image.data())
                }
            },
            "productImages": [{
                "image": {
                    "bytesBase64Encoded": general_purpose::STANDARD.encode(request.garment_image.data())
                }
            }]
        }],
        "parameters": build_parameters(&request.parameters)
    })
}

fn parse_predict_response(
    request: &GenerationRequest,
    body: &str,
) -> Result<GenerationResult, GatewayError> {
    let response: PredictResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::from_upstream(format!("failed to parse response: {}", e)))?;

    if response.predictions.is_empty() {
        return Err(GatewayError::Upstream(
            "no predictions in response".to_string(),
        ));
    }

    let images: Vec<_> = response
        .predictions
        .into_iter()
        .enumerate()
        .filter_map(|(i, prediction)| {
            let encoded = prediction.bytes_base64_encoded.filter(|b| !b.is_empty())?;
            let bytes = match general_purpose::STANDARD.decode(encoded) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping prediction {} for {}: {}", i, request.id, e);
                    return None;
                }
            };
            match ImageNormalizer::normalize(bytes) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(
                        "Skipping prediction {} ({:?}) for {}: {}",
                        i, prediction.mime_type, request.id, e
                    );
                    None
                }
            }
        })
        .collect();

    if images.is_empty() {
        return Err(GatewayError::Upstream(
            "no valid image data found in response".to_string(),
        ));
    }

    Ok(GenerationResult::new(request.id.clone(), images))
}
