// src/services/orchestrator.rs
use crate::errors::TryOnError;
use crate::models::*;
use crate::services::gateway::GenerationGateway;
use crate::services::image_normalizer::ImageNormalizer;
use crate::services::parameter_normalizer::{ParameterNormalizer, RawParameters};
use crate::services::store::RequestStore;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Fans one person image out against every garment image and merges the
/// generated images back in garment order.
///
/// All-or-nothing: the first failing garment cancels its siblings and its
/// error is returned; results already produced are discarded. Outbound calls
/// are bounded by a semaphore shared across every call on this instance.
pub struct TryOnOrchestrator {
    store: Arc<dyn RequestStore>,
    gateway: Arc<dyn GenerationGateway>,
    permits: Arc<Semaphore>,
}

/// One garment's worth of work.
struct GenerationUnit {
    index: usize,
    store: Arc<dyn RequestStore>,
    gateway: Arc<dyn GenerationGateway>,
    permits: Arc<Semaphore>,
    person: Arc<ImageData>,
    garment: Arc<ImageData>,
    parameters: GenerationParameters,
    cancel: CancellationToken,
}

impl TryOnOrchestrator {
    pub fn new(
        store: Arc<dyn RequestStore>,
        gateway: Arc<dyn GenerationGateway>,
        max_concurrent_generations: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            permits: Arc::new(Semaphore::new(max_concurrent_generations.max(1))),
        }
    }

    pub async fn execute(
        &self,
        person: ImageInput,
        garments: Vec<ImageInput>,
        raw_parameters: &RawParameters,
        cancel: &CancellationToken,
    ) -> Result<AggregatedOutput, TryOnError> {
        let start = Instant::now();

        let parameters = ParameterNormalizer::normalize(raw_parameters)?;

        let person = ImageNormalizer::normalize_input(person)
            .map(Arc::new)
            .map_err(|e| TryOnError::Validation(format!("invalid person image: {}", e)))?;

        if garments.is_empty() {
            return Err(TryOnError::Validation(
                "at least one garment image is required".to_string(),
            ));
        }

        // Every garment is checked before any work is spawned.
        let garments = garments
            .into_iter()
            .enumerate()
            .map(|(i, garment)| {
                ImageNormalizer::normalize_input(garment)
                    .map(Arc::new)
                    .map_err(|e| {
                        TryOnError::Validation(format!("invalid garment image #{}: {}", i + 1, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let garment_count = garments.len();
        info!(
            "Starting try-on for {} garment(s) via {}",
            garment_count,
            self.gateway.name()
        );

        let units_cancel = cancel.child_token();
        let mut tasks = JoinSet::new();
        for (index, garment) in garments.into_iter().enumerate() {
            let unit = GenerationUnit {
                index,
                store: Arc::clone(&self.store),
                gateway: Arc::clone(&self.gateway),
                permits: Arc::clone(&self.permits),
                person: Arc::clone(&person),
                garment,
                parameters: parameters.clone(),
                cancel: units_cancel.clone(),
            };
            tasks.spawn(async move { (unit.index, unit.run().await) });
        }

        let mut slots: Vec<Option<Arc<GenerationResult>>> = vec![None; garment_count];
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    units_cancel.cancel();
                    return Err(TryOnError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else { break };

            let outcome = match joined {
                Ok((index, outcome)) => outcome.map(|result| (index, result)),
                Err(e) => Err(TryOnError::generic(format!(
                    "generation task failed: {}",
                    e
                ))),
            };

            match outcome {
                Ok((index, result)) => slots[index] = Some(Arc::new(result)),
                Err(err) => {
                    warn!("Try-on failed, cancelling remaining garments: {}", err);
                    units_cancel.cancel();
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        let results = slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| TryOnError::generic("generation unit produced no outcome"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for result in &results {
            self.store.save_result(Arc::clone(result)).await?;
        }

        let request_id = results
            .first()
            .map(|r| r.request_id.clone())
            .ok_or(TryOnError::EmptyResult)?;

        let mime_type = parameters.output_format().mime_type();
        let images: Vec<ImageOutput> = results
            .iter()
            .flat_map(|result| result.images.iter())
            .map(|image| ImageOutput {
                data: image.data().to_vec(),
                mime_type: mime_type.to_string(),
            })
            .collect();

        info!(
            "Try-on {} finished with {} image(s) in {}ms",
            request_id,
            images.len(),
            start.elapsed().as_millis()
        );

        Ok(AggregatedOutput { request_id, images })
    }
}

impl GenerationUnit {
    async fn run(self) -> Result<GenerationResult, TryOnError> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TryOnError::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => permit
                .map_err(|_| TryOnError::generic("generation limiter closed"))?,
        };

        let (person, garment) = (self.person, self.garment);
        let (person, garment) = tokio::task::spawn_blocking(move || {
            let person = ImageNormalizer::to_canonical_encoding(person)?;
            let garment = ImageNormalizer::to_canonical_encoding(garment)?;
            Ok::<_, TryOnError>((person, garment))
        })
        .await
        .map_err(|e| TryOnError::generic(format!("image conversion task failed: {}", e)))??;

        let request = Arc::new(GenerationRequest::new(person, garment, self.parameters));
        self.store.save(Arc::clone(&request)).await?;
        debug!("Garment #{} saved as request {}", self.index + 1, request.id);

        let result = self
            .gateway
            .generate(&request, &self.cancel)
            .await
            .map_err(|e| {
                warn!(
                    "Gateway failed for request {} ({:?}): {}",
                    request.id,
                    e.kind(),
                    e
                );
                TryOnError::from(e)
            })?;

        if !result.has_images() {
            return Err(TryOnError::EmptyResult);
        }

        Ok(result)
    }
}
