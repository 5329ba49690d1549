// src/services/mod.rs
pub mod error_classifier;
pub mod gateway;
pub mod image_normalizer;
pub mod orchestrator;
pub mod parameter_normalizer;
pub mod redis_service;
pub mod store;
pub mod vertex_gateway;

pub use gateway::{DryRunGateway, GenerationGateway};
pub use orchestrator::TryOnOrchestrator;
pub use parameter_normalizer::RawParameters;
pub use redis_service::RedisRequestStore;
pub use store::{InMemoryRequestStore, RequestStore};
pub use vertex_gateway::VertexTryOnGateway;
