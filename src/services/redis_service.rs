// src/services/redis_service.rs
use crate::errors::TryOnError;
use crate::models::{GenerationRequest, GenerationResult, RequestId};
use crate::services::store::RequestStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

fn request_key(id: &RequestId) -> String {
    format!("tryon:request:{}", id.as_str())
}

fn result_key(request_id: &RequestId) -> String {
    format!("tryon:result:{}", request_id.as_str())
}

/// Stores requests and results as JSON with a per-key expiry.
pub struct RedisRequestStore {
    client: Client,
    ttl_secs: usize,
}

impl RedisRequestStore {
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self, TryOnError> {
        let client =
            Client::open(redis_url).map_err(|e| TryOnError::Persistence(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| TryOnError::Persistence(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| TryOnError::Persistence(e.to_string()))?;

        Ok(Self {
            client,
            ttl_secs: ttl.as_secs().max(1) as usize,
        })
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), TryOnError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| TryOnError::Persistence(e.to_string()))?;

        let value = serde_json::to_string(value)
            .map_err(|e| TryOnError::Persistence(format!("serialization failed: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, value, self.ttl_secs)
            .await
            .map_err(|e| TryOnError::Persistence(e.to_string()))
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str, what: &str) -> Result<T, TryOnError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| TryOnError::Persistence(e.to_string()))?;

        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| TryOnError::Persistence(e.to_string()))?;

        let value = value.ok_or_else(|| TryOnError::NotFound(what.to_string()))?;

        serde_json::from_str(&value)
            .map_err(|e| TryOnError::Persistence(format!("deserialization failed: {}", e)))
    }
}

#[async_trait]
impl RequestStore for RedisRequestStore {
    async fn save(&self, request: Arc<GenerationRequest>) -> Result<(), TryOnError> {
        self.put(&request_key(&request.id), request.as_ref()).await
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Arc<GenerationRequest>, TryOnError> {
        self.fetch(&request_key(id), &format!("request not found: {}", id))
            .await
            .map(Arc::new)
    }

    async fn save_result(&self, result: Arc<GenerationResult>) -> Result<(), TryOnError> {
        self.put(&result_key(&result.request_id), result.as_ref())
            .await
    }

    async fn find_result_by_request_id(
        &self,
        request_id: &RequestId,
    ) -> Result<Arc<GenerationResult>, TryOnError> {
        self.fetch(
            &result_key(request_id),
            &format!("result not found for request: {}", request_id),
        )
        .await
        .map(Arc::new)
    }
}
