// src/services/store.rs
use crate::errors::TryOnError;
use crate::models::{GenerationRequest, GenerationResult, RequestId};
use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Persistence for generation requests and their results.
///
/// Implementations are shared across concurrent orchestrator calls and must
/// synchronize internally.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn save(&self, request: Arc<GenerationRequest>) -> Result<(), TryOnError>;

    async fn find_by_id(&self, id: &RequestId) -> Result<Arc<GenerationRequest>, TryOnError>;

    async fn save_result(&self, result: Arc<GenerationResult>) -> Result<(), TryOnError>;

    async fn find_result_by_request_id(
        &self,
        request_id: &RequestId,
    ) -> Result<Arc<GenerationResult>, TryOnError>;
}

struct Entry<T> {
    value: Arc<T>,
    inserted_at: Instant,
}

/// Insertion-ordered map that drops its oldest entries first.
struct BoundedMap<T> {
    entries: HashMap<RequestId, Entry<T>>,
    order: VecDeque<RequestId>,
}

impl<T> BoundedMap<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn insert(&mut self, key: RequestId, value: Arc<T>, capacity: usize, ttl: Duration) {
        let now = Instant::now();

        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }

        // Entries share one TTL, so the expired ones sit at the front.
        while let Some(front) = self.order.front() {
            let expired = self
                .entries
                .get(front)
                .is_none_or(|e| now.duration_since(e.inserted_at) >= ttl);
            if !expired && self.order.len() < capacity {
                break;
            }
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
                debug!("Evicted store entry {}", evicted);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
            },
        );
    }

    fn get(&self, key: &RequestId, ttl: Duration) -> Option<Arc<T>> {
        self.entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < ttl)
            .map(|e| Arc::clone(&e.value))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Inner {
    requests: BoundedMap<GenerationRequest>,
    results: BoundedMap<GenerationResult>,
}

/// In-process store behind a single reader/writer lock, bounded by entry
/// count and age.
pub struct InMemoryRequestStore {
    inner: RwLock<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl InMemoryRequestStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                requests: BoundedMap::new(),
                results: BoundedMap::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        (inner.requests.len(), inner.results.len())
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn save(&self, request: Arc<GenerationRequest>) -> Result<(), TryOnError> {
        let mut inner = self.inner.write().await;
        let key = request.id.clone();
        inner.requests.insert(key, request, self.capacity, self.ttl);
        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Arc<GenerationRequest>, TryOnError> {
        let inner = self.inner.read().await;
        inner
            .requests
            .get(id, self.ttl)
            .ok_or_else(|| TryOnError::NotFound(format!("request not found: {}", id)))
    }

    async fn save_result(&self, result: Arc<GenerationResult>) -> Result<(), TryOnError> {
        let mut inner = self.inner.write().await;
        let key = result.request_id.clone();
        inner.results.insert(key, result, self.capacity, self.ttl);
        Ok(())
    }

    async fn find_result_by_request_id(
        &self,
        request_id: &RequestId,
    ) -> Result<Arc<GenerationResult>, TryOnError> {
        let inner = self.inner.read().await;
        inner.results.get(request_id, self.ttl).ok_or_else(|| {
            TryOnError::NotFound(format!("result not found for request: {}", request_id))
        })
    }
}
