//! Request throttling for shared extraction clients
//!
//! When several documents are processed at once against one provider, the
//! provider's rate limit applies to requests, not documents. `ThrottledClient`
//! bounds the number of requests in flight and holds nothing else.

use async_trait::async_trait;
use bearingkg_domain::{ClientError, ExtractionClient, ExtractionSettings};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

/// Bounds concurrent calls to the wrapped client
pub struct ThrottledClient<C> {
    inner: C,
    permits: Arc<Semaphore>,
}

impl<C> ThrottledClient<C> {
    /// Allow at most `max_in_flight` concurrent requests (minimum 1)
    pub fn new(inner: C, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Share an existing semaphore with other clients
    pub fn with_semaphore(inner: C, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }

    /// Wrapped client
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C> ExtractionClient for ThrottledClient<C>
where
    C: ExtractionClient,
{
    async fn extract(&self, prompt: &str, settings: &ExtractionSettings) -> Result<String, ClientError> {
        // A closed semaphore means the owner is shutting down
        let _permit = self.permits.acquire().await.map_err(|_| ClientError::Cancelled)?;
        trace!("Acquired request permit ({} left)", self.permits.available_permits());
        self.inner.extract(prompt, settings).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
