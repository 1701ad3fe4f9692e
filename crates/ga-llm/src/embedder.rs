//! HTTP-backed implementation of the `ga-memory` embedding seam.

use std::time::Duration;

use tracing::warn;

use ga_memory::{EmbedError, Embedder};

use crate::provider::Provider;

const DEFAULT_RETRY: u32 = 10;
const DEFAULT_RETRY_SLEEP: Duration = Duration::from_secs(5);

/// Embeds through a [`Provider`], retrying transient failures.  Each
/// associate store owns its own `LlmEmbedder` (and thus its own HTTP
/// client) — nothing is shared process-wide.
pub struct LlmEmbedder {
    provider: Provider,
    retry: u32,
    retry_sleep: Duration,
}

impl LlmEmbedder {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            retry: DEFAULT_RETRY,
            retry_sleep: DEFAULT_RETRY_SLEEP,
        }
    }

    pub fn with_retry(mut self, retry: u32, sleep: Duration) -> Self {
        self.retry = retry.max(1);
        self.retry_sleep = sleep;
        self
    }
}

impl Embedder for LlmEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut last_err = String::new();
        for attempt in 0..self.retry {
            match self.provider.embed(text) {
                Ok(vector) if !vector.is_empty() => return Ok(vector),
                Ok(_) => last_err = "empty embedding".to_string(),
                Err(err) => {
                    last_err = err.to_string();
                    if !err.is_transient() {
                        break;
                    }
                    warn!(attempt, %err, "transient embedding error, backing off");
                    std::thread::sleep(self.retry_sleep);
                }
            }
        }
        Err(EmbedError(last_err))
    }

    fn name(&self) -> &str {
        self.provider.model()
    }
}
