//! Retry with exponential backoff and a per-run circuit breaker around any
//! [`EnrichmentModel`].
//!
//! The delay before attempt `n + 1` is
//! `min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)`.
//! Only [`EnrichmentError::Transient`] is retried.

use rand::Rng;
use sn_core::config::EnrichmentConfig;
use sn_core::{Enrichment, EnrichmentError, EnrichmentModel, EnrichmentRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::breaker::CircuitBreaker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls per article, first attempt included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Backoff before the next attempt, `attempt` being the number of calls made so far.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EnrichmentConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Enriched(Enrichment),
    /// Retries exhausted or a permanent error.
    Failed { attempts: u32, error: EnrichmentError },
    /// The breaker was open before the first call.
    ShortCircuited,
}

/// Decorates a model with retry/backoff and a breaker shared by every article of one run.
pub struct ResilientEnricher {
    model: Arc<dyn EnrichmentModel>,
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientEnricher {
    pub fn new(model: Arc<dyn EnrichmentModel>, policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self { model, policy, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn enrich(&self, request: &EnrichmentRequest) -> EnrichOutcome {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            if self.breaker.is_open() {
                return if attempt == 0 {
                    EnrichOutcome::ShortCircuited
                } else {
                    EnrichOutcome::Failed {
                        attempts: attempt,
                        error: EnrichmentError::Transient("circuit breaker opened".to_string()),
                    }
                };
            }

            attempt += 1;
            match self.model.enrich(request).await {
                Ok(enrichment) => {
                    self.breaker.record_success();
                    debug!(attempt, model = self.model.name(), "Enrichment succeeded");
                    return EnrichOutcome::Enriched(enrichment);
                }
                Err(e @ EnrichmentError::Permanent(_)) => {
                    error!(attempt, title = %request.title, error = %e, "Enrichment failed permanently");
                    return EnrichOutcome::Failed { attempts: attempt, error: e };
                }
                Err(e) => {
                    self.breaker.record_transient_failure();
                    if attempt >= self.policy.max_attempts {
                        error!(
                            attempt,
                            max = self.policy.max_attempts,
                            elapsed_ms_total = started.elapsed().as_millis() as u64,
                            title = %request.title,
                            error = %e,
                            "Enrichment exhausted retries"
                        );
                        return EnrichOutcome::Failed { attempts: attempt, error: e };
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        ?delay,
                        error = %e,
                        "Enrichment attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
