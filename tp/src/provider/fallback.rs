//! Fallback executor
//!
//! Walks a provider chain in order, bounding every attempt with a timeout.
//! The first schema-valid answer wins; data from failed attempts is dropped
//! and never combined with the winner's.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{QualityMetadata, Validate};

use super::{Capability, ChainLink, ProviderError};

/// Why one provider in a chain did not produce the result
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.error)
    }
}

fn describe(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers registered".to_string();
    }
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Chain-level failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FallbackError {
    #[error("All providers failed for {capability}: {}", describe(.failures))]
    AllProvidersFailed {
        capability: Capability,
        failures: Vec<ProviderFailure>,
    },

    #[error("Provider call cancelled")]
    Cancelled,
}

/// A successful chain execution
#[derive(Debug, Clone)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub provider_id: String,
    pub quality: QualityMetadata,
    /// Attempts that failed before the winner, in chain order
    pub failures: Vec<ProviderFailure>,
}

/// Runs provider calls down an ordered chain
#[derive(Debug, Clone)]
pub struct FallbackExecutor {
    timeout: Duration,
}

impl FallbackExecutor {
    pub fn new(timeout: Duration) -> Self {
        debug!(?timeout, "FallbackExecutor::new: called");
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Try each provider in `chain` until one returns valid data
    ///
    /// The retry budget is the chain length. A timed-out attempt is dropped
    /// and its eventual answer is never observed.
    pub async fn execute<P, T, F, Fut>(
        &self,
        capability: Capability,
        chain: &[ChainLink<P>],
        cancel: &CancellationToken,
        call: F,
    ) -> Result<FallbackOutcome<T>, FallbackError>
    where
        P: ?Sized,
        T: Validate,
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        debug!(%capability, chain_len = chain.len(), "execute: called");
        let mut failures: Vec<ProviderFailure> = Vec::new();

        for (idx, link) in chain.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(%capability, "execute: cancelled before attempt");
                return Err(FallbackError::Cancelled);
            }
            let provider_id = link.descriptor.id.clone();

            let error = if !link.descriptor.supports(capability) {
                ProviderError::Unsupported(capability)
            } else if !link.descriptor.available {
                ProviderError::Unavailable("marked unavailable by last probe".to_string())
            } else {
                debug!(%capability, provider = %provider_id, attempt = idx + 1, "execute: trying provider");
                let attempt = tokio::time::timeout(self.timeout, call(link.provider.clone()));
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(%capability, provider = %provider_id, "execute: cancelled mid-call");
                        return Err(FallbackError::Cancelled);
                    }
                    result = attempt => result,
                };

                match result {
                    Err(_) => ProviderError::Timeout(self.timeout),
                    Ok(Err(e)) => e,
                    Ok(Ok(value)) => match value.validate() {
                        Ok(()) => {
                            let mut quality = QualityMetadata::new(
                                provider_id.clone(),
                                link.descriptor.confidence,
                                link.descriptor.freshness,
                            );
                            quality.fallback_used = idx > 0;
                            for failure in &failures {
                                quality.note(format!("fell back past {}", failure));
                            }
                            if quality.fallback_used {
                                info!(%capability, provider = %provider_id, skipped = failures.len(), "Fallback provider succeeded");
                            }
                            return Ok(FallbackOutcome {
                                value,
                                provider_id,
                                quality,
                                failures,
                            });
                        }
                        Err(reason) => ProviderError::DataInvalid(reason),
                    },
                }
            };

            warn!(%capability, provider = %provider_id, kind = error.kind(), error = %error, "Provider attempt failed");
            failures.push(ProviderFailure { provider_id, error });
        }

        warn!(%capability, attempts = failures.len(), "All providers failed");
        Err(FallbackError::AllProvidersFailed { capability, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DateRange, Itinerary, PlanningRequest, TripDraft};
    use crate::provider::mock::{MockBehavior, MockGenerativeProvider};
    use crate::provider::{GenerativeProvider, ProviderDescriptor};

    fn request() -> PlanningRequest {
        TripDraft {
            origin: Some("Boston".to_string()),
            destination: Some("Lisbon".to_string()),
            dates: Some("2025-09-10..2025-09-13".parse::<DateRange>().unwrap()),
            travelers: Some(1),
            ..Default::default()
        }
        .to_request()
        .unwrap()
    }

    fn link(id: &str, provider: Arc<MockGenerativeProvider>) -> ChainLink<dyn GenerativeProvider> {
        ChainLink {
            descriptor: ProviderDescriptor::new(id, vec![Capability::GenerateItinerary], 10, 0.9),
            provider,
        }
    }

    async fn run(
        executor: &FallbackExecutor,
        chain: &[ChainLink<dyn GenerativeProvider>],
        cancel: &CancellationToken,
    ) -> Result<FallbackOutcome<Itinerary>, FallbackError> {
        let request = request();
        let request = &request;
        executor
            .execute(Capability::GenerateItinerary, chain, cancel, |p| async move {
                p.generate_itinerary(request).await
            })
            .await
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let a = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        let b = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        let chain = vec![link("a", a.clone()), link("b", b.clone())];
        let outcome = run(&FallbackExecutor::new(Duration::from_secs(1)), &chain, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.provider_id, "a");
        assert!(!outcome.quality.fallback_used);
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_data_falls_back() {
        let a = Arc::new(MockGenerativeProvider::new(MockBehavior::Invalid));
        let b = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        let chain = vec![link("a", a.clone()), link("b", b.clone())];
        let outcome = run(&FallbackExecutor::new(Duration::from_secs(1)), &chain, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.provider_id, "b");
        assert!(outcome.quality.fallback_used);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(outcome.failures[0].error, ProviderError::DataInvalid(_)));
        assert_eq!(outcome.quality.source_notes.len(), 1);
        assert_eq!(a.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_advances_chain() {
        let a = Arc::new(MockGenerativeProvider::new(MockBehavior::Slow(Duration::from_secs(5))));
        let b = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        let chain = vec![link("a", a), link("b", b)];
        let started = std::time::Instant::now();
        let outcome = run(&FallbackExecutor::new(Duration::from_millis(50)), &chain, &CancellationToken::new())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.provider_id, "b");
        assert!(matches!(outcome.failures[0].error, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_all_failed_reports_each_reason_in_order() {
        let a = Arc::new(MockGenerativeProvider::new(MockBehavior::Fail(ProviderError::Unavailable(
            "down".to_string(),
        ))));
        let b = Arc::new(MockGenerativeProvider::new(MockBehavior::Invalid));
        let chain = vec![link("a", a), link("b", b)];
        let err = run(&FallbackExecutor::new(Duration::from_secs(1)), &chain, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            FallbackError::AllProvidersFailed { capability, failures } => {
                assert_eq!(capability, Capability::GenerateItinerary);
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider_id, "a");
                assert_eq!(failures[1].provider_id, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_descriptor_is_skipped_without_calling() {
        let a = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        let b = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        let mut first = link("a", a.clone());
        first.descriptor.available = false;
        let chain = vec![first, link("b", b)];
        let outcome = run(&FallbackExecutor::new(Duration::from_secs(1)), &chain, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.provider_id, "b");
        assert!(outcome.quality.fallback_used);
        assert_eq!(a.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let err = run(&FallbackExecutor::new(Duration::from_secs(1)), &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no providers registered"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_call() {
        let a = Arc::new(MockGenerativeProvider::new(MockBehavior::Slow(Duration::from_secs(10))));
        let chain = vec![link("a", a)];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let started = std::time::Instant::now();
        let err = run(&FallbackExecutor::new(Duration::from_secs(30)), &chain, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, FallbackError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
