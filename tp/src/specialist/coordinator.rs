//! Specialist coordinator
//!
//! Runs one planning pass: the selected specialists, layer by layer, on the
//! shared worker pool. Provider fetches happen here, inside the pool slot,
//! before the pure specialist function runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::categorize::CategorizeOptions;
use crate::domain::{FlightQuery, HotelQuery, PlanningRequest};
use crate::provider::{Capability, FallbackError, FallbackExecutor, ProviderError, ProviderRegistry};
use crate::scheduler::{PoolStats, WorkerPool};

use super::{
    Fetched, Ledger, SpecialistError, SpecialistInput, SpecialistKind, SpecialistResult, SpecialistTask, TaskGraph,
    TaskStatus, specialist_fn,
};

/// Knobs shared by every pass
#[derive(Debug, Clone)]
pub struct SpecialistOptions {
    pub currency: String,
    pub categorize: CategorizeOptions,
}

impl Default for SpecialistOptions {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            categorize: CategorizeOptions::default(),
        }
    }
}

/// Result of a successful pass
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// Fresh results for invoked specialists, carried-forward results for the rest
    pub ledger: Ledger,
    pub invoked: BTreeSet<SpecialistKind>,
    pub tasks: Vec<SpecialistTask>,
}

pub struct SpecialistCoordinator {
    registry: Arc<ProviderRegistry>,
    executor: FallbackExecutor,
    pool: WorkerPool,
    options: SpecialistOptions,
}

impl SpecialistCoordinator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        executor: FallbackExecutor,
        pool: WorkerPool,
        options: SpecialistOptions,
    ) -> Self {
        debug!(currency = %options.currency, "SpecialistCoordinator::new: called");
        Self {
            registry,
            executor,
            pool,
            options,
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Run `selected` specialists over `request`, reading everything else from `prior`
    pub async fn run_pass(
        &self,
        request: &PlanningRequest,
        selected: &BTreeSet<SpecialistKind>,
        prior: &Ledger,
        low_confidence: bool,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, SpecialistError> {
        debug!(?selected, carried = prior.len(), low_confidence, "run_pass: called");
        let graph = TaskGraph::new(selected);
        let layers = graph.layers()?;
        let mut tasks = graph.tasks();
        let mut ledger = prior.clone();
        info!(destination = %request.destination, specialists = selected.len(), layers = layers.len(), "Planning pass started");

        for layer in layers {
            set_status(&mut tasks, &layer, TaskStatus::Running);
            let results = join_all(
                layer
                    .iter()
                    .map(|kind| self.run_node(*kind, request, &ledger, low_confidence, cancel)),
            )
            .await;

            let mut first_error = None;
            for (kind, result) in layer.iter().zip(results) {
                match result {
                    Ok(result) => {
                        set_status(&mut tasks, &[*kind], TaskStatus::Done);
                        ledger.insert(*kind, result);
                    }
                    Err(e) => {
                        warn!(specialist = %kind, error = %e, "Specialist failed");
                        set_status(&mut tasks, &[*kind], TaskStatus::Failed);
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        info!(destination = %request.destination, "Planning pass complete");
        Ok(PassOutcome {
            ledger,
            invoked: selected.clone(),
            tasks,
        })
    }

    async fn run_node(
        &self,
        kind: SpecialistKind,
        request: &PlanningRequest,
        upstream: &Ledger,
        low_confidence: bool,
        cancel: &CancellationToken,
    ) -> Result<SpecialistResult, SpecialistError> {
        let label = kind.to_string();
        let task = async {
            let fetched = self.fetch(kind, request, cancel).await?;
            let input = SpecialistInput {
                request,
                upstream,
                fetched: &fetched,
                currency: &self.options.currency,
                categorize: self.options.categorize,
                low_confidence,
            };
            specialist_fn(kind)(&input)
        };
        let result = self.pool.run(&label, cancel, task).await?;
        debug!(specialist = %kind, ok = result.is_ok(), "run_node: finished");
        result
    }

    /// Provider data a specialist needs before it can run
    async fn fetch(
        &self,
        kind: SpecialistKind,
        request: &PlanningRequest,
        cancel: &CancellationToken,
    ) -> Result<Fetched, SpecialistError> {
        debug!(specialist = %kind, "fetch: called");
        let preferred = request.preferred_provider.as_deref();
        match kind {
            SpecialistKind::Destination => {
                let chain = self.registry.generative_chain(preferred);
                let outcome = self
                    .executor
                    .execute(Capability::GenerateItinerary, &chain, cancel, |provider| async move {
                        provider.generate_itinerary(request).await
                    })
                    .await
                    .map_err(|e| match e {
                        FallbackError::Cancelled => SpecialistError::Cancelled,
                        other => SpecialistError::Generation(other),
                    })?;
                Ok(Fetched::Itinerary(outcome))
            }
            SpecialistKind::Logistics => {
                let route = request.effective_route();
                let query = FlightQuery {
                    origin: request.origin.clone(),
                    destination: route
                        .first()
                        .map(|s| s.city.clone())
                        .unwrap_or_else(|| request.destination.clone()),
                    dates: request.dates,
                    travelers: request.travelers,
                };
                let chain = self.registry.inventory_chain(Capability::SearchFlights, preferred);
                let currency = self.options.currency.as_str();
                let result = self
                    .executor
                    .execute(Capability::SearchFlights, &chain, cancel, |provider| {
                        let query = &query;
                        async move {
                            let page = provider.search_flights(query).await?;
                            page.check_currency(currency).map_err(ProviderError::DataInvalid)?;
                            Ok(page)
                        }
                    })
                    .await;
                if matches!(result, Err(FallbackError::Cancelled)) {
                    return Err(SpecialistError::Cancelled);
                }
                Ok(Fetched::Flights(result))
            }
            SpecialistKind::Booking => {
                let query = HotelQuery {
                    destination: main_city(request),
                    dates: request.dates,
                    travelers: request.travelers,
                };
                let chain = self.registry.inventory_chain(Capability::SearchHotels, preferred);
                let currency = self.options.currency.as_str();
                let result = self
                    .executor
                    .execute(Capability::SearchHotels, &chain, cancel, |provider| {
                        let query = &query;
                        async move {
                            let page = provider.search_hotels(query).await?;
                            page.check_currency(currency).map_err(ProviderError::DataInvalid)?;
                            Ok(page)
                        }
                    })
                    .await;
                if matches!(result, Err(FallbackError::Cancelled)) {
                    return Err(SpecialistError::Cancelled);
                }
                Ok(Fetched::Hotels(result))
            }
            SpecialistKind::Budget | SpecialistKind::Culture | SpecialistKind::Coordinator => Ok(Fetched::Nothing),
        }
    }
}

/// City with the most nights; the earliest wins ties
fn main_city(request: &PlanningRequest) -> String {
    request
        .effective_route()
        .into_iter()
        .rev()
        .max_by_key(|s| s.nights)
        .map(|s| s.city)
        .unwrap_or_else(|| request.destination.clone())
}

fn set_status(tasks: &mut [SpecialistTask], kinds: &[SpecialistKind], status: TaskStatus) {
    for task in tasks.iter_mut().filter(|t| kinds.contains(&t.kind)) {
        task.status = status;
    }
}
