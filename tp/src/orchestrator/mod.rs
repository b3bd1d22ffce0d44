//! Hybrid planning orchestrator
//!
//! Entry point for every planning operation. Owns the provider registry, the
//! specialist coordinator and the session store handle. Each session has a
//! single writer at a time: mutating operations hold that session's async
//! lock from load to save. Every generation or refinement run gets a child of
//! the root cancellation token so one session can be cancelled on its own.

mod builtin;
mod error;

pub use builtin::{FIXTURE_PROVIDER_ID, LLM_PROVIDER_ID, TEMPLATE_PROVIDER_ID, register_builtin_providers};
pub use error::PlanningError;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::categorize::CategorizeOptions;
use crate::config::Config;
use crate::domain::{DraftField, SessionId, TripDraft};
use crate::provider::{Capability, FallbackExecutor, ProviderDescriptor, ProviderRegistry};
use crate::scheduler::{PoolStats, WorkerPool};
use crate::session::{FinalPlan, PlanningSession, SessionRecord, SessionSnapshot};
use crate::specialist::{Ledger, SpecialistCoordinator, SpecialistKind, SpecialistOptions, classify, synthesize};
use crate::state::StateManager;

/// Runtime settings for an orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub max_refinements: u32,
    pub currency: String,
    pub provider_timeout: Duration,
    pub worker_pool_size: usize,
    pub categorize: CategorizeOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OrchestratorOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_refinements: config.session.max_refinements,
            currency: config.session.currency.clone(),
            provider_timeout: config.providers.timeout(),
            worker_pool_size: config.coordinator.worker_pool_size,
            categorize: CategorizeOptions {
                top_k: config.categorize.top_k,
                luxury_rating_floor: config.categorize.luxury_rating_floor,
            },
        }
    }
}

/// Removes a run's cancellation token however the run ends
struct RunGuard<'a> {
    runs: &'a Mutex<HashMap<SessionId, CancellationToken>>,
    id: SessionId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.runs.lock().remove(&self.id) {
            // Stops provider calls still in flight when the run is abandoned
            token.cancel();
        }
    }
}

/// Which pass a `PassGuard` is watching
#[derive(Debug, Clone, Copy)]
enum PassKind {
    Generation,
    Refinement,
}

/// Holds the session lock for a pass and restores a resting state if the
/// pass is dropped or panics before its outcome is saved
struct PassGuard {
    state: StateManager,
    id: SessionId,
    kind: PassKind,
    lock: Option<OwnedMutexGuard<()>>,
    armed: bool,
}

impl PassGuard {
    fn new(state: &StateManager, id: &SessionId, kind: PassKind, lock: OwnedMutexGuard<()>) -> Self {
        Self {
            state: state.clone(),
            id: id.clone(),
            kind,
            lock: Some(lock),
            armed: true,
        }
    }

    /// The pass outcome is saved; nothing to restore
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(id = %self.id, "Planning pass interrupted outside a runtime, session not restored");
            return;
        };
        warn!(id = %self.id, kind = ?self.kind, "Planning pass interrupted, restoring session");
        let state = self.state.clone();
        let id = self.id.clone();
        let kind = self.kind;
        // The lock moves into the task so no caller sees the mid-pass state
        let lock = self.lock.take();
        handle.spawn(async move {
            let _lock = lock;
            let mut record = match state.get_required(&id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(%id, error = %e, "Could not load interrupted session");
                    return;
                }
            };
            let reason = "the planning pass was interrupted before it finished";
            let restored = match kind {
                PassKind::Generation => record.session.fail_generation(reason),
                PassKind::Refinement => record.session.abort_refinement(reason),
            };
            // Already resting when the outcome was saved just before the drop
            if restored.is_err() {
                return;
            }
            if let Err(e) = state.update(record).await {
                warn!(%id, error = %e, "Could not restore interrupted session");
            }
        });
    }
}

pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    coordinator: SpecialistCoordinator,
    state: StateManager,
    options: OrchestratorOptions,
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
    runs: Mutex<HashMap<SessionId, CancellationToken>>,
    root: CancellationToken,
}

impl Orchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, state: StateManager, options: OrchestratorOptions) -> Self {
        debug!(?options, "Orchestrator::new: called");
        let coordinator = SpecialistCoordinator::new(
            registry.clone(),
            FallbackExecutor::new(options.provider_timeout),
            WorkerPool::new(options.worker_pool_size),
            SpecialistOptions {
                currency: options.currency.clone(),
                categorize: options.categorize,
            },
        );
        Self {
            registry,
            coordinator,
            state,
            options,
            locks: Mutex::new(HashMap::new()),
            runs: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Build an orchestrator with the built-in providers and an in-memory store
    ///
    /// Must be called inside a tokio runtime; the store actor is spawned here.
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        debug!("Orchestrator::from_config: called");
        config.validate()?;
        let registry = Arc::new(ProviderRegistry::new(config.providers.probe_timeout()));
        register_builtin_providers(&registry, config)?;
        Ok(Self::new(registry, StateManager::in_memory(), OrchestratorOptions::from(config)))
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.coordinator.pool_stats()
    }

    fn session_lock(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(id.clone()).or_default().clone()
    }

    fn begin_run(&self, id: &SessionId) -> (CancellationToken, RunGuard<'_>) {
        let token = self.root.child_token();
        self.runs.lock().insert(id.clone(), token.clone());
        (
            token,
            RunGuard {
                runs: &self.runs,
                id: id.clone(),
            },
        )
    }

    async fn load(&self, id: &SessionId) -> Result<SessionRecord, PlanningError> {
        self.state
            .get_required(id)
            .await
            .map_err(|e| PlanningError::from_state(id, e))
    }

    async fn save(&self, record: SessionRecord) -> Result<SessionRecord, PlanningError> {
        let id = record.id().clone();
        self.state.update(record).await.map_err(|e| PlanningError::from_state(&id, e))
    }

    /// Open a session; plans immediately when every required field is present
    ///
    /// When initial generation exhausts every provider the session is kept in
    /// `generation_failed` and `AllProvidersFailed` is returned.
    pub async fn start_planning(&self, draft: TripDraft) -> Result<SessionSnapshot, PlanningError> {
        debug!(destination = ?draft.destination, "start_planning: called");
        let session = PlanningSession::new(draft, self.options.max_refinements);
        let id = session.id.clone();
        let lock = self.session_lock(&id).lock_owned().await;

        let record = self.state.create(SessionRecord::new(session)).await?;
        info!(%id, "Planning session started");
        if !record.session.draft.is_complete() {
            debug!(%id, missing = ?record.session.draft.missing_fields(), "start_planning: collecting info");
            return Ok(record.session.snapshot());
        }
        self.generate(record, lock).await
    }

    /// Supply one missing field; generation starts once the draft is complete
    pub async fn answer_followup(
        &self,
        id: &SessionId,
        field: DraftField,
        value: &str,
    ) -> Result<SessionSnapshot, PlanningError> {
        debug!(%id, %field, "answer_followup: called");
        let lock = self.session_lock(id).lock_owned().await;

        let mut record = self.load(id).await?;
        record
            .session
            .answer(field, value)
            .map_err(|e| PlanningError::from_session(id, e))?;
        let record = self.save(record).await?;
        if !record.session.draft.is_complete() {
            return Ok(record.session.snapshot());
        }
        self.generate(record, lock).await
    }

    /// Run every specialist for a fresh plan under the caller's session lock
    async fn generate(
        &self,
        mut record: SessionRecord,
        lock: OwnedMutexGuard<()>,
    ) -> Result<SessionSnapshot, PlanningError> {
        let id = record.id().clone();
        debug!(%id, "generate: called");
        let request = record
            .session
            .begin_generation()
            .map_err(|e| PlanningError::from_session(&id, e))?;
        // Armed before the save so a drop mid-save is still restored
        let mut restore = PassGuard::new(&self.state, &id, PassKind::Generation, lock);
        let mut record = self.save(record).await?;

        let (cancel, _run) = self.begin_run(&id);
        let all: BTreeSet<SpecialistKind> = SpecialistKind::ALL.into_iter().collect();
        let result = match self
            .coordinator
            .run_pass(&request, &all, &Ledger::new(), false, &cancel)
            .await
        {
            Ok(pass) => synthesize(&request, &pass.ledger, &pass.invoked, false, &self.options.currency)
                .map(|plan| (pass.ledger, plan)),
            Err(e) => Err(e),
        };

        match result {
            Ok((ledger, plan)) => {
                record
                    .session
                    .complete_generation(ledger, plan)
                    .map_err(|e| PlanningError::from_session(&id, e))?;
                let record = self.save(record).await?;
                restore.disarm();
                Ok(record.session.snapshot())
            }
            Err(e) => {
                warn!(%id, error = %e, "Plan generation failed");
                record
                    .session
                    .fail_generation(e.to_string())
                    .map_err(|e| PlanningError::from_session(&id, e))?;
                self.save(record).await?;
                restore.disarm();
                Err(PlanningError::from_pass(&id, e))
            }
        }
    }

    /// Apply a free-text change and re-run the specialists it touches
    ///
    /// A failed pass leaves the previous plan in place and does not count
    /// against the refinement limit.
    pub async fn refine(&self, id: &SessionId, change: &str) -> Result<SessionSnapshot, PlanningError> {
        debug!(%id, %change, "refine: called");
        let lock = self.session_lock(id).lock_owned().await;

        let mut record = self.load(id).await?;
        record
            .session
            .begin_refinement()
            .map_err(|e| PlanningError::from_session(id, e))?;
        let current = record
            .session
            .effective_request()
            .ok_or_else(|| PlanningError::from_session(id, crate::session::SessionError::NoPlan))?;
        let classification = classify(change, &current);
        let next = current.adjusted(&classification.adjustments);
        info!(%id, class = %classification.class, specialists = ?classification.specialists, "Refining plan");

        let mut restore = PassGuard::new(&self.state, id, PassKind::Refinement, lock);
        let mut record = self.save(record).await?;

        let (cancel, _run) = self.begin_run(id);
        let result = match self
            .coordinator
            .run_pass(
                &next,
                &classification.specialists,
                &record.session.ledger,
                classification.low_confidence,
                &cancel,
            )
            .await
        {
            Ok(pass) => synthesize(
                &next,
                &pass.ledger,
                &pass.invoked,
                classification.low_confidence,
                &self.options.currency,
            )
            .map(|plan| (pass.ledger, plan)),
            Err(e) => Err(e),
        };

        match result {
            Ok((ledger, plan)) => {
                record
                    .session
                    .complete_refinement(change, &classification, ledger, plan)
                    .map_err(|e| PlanningError::from_session(id, e))?;
                let record = self.save(record).await?;
                restore.disarm();
                Ok(record.session.snapshot())
            }
            Err(e) => {
                record
                    .session
                    .abort_refinement(e.to_string())
                    .map_err(|e| PlanningError::from_session(id, e))?;
                self.save(record).await?;
                restore.disarm();
                Err(PlanningError::from_pass(id, e))
            }
        }
    }

    /// Close the session and return its plan
    pub async fn finalize(&self, id: &SessionId) -> Result<FinalPlan, PlanningError> {
        debug!(%id, "finalize: called");
        let lock = self.session_lock(id);
        let guard = lock.lock().await;

        let mut record = self.load(id).await?;
        let final_plan = record.session.finalize().map_err(|e| PlanningError::from_session(id, e))?;
        self.save(record).await?;
        drop(guard);
        // Finalized sessions take no further writes
        self.locks.lock().remove(id);
        Ok(final_plan)
    }

    /// Current state of a session; never waits for a running pass
    pub async fn get_status(&self, id: &SessionId) -> Result<SessionSnapshot, PlanningError> {
        debug!(%id, "get_status: called");
        Ok(self.load(id).await?.session.snapshot())
    }

    /// Snapshots of every open session, oldest first
    pub async fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, PlanningError> {
        debug!("list_sessions: called");
        Ok(self.state.list().await?.iter().map(|r| r.session.snapshot()).collect())
    }

    /// Registered providers, optionally only those with `capability`
    pub fn list_providers(&self, capability: Option<Capability>) -> Vec<ProviderDescriptor> {
        debug!(?capability, "list_providers: called");
        match capability {
            Some(capability) => self.registry.list(capability),
            None => self.registry.all(),
        }
    }

    /// Refresh every provider's availability flag
    pub async fn probe_providers(&self) -> Vec<(String, bool)> {
        debug!("probe_providers: called");
        self.registry.probe_all().await
    }

    /// Cancel the session's running pass, if any
    ///
    /// Returns whether a pass was running.
    pub async fn cancel(&self, id: &SessionId) -> Result<bool, PlanningError> {
        debug!(%id, "cancel: called");
        if let Some(token) = self.runs.lock().get(id) {
            info!(%id, "Cancelling planning run");
            token.cancel();
            return Ok(true);
        }
        // Distinguish "nothing running" from "no such session"
        self.load(id).await?;
        Ok(false)
    }

    /// Cancel any running pass and forget the session
    pub async fn discard(&self, id: &SessionId) -> Result<(), PlanningError> {
        debug!(%id, "discard: called");
        if let Some(token) = self.runs.lock().get(id) {
            token.cancel();
        }
        let lock = self.session_lock(id);
        let guard = lock.lock().await;
        self.state
            .delete(id)
            .await
            .map_err(|e| PlanningError::from_state(id, e))?;
        drop(guard);
        self.locks.lock().remove(id);
        info!(%id, "Session discarded");
        Ok(())
    }

    /// Cancel every run and stop the session store
    pub async fn shutdown(&self) -> Result<(), PlanningError> {
        info!("Orchestrator shutting down");
        self.root.cancel();
        self.state.shutdown().await?;
        Ok(())
    }
}
