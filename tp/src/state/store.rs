//! Session store interface

use std::collections::HashMap;

use tracing::debug;

use crate::domain::SessionId;
use crate::session::SessionRecord;

use super::messages::{StateError, StateResponse};

/// Storage backing the state actor
///
/// Implementations are driven from a single task, so they need no locking of
/// their own. `update` must enforce the revision check and bump the revision.
pub trait SessionStore: Send + 'static {
    fn create(&mut self, record: SessionRecord) -> StateResponse<SessionRecord>;
    fn get(&self, id: &SessionId) -> StateResponse<Option<SessionRecord>>;
    fn update(&mut self, record: SessionRecord) -> StateResponse<SessionRecord>;
    fn delete(&mut self, id: &SessionId) -> StateResponse<()>;
    fn list(&self) -> StateResponse<Vec<SessionRecord>>;
}

/// Sessions held for the lifetime of the process
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: HashMap<SessionId, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&mut self, mut record: SessionRecord) -> StateResponse<SessionRecord> {
        debug!(id = %record.id(), "InMemorySessionStore::create: called");
        if self.records.contains_key(record.id()) {
            return Err(StateError::AlreadyExists {
                id: record.id().to_string(),
            });
        }
        record.revision = 1;
        self.records.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn get(&self, id: &SessionId) -> StateResponse<Option<SessionRecord>> {
        Ok(self.records.get(id).cloned())
    }

    fn update(&mut self, mut record: SessionRecord) -> StateResponse<SessionRecord> {
        debug!(id = %record.id(), revision = record.revision, "InMemorySessionStore::update: called");
        let stored = self
            .records
            .get(record.id())
            .ok_or_else(|| StateError::NotFound(record.id().to_string()))?;
        if stored.revision != record.revision {
            debug!(stored = stored.revision, "InMemorySessionStore::update: stale revision");
            return Err(StateError::Conflict {
                id: record.id().to_string(),
                expected: stored.revision,
                found: record.revision,
            });
        }
        record.revision += 1;
        self.records.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn delete(&mut self, id: &SessionId) -> StateResponse<()> {
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StateError::NotFound(id.to_string()))
    }

    fn list(&self) -> StateResponse<Vec<SessionRecord>> {
        let mut records: Vec<SessionRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.session.created_at.cmp(&b.session.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::PlanningSession;
    use crate::session::tests::complete_draft;

    fn record() -> SessionRecord {
        SessionRecord::new(PlanningSession::new(complete_draft(), 5))
    }

    #[test]
    fn test_create_sets_first_revision() {
        let mut store = InMemorySessionStore::new();
        let created = store.create(record()).unwrap();
        assert_eq!(created.revision, 1);
        let err = store.create(created.clone()).unwrap_err();
        assert!(matches!(err, StateError::AlreadyExists { .. }));
    }

    #[test]
    fn test_update_rejects_stale_revision() {
        let mut store = InMemorySessionStore::new();
        let created = store.create(record()).unwrap();
        let updated = store.update(created.clone()).unwrap();
        assert_eq!(updated.revision, 2);

        let err = store.update(created).unwrap_err();
        assert!(matches!(err, StateError::Conflict { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_delete_missing() {
        let mut store = InMemorySessionStore::new();
        let err = store.delete(&SessionId::from("nope")).unwrap_err();
        assert_eq!(err, StateError::NotFound("nope".to_string()));
    }
}
