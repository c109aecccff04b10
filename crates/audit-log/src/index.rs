//! In-memory index of recorded attempts shared by every log backend.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::entry::{AccessAttempt, AttemptId, RecordedAttempt};
use crate::query::{self, AuditFilter};
use crate::writer::AuditError;

#[derive(Debug, Default)]
struct State {
    records: Vec<Arc<RecordedAttempt>>,
    event_ids: HashSet<uuid::Uuid>,
    last_id: AttemptId,
}

/// Records in append order plus the set of event ids already seen.
///
/// Queries hold the shared lock only long enough to copy the record
/// pointers, then filter and sort outside it; appends hold the exclusive
/// lock only while pushing one record.
#[derive(Debug, Default)]
pub(crate) struct AttemptIndex {
    state: RwLock<State>,
}

impl AttemptIndex {
    pub(crate) fn from_records(records: Vec<RecordedAttempt>) -> Self {
        let event_ids = records.iter().map(|r| r.attempt.event_id).collect();
        let last_id = records.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            state: RwLock::new(State {
                records: records.into_iter().map(Arc::new).collect(),
                event_ids,
                last_id,
            }),
        }
    }

    /// Reserve the id the next record would receive, after checking that
    /// the event has not been recorded yet. Nothing is stored.
    pub(crate) fn prepare(&self, attempt: AccessAttempt) -> Result<RecordedAttempt, AuditError> {
        let state = self.state.read().map_err(|_| AuditError::Poisoned)?;
        if state.event_ids.contains(&attempt.event_id) {
            return Err(AuditError::DuplicateEvent(attempt.event_id));
        }
        Ok(RecordedAttempt::new(state.last_id + 1, attempt))
    }

    /// Store a record produced by [`prepare`](Self::prepare). Callers
    /// serialise prepare/commit pairs.
    pub(crate) fn commit(&self, record: RecordedAttempt) -> Result<AttemptId, AuditError> {
        let mut state = self.state.write().map_err(|_| AuditError::Poisoned)?;
        let id = record.id;
        state.event_ids.insert(record.attempt.event_id);
        state.last_id = state.last_id.max(id);
        state.records.push(Arc::new(record));
        Ok(id)
    }

    /// Check, assign an id, and store in one exclusive section.
    pub(crate) fn insert(&self, attempt: AccessAttempt) -> Result<AttemptId, AuditError> {
        let mut state = self.state.write().map_err(|_| AuditError::Poisoned)?;
        if !state.event_ids.insert(attempt.event_id) {
            return Err(AuditError::DuplicateEvent(attempt.event_id));
        }
        state.last_id += 1;
        let id = state.last_id;
        state.records.push(Arc::new(RecordedAttempt::new(id, attempt)));
        Ok(id)
    }

    /// Records stored so far, in append order. Later appends do not show
    /// up in a snapshot already taken.
    fn snapshot(&self) -> Result<Vec<Arc<RecordedAttempt>>, AuditError> {
        let state = self.state.read().map_err(|_| AuditError::Poisoned)?;
        Ok(state.records.clone())
    }

    pub(crate) fn query(
        &self,
        filter: &AuditFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecordedAttempt>, AuditError> {
        let records = self.snapshot()?;
        Ok(query::select(
            records.iter().map(Arc::as_ref),
            filter,
            limit,
            offset,
        ))
    }

    pub(crate) fn count(&self, filter: &AuditFilter) -> Result<usize, AuditError> {
        let records = self.snapshot()?;
        Ok(records.iter().filter(|r| filter.matches(r)).count())
    }
}
