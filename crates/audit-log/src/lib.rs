//! Append-only audit trail of access attempts for the tapgate project.
//!
//! Every tap produces exactly one [`AccessAttempt`]. The [`AuditLog`] trait
//! is the seam the decision engine writes through: `append` returns only once
//! the record is stored, `query` and `export` read without blocking writers.
//!
//! Two backends are provided:
//!
//! * [`MemoryAuditLog`] keeps records in process memory.
//! * [`FileAuditLog`] appends each record as one line of a
//!   [JSON Lines](https://jsonlines.org/) file, synced to disk before the
//!   append is acknowledged, and rebuilds its index from the file on open.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_log::{AccessAttempt, AuditFilter, AuditLog, ExportFormat, FileAuditLog};
//! use access_policy::AccessStatus;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (log, _handle) = FileAuditLog::open("/var/log/tapgate/audit.jsonl").await?;
//!
//! let attempt = AccessAttempt::new(
//!     chrono::Utc::now(),
//!     "04:A1:B2:C3",
//!     1,
//!     AccessStatus::InvalidCard,
//!     "unregistered or invalid card",
//! );
//! let id = log.append(attempt).await?;
//!
//! let recent = log.query(&AuditFilter::all().failures_only(), 10, 0).await?;
//! let csv = log.export(ExportFormat::Csv, &AuditFilter::all()).await?;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod export;
mod index;
pub mod query;
pub mod sink;
pub mod writer;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::index::AttemptIndex;

// Re-export primary public types at the crate root for convenience.
pub use entry::{AccessAttempt, AttemptId, RecordedAttempt};
pub use export::{ExportFormat, UnknownFormat};
pub use query::AuditFilter;
pub use sink::AuditSink;
pub use writer::{AuditError, AuditWriter};

/// Durable, append-only store of access attempts.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Store `attempt` atomically and return its id. Resolves only after the
    /// record is stored; an error means nothing was stored.
    async fn append(&self, attempt: AccessAttempt) -> Result<AttemptId, AuditError>;

    /// Matching records, most recent first, paged by `limit` and `offset`.
    async fn query(
        &self,
        filter: &AuditFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecordedAttempt>, AuditError>;

    /// Number of records matching `filter`.
    async fn count(&self, filter: &AuditFilter) -> Result<usize, AuditError>;

    /// Every matching record, most recent first, serialised as `format`.
    async fn export(&self, format: ExportFormat, filter: &AuditFilter) -> Result<Vec<u8>, AuditError> {
        let records = self.query(filter, usize::MAX, 0).await?;
        export::render(&records, format)
    }
}

/// Audit log held entirely in memory. Records do not survive the process.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    index: AttemptIndex,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, attempt: AccessAttempt) -> Result<AttemptId, AuditError> {
        self.index.insert(attempt)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecordedAttempt>, AuditError> {
        self.index.query(filter, limit, offset)
    }

    async fn count(&self, filter: &AuditFilter) -> Result<usize, AuditError> {
        self.index.count(filter)
    }
}

/// Audit log backed by a JSON-lines file.
///
/// Appends go through an [`AuditSink`]; reads are served from the in-memory
/// index the writer task keeps in step with the file.
#[derive(Clone)]
pub struct FileAuditLog {
    sink: AuditSink,
    index: Arc<AttemptIndex>,
}

impl FileAuditLog {
    /// Replay the file at `path` (creating it if needed) and start the
    /// writer task. Drop every clone of the log, then await the handle, to
    /// shut down cleanly.
    pub async fn open(path: impl AsRef<Path>) -> Result<(Self, JoinHandle<()>), AuditError> {
        let (sink, index, handle) = AuditSink::start(path).await?;
        Ok((Self { sink, index }, handle))
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, attempt: AccessAttempt) -> Result<AttemptId, AuditError> {
        self.sink.append(attempt).await
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RecordedAttempt>, AuditError> {
        self.index.query(filter, limit, offset)
    }

    async fn count(&self, filter: &AuditFilter) -> Result<usize, AuditError> {
        self.index.count(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_policy::AccessStatus;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        "2024-06-03T12:00:00Z".parse().unwrap()
    }

    fn attempt(minutes: i64, uid: &str, status: AccessStatus) -> AccessAttempt {
        AccessAttempt::new(base() + Duration::minutes(minutes), uid, 1, status, "reason")
    }

    async fn exercise(log: &dyn AuditLog) {
        log.append(attempt(0, "AAA", AccessStatus::Granted)).await.unwrap();
        log.append(attempt(1, "UNKNOWN", AccessStatus::InvalidCard)).await.unwrap();
        log.append(attempt(2, "AAA", AccessStatus::Denied)).await.unwrap();

        let all = log.query(&AuditFilter::all(), 10, 0).await.unwrap();
        let uids: Vec<&str> = all.iter().map(|r| r.uid.as_str()).collect();
        assert_eq!(uids, vec!["AAA", "UNKNOWN", "AAA"]);
        assert_eq!(all[0].status, AccessStatus::Denied);

        let unknown = log
            .query(&AuditFilter::all().uid("UNKNOWN"), 10, 0)
            .await
            .unwrap();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].status, AccessStatus::InvalidCard);
        assert!(unknown[0].resolved_user_id.is_none());

        assert_eq!(log.count(&AuditFilter::all().failures_only()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn memory_log_appends_and_queries() {
        exercise(&MemoryAuditLog::new()).await;
    }

    #[tokio::test]
    async fn file_log_appends_and_queries() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _handle) = FileAuditLog::open(dir.path().join("audit.jsonl")).await.unwrap();
        exercise(&log).await;
    }

    #[tokio::test]
    async fn repeated_query_is_identical() {
        let log = MemoryAuditLog::new();
        for i in 0..5 {
            log.append(attempt(i, "AAA", AccessStatus::Granted)).await.unwrap();
        }
        let filter = AuditFilter::all().uid("AAA");
        let first = log.query(&filter, 3, 1).await.unwrap();
        let second = log.query(&filter, 3, 1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn file_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (log, handle) = FileAuditLog::open(&path).await.unwrap();
        let first = log.append(attempt(0, "AAA", AccessStatus::Granted)).await.unwrap();
        let kept = attempt(1, "BBB", AccessStatus::Expired);
        let second = log.append(kept.clone()).await.unwrap();
        assert_eq!((first, second), (1, 2));
        drop(log);
        handle.await.unwrap();

        let (log, _handle) = FileAuditLog::open(&path).await.unwrap();
        assert_eq!(log.count(&AuditFilter::all()).await.unwrap(), 2);
        let third = log.append(attempt(2, "CCC", AccessStatus::Granted)).await.unwrap();
        assert_eq!(third, 3);

        // An event recorded before the restart is still refused.
        match log.append(kept).await {
            Err(AuditError::DuplicateEvent(_)) => {}
            other => panic!("expected duplicate error, got {other:?}"),
        }
        assert_eq!(log.count(&AuditFilter::all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn export_honours_filter_and_order() {
        let log = MemoryAuditLog::new();
        log.append(attempt(0, "AAA", AccessStatus::Granted)).await.unwrap();
        log.append(attempt(5, "BBB", AccessStatus::Denied)).await.unwrap();
        log.append(attempt(9, "CCC", AccessStatus::Expired)).await.unwrap();

        let bytes = log
            .export(ExportFormat::Json, &AuditFilter::all().failures_only())
            .await
            .unwrap();
        let rows: Vec<RecordedAttempt> = serde_json::from_slice(&bytes).unwrap();
        let uids: Vec<&str> = rows.iter().map(|r| r.uid.as_str()).collect();
        assert_eq!(uids, vec!["CCC", "BBB"]);

        let csv = log.export(ExportFormat::Csv, &AuditFilter::all()).await.unwrap();
        assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_file_appends_get_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let (log, handle) = FileAuditLog::open(&path).await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move {
                    log.append(attempt(i, &format!("UID{i}"), AccessStatus::Granted))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<u64>>());

        drop(log);
        handle.await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 50);
        for line in text.lines() {
            serde_json::from_str::<RecordedAttempt>(line).unwrap();
        }
    }
}
