use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::entry::{AccessAttempt, AttemptId};
use crate::index::AttemptIndex;
use crate::writer::{self, AuditError, AuditWriter};

/// Channel buffer size used between producers and the background writer task.
const CHANNEL_BUFFER: usize = 1024;

/// One append waiting for the writer, with the channel its outcome goes back on.
struct AppendRequest {
    attempt: AccessAttempt,
    reply: oneshot::Sender<Result<AttemptId, AuditError>>,
}

/// A cheap, cloneable handle used to submit [`AccessAttempt`] values to the
/// background audit-log writer.
///
/// Unlike a fire-and-forget logger, every [`append`](Self::append) waits
/// until its record has been written and synced, and reports failure to the
/// caller. A single writer task owns the file, so concurrent appends are
/// serialised and never interleave.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AppendRequest>,
}

impl AuditSink {
    /// Replay the log at `path`, then spawn the background writer task.
    ///
    /// Returns the sink, the shared index the writer keeps current, and the
    /// task handle. The task exits once the last `AuditSink` clone is dropped.
    pub(crate) async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Arc<AttemptIndex>, JoinHandle<()>), AuditError> {
        let path = path.as_ref();
        let existing = writer::replay(path).await?;
        tracing::info!(
            path = %path.display(),
            records = existing.len(),
            "audit log replayed"
        );

        let index = Arc::new(AttemptIndex::from_records(existing));
        let mut writer = AuditWriter::new(path).await?;
        let (tx, rx) = mpsc::channel::<AppendRequest>(CHANNEL_BUFFER);

        let task_index = Arc::clone(&index);
        let handle = tokio::spawn(async move {
            run_writer_loop(&mut writer, &task_index, rx).await;
        });

        Ok((Self { tx }, index, handle))
    }

    /// Submit an attempt and wait for it to be durably recorded.
    pub async fn append(&self, attempt: AccessAttempt) -> Result<AttemptId, AuditError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(AppendRequest { attempt, reply })
            .await
            .map_err(|_| AuditError::Closed)?;
        outcome.await.map_err(|_| AuditError::Closed)?
    }
}

/// Core loop executed inside the background task.
///
/// Each request is checked against the index, written and synced, then
/// committed to the index before the caller is answered. A failed write is
/// reported to its caller and the loop carries on with the next request.
async fn run_writer_loop(
    writer: &mut AuditWriter,
    index: &AttemptIndex,
    mut rx: mpsc::Receiver<AppendRequest>,
) {
    while let Some(request) = rx.recv().await {
        let outcome = record(writer, index, request.attempt).await;
        if let Err(err) = &outcome {
            tracing::error!(%err, "failed to record access attempt");
        }
        if request.reply.send(outcome).is_err() {
            // The record is on disk either way; only the acknowledgement is lost.
            tracing::warn!("append caller went away before acknowledgement");
        }
    }
    tracing::debug!("audit writer background task shutting down");
}

async fn record(
    writer: &mut AuditWriter,
    index: &AttemptIndex,
    attempt: AccessAttempt,
) -> Result<AttemptId, AuditError> {
    let record = index.prepare(attempt)?;
    writer.write(&record).await?;
    index.commit(record)
}
