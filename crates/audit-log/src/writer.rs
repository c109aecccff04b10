use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::entry::RecordedAttempt;

/// Errors that can occur while recording or reading audit records.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open audit log file: {0}")]
    OpenFile(std::io::Error),

    #[error("failed to read audit log file: {0}")]
    Read(std::io::Error),

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write to audit log: {0}")]
    Write(std::io::Error),

    #[error("failed to sync audit log to disk: {0}")]
    Sync(std::io::Error),

    #[error("corrupt audit record on line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },

    #[error("event {0} has already been recorded")]
    DuplicateEvent(uuid::Uuid),

    #[error("audit writer has shut down")]
    Closed,

    #[error("audit log may hold a partial record after a failed rollback; refusing further appends")]
    Unrecoverable,

    #[error("audit index lock poisoned")]
    Poisoned,
}

/// Append-only file writer that serialises [`RecordedAttempt`] values as
/// JSON lines.
///
/// Each successful call to [`write`](Self::write) leaves exactly one
/// newline-terminated JSON object in the file, synced to disk. A failed call
/// leaves the file at its previous length. If that cannot be guaranteed
/// because the rollback itself failed, the writer refuses every later
/// append with [`AuditError::Unrecoverable`].
pub struct AuditWriter {
    file: tokio::fs::File,
    len: u64,
    failed: bool,
}

impl AuditWriter {
    /// Open (or create) the audit log file at `path` in append mode.
    ///
    /// Parent directories are created automatically if they do not exist.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(AuditError::CreateDir)?;
            }
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(AuditError::OpenFile)?;
        let len = file.metadata().await.map_err(AuditError::OpenFile)?.len();

        Ok(Self::from_file(file, len))
    }

    fn from_file(file: tokio::fs::File, len: u64) -> Self {
        Self {
            file,
            len,
            failed: false,
        }
    }

    /// Serialise `record` as a single JSON line, append it, and sync.
    pub async fn write(&mut self, record: &RecordedAttempt) -> Result<(), AuditError> {
        if self.failed {
            return Err(AuditError::Unrecoverable);
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if let Err(err) = self.append_synced(&line).await {
            if !self.rollback().await {
                self.failed = true;
            }
            return Err(err);
        }

        self.len += line.len() as u64;
        Ok(())
    }

    async fn append_synced(&mut self, line: &[u8]) -> Result<(), AuditError> {
        self.file.write_all(line).await.map_err(AuditError::Write)?;
        self.file.flush().await.map_err(AuditError::Write)?;
        self.file.sync_data().await.map_err(AuditError::Sync)
    }

    /// Cut off whatever part of a failed line reached the file. Returns
    /// `false` when the file length could not be restored.
    async fn rollback(&mut self) -> bool {
        match self.file.set_len(self.len).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(%err, len = self.len, "failed to roll back partial audit record");
                false
            }
        }
    }
}

/// Read every record from an existing audit log.
///
/// A final line without its newline terminator is the remains of a write that
/// never completed; it is cut off (whatever bytes it holds, including a
/// half-written UTF-8 sequence) and the file shortened so the next append
/// starts on a clean line. Any other unreadable line is reported as
/// [`AuditError::Corrupt`]. A missing file reads as empty.
pub async fn replay(path: impl AsRef<Path>) -> Result<Vec<RecordedAttempt>, AuditError> {
    let path = path.as_ref();
    let contents = match tokio::fs::read(path).await {
        Ok(c) => c,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(AuditError::Read(err)),
    };

    let mut records = Vec::new();
    let mut good_len = 0usize;

    for (idx, chunk) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;

        if chunk.last() != Some(&b'\n') {
            tracing::warn!(
                line = line_no,
                bytes = chunk.len(),
                "discarding torn audit record at end of file"
            );
            truncate(path, good_len as u64).await?;
            break;
        }

        let body = chunk.strip_suffix(b"\n").unwrap_or(chunk);
        if !body.iter().all(u8::is_ascii_whitespace) {
            let record = serde_json::from_slice::<RecordedAttempt>(body).map_err(|source| {
                AuditError::Corrupt {
                    line: line_no,
                    source,
                }
            })?;
            records.push(record);
        }
        good_len += chunk.len();
    }

    Ok(records)
}

async fn truncate(path: &Path, len: u64) -> Result<(), AuditError> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(AuditError::OpenFile)?;
    file.set_len(len).await.map_err(AuditError::Write)?;
    file.sync_data().await.map_err(AuditError::Sync)
}
