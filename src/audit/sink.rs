//! Audit sinks.
//!
//! Many concurrent pipeline runs produce audit records; a single writer
//! appends them. Producers enqueue on an unbounded channel and never block a
//! request; the consumer task owns the file handle and writes one JSON line
//! per record. Delivery is at-least-once - a duplicate entry is acceptable,
//! a lost one is not, so enqueue failures are the only thing we log and the
//! writer never drops a received record.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{error, warn};

use super::AuditRecord;

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Hand a record to the sink. Must not block request handling.
    fn append(&self, record: AuditRecord);
}

/// Appends JSON lines to a file through a single-writer queue.
pub struct FileAuditSink {
    tx: mpsc::UnboundedSender<AuditRecord>,
    writer: tokio::task::JoinHandle<()>,
}

impl FileAuditSink {
    /// Open (or create) the audit log and spawn the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<AuditRecord>();
        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let line = match serde_json::to_string(&record) {
                    Ok(line) => line,
                    Err(err) => {
                        error!(%err, "failed to serialize audit record");
                        continue;
                    }
                };
                if let Err(err) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                    error!(%err, path = %path.display(), "failed to append audit record");
                }
            }
        });

        Ok(Self { tx, writer })
    }

    /// Close the queue and wait for the writer to drain it.
    ///
    /// Pending records are written before this returns; used at shutdown so
    /// nothing enqueued is lost.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.writer.await;
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, record: AuditRecord) {
        if self.tx.send(record).is_err() {
            warn!("audit writer is gone; record dropped");
        }
    }
}

/// In-memory sink for tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }
}
