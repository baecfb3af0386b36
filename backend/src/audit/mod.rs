//! Audit Logger
//!
//! Best-effort, fire-and-forget writer for the audit log.
//!
//! Callers hand entries to [`AuditLogger::record`], which only enqueues them
//! on a channel. A background worker appends them to the [`AuditStore`] in
//! order. An append failure is logged and dropped: it never propagates back
//! to the request that produced the entry.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::logging::{EventCategory, LogEvent, LogLevel};
use crate::storage::{AuditStore, StorageError};
use crate::types::AuditLogEntry;

/// Failure to persist an audit entry. Never surfaced to end users.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store rejected entry: {0}")]
    Store(#[from] StorageError),

    #[error("audit worker stopped")]
    WorkerStopped,
}

enum AuditCommand {
    Append(AuditLogEntry),
    Flush(oneshot::Sender<()>),
}

/// Counters for the audit pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub written: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    dropped: AtomicU64,
}

/// Handle used to enqueue audit entries. Cheap to clone.
#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::UnboundedSender<AuditCommand>,
    counters: Arc<Counters>,
}

impl AuditLogger {
    /// Spawn the background worker writing to `store`
    ///
    /// The worker exits once every `AuditLogger` clone has been dropped and
    /// the queue is drained.
    pub fn start(store: Arc<dyn AuditStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let worker = tokio::spawn(run_worker(store, rx, counters.clone()));

        (Self { tx, counters }, worker)
    }

    /// Enqueue an entry without waiting for it to be written
    pub fn record(&self, entry: AuditLogEntry) {
        let event = entry.event;
        if self.tx.send(AuditCommand::Append(entry)).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            report_failure(event.as_str(), &AuditError::WorkerStopped);
        }
    }

    /// Wait until every entry enqueued before this call has been processed
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    store: Arc<dyn AuditStore>,
    mut rx: mpsc::UnboundedReceiver<AuditCommand>,
    counters: Arc<Counters>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            AuditCommand::Append(entry) => match store.append(&entry).await {
                Ok(()) => {
                    counters.written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    report_failure(entry.event.as_str(), &AuditError::from(e));
                }
            },
            AuditCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!(target: "ecotrace::audit", "Audit worker stopped");
}

fn report_failure(event: &str, error: &AuditError) {
    let log = LogEvent::new(LogLevel::Warn, EventCategory::Audit, "Audit entry dropped")
        .with_data(serde_json::json!({ "event": event }))
        .with_error("LOGGING_FAILURE", error.to_string());
    tracing::warn!(target: "ecotrace::audit", "{}", log.to_json());
}
