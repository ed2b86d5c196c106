use super::record::{QueuedWrite, WriteRequest};
use super::replay::{ReplayError, WriteReplayer};
use super::store::QueueStore;
use crate::types::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A write the server refused during a flush. It is no longer queued.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedWrite {
    pub write: QueuedWrite,
    pub reason: String,
}

/// Outcome of one [`OfflineWriteQueue::flush`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Entries removed from the queue, including rejected ones.
    pub flushed: usize,
    /// Entries the server refused; counted in `flushed`.
    pub rejected: Vec<RejectedWrite>,
    /// Entries still queued for the next flush.
    pub remaining: usize,
}

impl FlushReport {
    /// Entries the server accepted.
    pub fn replayed(&self) -> usize {
        self.flushed - self.rejected.len()
    }
}

/// Durable FIFO of writes made while offline.
///
/// Entries are replayed strictly in enqueue order. A flush stops at the first
/// entry that fails because the server is unreachable and keeps it, and
/// everything after it, for next time. An entry the server refuses is
/// dropped after one attempt and listed in the [`FlushReport`].
pub struct OfflineWriteQueue {
    store: Arc<dyn QueueStore>,
    entries: Mutex<VecDeque<QueuedWrite>>,
}

impl OfflineWriteQueue {
    /// Loads whatever a previous process left in `store`.
    pub async fn open(store: Arc<dyn QueueStore>) -> Result<Self> {
        let entries: VecDeque<QueuedWrite> = store.load().await?.into();
        if !entries.is_empty() {
            tracing::info!("Restored {} queued offline writes", entries.len());
        }
        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    /// Appends a write and persists the queue before returning.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the queue could not be persisted; the
    /// write is not kept in that case.
    pub async fn enqueue(&self, request: WriteRequest) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.push_back(QueuedWrite::stamp(request));

        if let Err(e) = self.store.save(entries.make_contiguous()).await {
            entries.pop_back();
            return Err(e);
        }
        tracing::debug!("Queued offline write ({} pending)", entries.len());
        Ok(())
    }

    /// Replays queued writes in order. Enqueues wait until the flush is done.
    pub async fn flush(&self, replayer: &dyn WriteReplayer) -> FlushReport {
        let mut entries = self.entries.lock().await;
        let mut report = FlushReport::default();

        while let Some(write) = entries.front() {
            match replayer.replay(write).await {
                Ok(()) => {}
                Err(ReplayError::Offline(reason)) => {
                    tracing::info!(
                        "Still offline, keeping {} queued writes: {}",
                        entries.len(),
                        reason
                    );
                    break;
                }
                Err(ReplayError::Rejected(reason)) => {
                    tracing::warn!(
                        "Server rejected queued {} {}, dropping it: {}",
                        write.method.as_str(),
                        write.url,
                        reason
                    );
                    report.rejected.push(RejectedWrite {
                        write: write.clone(),
                        reason,
                    });
                }
            }

            entries.pop_front();
            report.flushed += 1;
            if let Err(e) = self.store.save(entries.make_contiguous()).await {
                tracing::error!("Failed to persist offline queue: {}", e);
            }
        }

        report.remaining = entries.len();
        if report.flushed > 0 {
            tracing::info!(
                "Flushed {} offline writes ({} rejected, {} remaining)",
                report.flushed,
                report.rejected.len(),
                report.remaining
            );
        }
        report
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn pending(&self) -> Vec<QueuedWrite> {
        self.entries.lock().await.iter().cloned().collect()
    }
}
