use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ReportJob;
use crate::errors::{ExpenseError, Result};

use super::{Delivery, Envelope, ReportPublisher, ReportSubscriber};

#[derive(Default)]
struct MemoryInner {
    pending: VecDeque<Envelope>,
    inflight: HashMap<String, Envelope>,
    closed: bool,
}

/// In-process transport. Messages live as long as the queue value, so it is
/// durable across consumer restarts but not across process restarts.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<MemoryInner>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail as if the broker were down.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.lock().inflight.len()
    }

    /// Jobs waiting to be claimed, oldest first.
    pub fn pending_jobs(&self) -> Vec<ReportJob> {
        self.lock()
            .pending
            .iter()
            .map(|envelope| envelope.job.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ReportPublisher for MemoryQueue {
    async fn publish(&self, job: &ReportJob) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(ExpenseError::QueueUnavailable(
                    "in-memory queue is closed".into(),
                ));
            }
            inner.pending.push_back(Envelope::wrap(job.clone()));
        }
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl ReportSubscriber for MemoryQueue {
    async fn recover(&self) -> Result<usize> {
        let mut inner = self.lock();
        let mut returned: Vec<Envelope> = inner.inflight.drain().map(|(_, envelope)| envelope).collect();
        returned.sort_by_key(|envelope| envelope.enqueued_at);
        let count = returned.len();
        for envelope in returned.into_iter().rev() {
            inner.pending.push_front(envelope);
        }
        if count > 0 {
            debug!(count, "requeued in-flight reports");
        }
        Ok(count)
    }

    async fn claim(&self) -> Result<Option<Delivery>> {
        let mut inner = self.lock();
        let Some(envelope) = inner.pending.pop_front() else {
            return Ok(None);
        };
        // Fresh per claim, so an ack for an earlier, recovered claim is a no-op.
        let receipt = Uuid::new_v4().to_string();
        inner.inflight.insert(receipt.clone(), envelope.clone());
        Ok(Some(Delivery { receipt, envelope }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.lock().inflight.remove(&delivery.receipt);
        Ok(())
    }

    async fn wait_for_message(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}
