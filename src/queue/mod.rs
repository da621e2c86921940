//! Report queue: a narrow publish/subscribe seam between report producers and
//! the report worker.
//!
//! Delivery is at-least-once. A claimed message stays in flight until it is
//! acked; `recover` hands abandoned in-flight messages back for redelivery,
//! which is how a consumer that crashed mid-handling loses nothing. Every claim
//! carries its own receipt, so acking a claim that was since recovered never
//! removes the newer claim.

pub mod file_queue;
pub mod memory;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ReportJob;
use crate::errors::Result;

pub use file_queue::{FileQueue, DEFAULT_CLAIM_LEASE};
pub use memory::MemoryQueue;
pub use worker::{DrainReport, LoggingReportHandler, ReportHandler, ReportWorker, WorkerOptions};

/// Message as stored by a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    pub job: ReportJob,
}

impl Envelope {
    pub fn wrap(job: ReportJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            job,
        }
    }
}

/// A claimed message. The receipt identifies it to [`ReportSubscriber::ack`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub receipt: String,
    pub envelope: Envelope,
}

impl Delivery {
    pub fn job(&self) -> &ReportJob {
        &self.envelope.job
    }
}

#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Fails with `QueueUnavailable` when the transport cannot take the message.
    async fn publish(&self, job: &ReportJob) -> Result<()>;
}

#[async_trait]
pub trait ReportSubscriber: Send + Sync {
    /// Returns abandoned in-flight messages to the pending set; yields how many
    /// moved.
    async fn recover(&self) -> Result<usize>;

    async fn claim(&self) -> Result<Option<Delivery>>;

    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Waits until a message may be available, or at most `timeout`.
    async fn wait_for_message(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }
}
