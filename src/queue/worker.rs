use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::ReportJob;
use crate::errors::Result;

use super::{Delivery, ReportSubscriber};

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub concurrency: usize,
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Turns a report job into its final artifact.
#[async_trait]
pub trait ReportHandler: Send + Sync {
    async fn handle(&self, job: &ReportJob) -> Result<()>;
}

/// Handler that writes the report to the log instead of rendering and mailing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReportHandler;

#[async_trait]
impl ReportHandler for LoggingReportHandler {
    async fn handle(&self, job: &ReportJob) -> Result<()> {
        info!(
            owner = %job.owner_name,
            email = %job.owner_email,
            period = %job.period_label(),
            format = %job.format,
            total = %job.total_amount,
            "generating report"
        );
        let mut categories: Vec<(&String, &Decimal)> = job.category_totals.iter().collect();
        categories.sort_by(|a, b| a.0.cmp(b.0));
        for (category, amount) in categories {
            info!(owner = %job.owner_name, category = %category, amount = %amount, "report line");
        }
        info!(email = %job.owner_email, "report would be mailed");
        Ok(())
    }
}

/// Totals from a [`ReportWorker::drain`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub recovered: usize,
    pub handled: usize,
    pub failed: usize,
}

/// Consumes report jobs with a fixed number of consumer loops.
///
/// A handler failure is logged and the message is acked anyway, so a poison
/// job never blocks the queue. Only a consumer that dies before acking causes
/// redelivery.
pub struct ReportWorker {
    subscriber: Arc<dyn ReportSubscriber>,
    handler: Arc<dyn ReportHandler>,
    options: WorkerOptions,
}

impl ReportWorker {
    pub fn new(
        subscriber: Arc<dyn ReportSubscriber>,
        handler: Arc<dyn ReportHandler>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            subscriber,
            handler,
            options,
        }
    }

    /// Recovers abandoned messages, then consumes until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let recovered = self.subscriber.recover().await?;
        if recovered > 0 {
            warn!(recovered, "redelivering reports left in flight by a previous consumer");
        }
        let mut consumers = JoinSet::new();
        for slot in 0..self.options.concurrency.max(1) {
            let worker = self.clone();
            let cancel = cancel.clone();
            consumers.spawn(async move { worker.consume(slot, cancel).await });
        }
        while let Some(joined) = consumers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "report consumer panicked");
            }
        }
        info!("report worker stopped");
        Ok(())
    }

    /// Recovers abandoned messages and handles everything queued, then returns.
    pub async fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport {
            recovered: self.subscriber.recover().await?,
            ..DrainReport::default()
        };
        while let Some(delivery) = self.subscriber.claim().await? {
            if self.deliver(delivery).await {
                report.handled += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    async fn consume(&self, slot: usize, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.subscriber.claim().await {
                Ok(Some(delivery)) => {
                    self.deliver(delivery).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.subscriber.wait_for_message(self.options.poll_interval) => {}
                    }
                }
                Err(err) => {
                    error!(slot, error = %err, "failed to claim report message");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.options.poll_interval) => {}
                    }
                }
            }
        }
    }

    /// Handles one delivery and acks it. Returns whether the handler succeeded.
    async fn deliver(&self, delivery: Delivery) -> bool {
        let job = delivery.job();
        let handled = match self.handler.handle(job).await {
            Ok(()) => {
                info!(owner_id = %job.owner_id, period = %job.period_label(), "report processed");
                true
            }
            Err(err) => {
                error!(
                    owner_id = %job.owner_id,
                    period = %job.period_label(),
                    error = %err,
                    "error processing report"
                );
                false
            }
        };
        if let Err(err) = self.subscriber.ack(&delivery).await {
            error!(receipt = %delivery.receipt, error = %err, "failed to ack report message");
        }
        handled
    }
}
