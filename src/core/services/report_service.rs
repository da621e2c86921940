//! Report aggregation and the two report producers.
//!
//! The on-demand producer answers the caller as soon as the job is on the
//! queue. The scheduled producer runs once a month over every owner and keeps
//! going when a single owner fails.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{DateWindow, Owner, ReportFormat, ReportJob, ReportSummary, UNCATEGORIZED};
use crate::errors::{ExpenseError, Result};
use crate::queue::ReportPublisher;
use crate::storage::{CategoryResolver, LedgerStore, OwnerDirectory};

/// Sums an owner's ledger over a date window, grouped by category name.
pub struct ReportAggregator {
    ledger: Arc<dyn LedgerStore>,
    categories: Arc<dyn CategoryResolver>,
}

impl ReportAggregator {
    pub fn new(ledger: Arc<dyn LedgerStore>, categories: Arc<dyn CategoryResolver>) -> Self {
        Self { ledger, categories }
    }

    /// Entries without a category, or whose category no longer exists, are
    /// grouped under [`UNCATEGORIZED`].
    pub async fn aggregate(&self, owner_id: Uuid, window: DateWindow) -> Result<ReportSummary> {
        let entries = self.ledger.query_range(owner_id, window).await?;
        let mut names: HashMap<Uuid, String> = HashMap::new();
        let mut summary = ReportSummary::default();

        for entry in entries {
            let name = match entry.category_id {
                Some(id) => match names.get(&id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self
                            .categories
                            .category(owner_id, id)
                            .await?
                            .map(|category| category.name)
                            .unwrap_or_else(|| UNCATEGORIZED.to_string());
                        names.insert(id, name.clone());
                        name
                    }
                },
                None => UNCATEGORIZED.to_string(),
            };
            summary.total_amount += entry.amount;
            *summary.category_totals.entry(name).or_insert(Decimal::ZERO) += entry.amount;
        }
        Ok(summary)
    }
}

/// Synchronous answer to an on-demand report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAck {
    pub queued: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonthlyOutcome {
    Queued,
    Errored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerReportOutcome {
    pub owner_id: Uuid,
    pub outcome: MonthlyOutcome,
}

#[derive(Debug, Clone)]
pub struct MonthlyRunReport {
    pub window: DateWindow,
    pub outcomes: Vec<OwnerReportOutcome>,
}

impl MonthlyRunReport {
    pub fn queued(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.outcome == MonthlyOutcome::Queued)
            .count()
    }

    pub fn errored(&self) -> usize {
        self.outcomes.len() - self.queued()
    }

    pub fn outcome_for(&self, owner_id: Uuid) -> Option<&MonthlyOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.owner_id == owner_id)
            .map(|outcome| &outcome.outcome)
    }
}

pub struct ReportService {
    owners: Arc<dyn OwnerDirectory>,
    aggregator: ReportAggregator,
    publisher: Arc<dyn ReportPublisher>,
    monthly_format: ReportFormat,
}

impl ReportService {
    pub fn new(
        owners: Arc<dyn OwnerDirectory>,
        aggregator: ReportAggregator,
        publisher: Arc<dyn ReportPublisher>,
        monthly_format: ReportFormat,
    ) -> Self {
        Self {
            owners,
            aggregator,
            publisher,
            monthly_format,
        }
    }

    pub fn aggregator(&self) -> &ReportAggregator {
        &self.aggregator
    }

    /// Aggregates and enqueues a report, returning before it is delivered.
    ///
    /// Failures after the job is queued never reach this caller.
    pub async fn request_report(
        &self,
        owner_id: Uuid,
        window: DateWindow,
        format: ReportFormat,
        now: DateTime<Utc>,
    ) -> Result<ReportAck> {
        let owner = self
            .owners
            .owner(owner_id)
            .await?
            .ok_or_else(|| ExpenseError::not_found(format!("owner {owner_id}")))?;
        self.enqueue(&owner, window, format, now).await?;
        Ok(ReportAck {
            queued: true,
            message: format!(
                "Report generation has been queued. It will be sent to {} when ready.",
                owner.email
            ),
        })
    }

    /// Queues one report per owner for the calendar month before `now`.
    pub async fn run_monthly(&self, now: DateTime<Utc>) -> Result<MonthlyRunReport> {
        let window = DateWindow::previous_month(now.date_naive());
        info!(period = %window.month_label(), "generating monthly reports");
        let owners = self.owners.list_owners().await?;

        let mut outcomes = Vec::with_capacity(owners.len());
        for owner in owners {
            let outcome = match self.enqueue(&owner, window, self.monthly_format, now).await {
                Ok(()) => MonthlyOutcome::Queued,
                Err(err) => {
                    error!(owner_id = %owner.id, error = %err, "error generating report for owner");
                    MonthlyOutcome::Errored(err.to_string())
                }
            };
            outcomes.push(OwnerReportOutcome {
                owner_id: owner.id,
                outcome,
            });
        }

        let report = MonthlyRunReport { window, outcomes };
        info!(
            queued = report.queued(),
            errored = report.errored(),
            "monthly reports generation completed"
        );
        Ok(report)
    }

    async fn enqueue(
        &self,
        owner: &Owner,
        window: DateWindow,
        format: ReportFormat,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let summary = self.aggregator.aggregate(owner.id, window).await?;
        let job = ReportJob::new(owner, window, summary, format, now);
        self.publisher.publish(&job).await?;
        info!(owner_id = %owner.id, period = %job.period_label(), "report queued");
        Ok(())
    }
}
