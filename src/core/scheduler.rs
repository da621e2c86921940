//! Materialization scheduler.
//!
//! One tick reads every eligible recurring definition, asks the dueness rules
//! whether it owes an entry and, when it does, writes the ledger entry and
//! advances the watermark. Only one tick runs at a time per scheduler; inside a
//! tick definitions are processed concurrently, each under its own lock.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::dueness::is_due;
use crate::domain::{NewLedgerEntry, RecurringDefinition};
use crate::errors::{ExpenseError, Result};
use crate::storage::{CategoryResolver, LedgerStore, RecurringStore};

pub const DEFAULT_DESCRIPTION_PREFIX: &str = "[Recurring] ";

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Definitions processed in parallel within one tick.
    pub concurrency: usize,
    /// Definitions not started before this elapses are deferred to the next tick.
    pub tick_deadline: Duration,
    /// Bound on every store or resolver call made for one definition.
    pub call_timeout: Duration,
    pub description_prefix: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            tick_deadline: Duration::from_secs(300),
            call_timeout: Duration::from_secs(10),
            description_prefix: DEFAULT_DESCRIPTION_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotDue,
    NotEligible,
    /// Deleted between listing and processing.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Materialized { entry_id: Uuid },
    Skipped(SkipReason),
    Errored(String),
    Deferred,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionOutcome {
    pub definition_id: Uuid,
    pub owner_id: Uuid,
    pub outcome: TickOutcome,
}

/// Per-definition result of one tick.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub now: DateTime<Utc>,
    pub outcomes: Vec<DefinitionOutcome>,
}

impl RunReport {
    pub fn outcome_for(&self, definition_id: Uuid) -> Option<&TickOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.definition_id == definition_id)
            .map(|outcome| &outcome.outcome)
    }

    pub fn materialized(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickOutcome::Materialized { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickOutcome::Skipped(_)))
    }

    pub fn errored(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickOutcome::Errored(_)))
    }

    pub fn deferred(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickOutcome::Deferred))
    }

    fn count(&self, predicate: impl Fn(&TickOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.outcome))
            .count()
    }
}

#[derive(Default)]
struct DefinitionLocks {
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl DefinitionLocks {
    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(id).or_default().clone()
    }

    /// Drops locks nobody is holding or waiting on.
    fn prune(&self) {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

pub struct MaterializationScheduler {
    definitions: Arc<dyn RecurringStore>,
    ledger: Arc<dyn LedgerStore>,
    categories: Arc<dyn CategoryResolver>,
    options: SchedulerOptions,
    tick_guard: Mutex<()>,
    locks: DefinitionLocks,
}

impl MaterializationScheduler {
    pub fn new(
        definitions: Arc<dyn RecurringStore>,
        ledger: Arc<dyn LedgerStore>,
        categories: Arc<dyn CategoryResolver>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            definitions,
            ledger,
            categories,
            options,
            tick_guard: Mutex::new(()),
            locks: DefinitionLocks::default(),
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Runs one tick, waiting behind a tick that is already in flight.
    ///
    /// Only a failure to list definitions fails the run; per-definition
    /// failures are reported in the [`RunReport`].
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let _tick = self.tick_guard.lock().await;
        self.execute(now).await
    }

    /// Runs one tick unless another is in flight, in which case this one is
    /// coalesced into it and `None` is returned.
    pub async fn try_run_tick(&self, now: DateTime<Utc>) -> Option<Result<RunReport>> {
        let Ok(_tick) = self.tick_guard.try_lock() else {
            info!(%now, "materialization tick already in flight, coalescing");
            return None;
        };
        Some(self.execute(now).await)
    }

    async fn execute(&self, now: DateTime<Utc>) -> Result<RunReport> {
        info!(%now, "processing recurring expenses");
        let eligible = self
            .timed("list eligible definitions", self.definitions.list_eligible(now))
            .await?;
        let deadline = Instant::now() + self.options.tick_deadline;
        let outcomes: Vec<DefinitionOutcome> = stream::iter(eligible)
            .map(|definition| self.process(definition, now, deadline))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        self.locks.prune();

        let report = RunReport { now, outcomes };
        info!(
            materialized = report.materialized(),
            skipped = report.skipped(),
            errored = report.errored(),
            deferred = report.deferred(),
            "recurring expenses processing completed"
        );
        Ok(report)
    }

    async fn process(
        &self,
        snapshot: RecurringDefinition,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> DefinitionOutcome {
        let definition_id = snapshot.id;
        let owner_id = snapshot.owner_id;
        let outcome = if Instant::now() >= deadline {
            warn!(%definition_id, "tick deadline reached, deferring definition");
            TickOutcome::Deferred
        } else {
            let lock = self.locks.lock_for(definition_id);
            let _serialized = lock.lock().await;
            match self.materialize(definition_id, now).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(
                        %definition_id,
                        %owner_id,
                        error = %err,
                        "error processing recurring expense"
                    );
                    TickOutcome::Errored(err.to_string())
                }
            }
        };
        DefinitionOutcome {
            definition_id,
            owner_id,
            outcome,
        }
    }

    async fn materialize(&self, id: Uuid, now: DateTime<Utc>) -> Result<TickOutcome> {
        // Re-read under the definition lock so the watermark is current.
        let Some(mut definition) = self
            .timed("load definition", self.definitions.definition(id))
            .await?
        else {
            return Ok(TickOutcome::Skipped(SkipReason::Missing));
        };
        if let Some(entry_id) = self.record_unacknowledged(&mut definition).await? {
            if !is_due(definition.interval, definition.watermark, now) {
                return Ok(TickOutcome::Materialized { entry_id });
            }
        }
        if !definition.is_eligible(now.date_naive()) {
            return Ok(TickOutcome::Skipped(SkipReason::NotEligible));
        }
        if !is_due(definition.interval, definition.watermark, now) {
            debug!(definition_id = %id, watermark = %definition.watermark, "not due");
            return Ok(TickOutcome::Skipped(SkipReason::NotDue));
        }
        if definition.amount <= Decimal::ZERO {
            return Err(ExpenseError::InvariantViolation(format!(
                "definition {id} has non-positive amount {}",
                definition.amount
            )));
        }

        let category_id = match definition.category_name.as_deref() {
            Some(name) => {
                let category = self
                    .timed(
                        "category resolution",
                        self.categories.resolve_or_create(definition.owner_id, name),
                    )
                    .await?;
                Some(category.id)
            }
            None => None,
        };

        let entry = NewLedgerEntry {
            owner_id: definition.owner_id,
            amount: definition.amount,
            description: format!("{}{}", self.options.description_prefix, definition.description),
            date: now,
            category_id,
            origin: Some(definition.id),
        };
        let entry_id = self
            .timed("ledger insert", self.ledger.insert_entry(entry))
            .await?;
        // A failed advance leaves the entry ahead of the watermark; the next
        // tick records it instead of writing the period again.
        self.timed("watermark advance", self.definitions.advance_watermark(id, now))
            .await?;

        info!(
            definition_id = %id,
            owner_id = %definition.owner_id,
            %entry_id,
            "processed recurring expense"
        );
        Ok(TickOutcome::Materialized { entry_id })
    }

    /// Advances the watermark over an entry an earlier tick wrote but never
    /// recorded, because its insert outlived the call timeout or its watermark
    /// advance failed. Returns that entry.
    async fn record_unacknowledged(
        &self,
        definition: &mut RecurringDefinition,
    ) -> Result<Option<Uuid>> {
        let materialized = self
            .timed(
                "origin lookup",
                self.ledger.find_by_origin(definition.owner_id, definition.id),
            )
            .await?;
        let Some(entry) = materialized
            .into_iter()
            .filter(|entry| entry.date > definition.watermark)
            .max_by_key(|entry| entry.date)
        else {
            return Ok(None);
        };
        self.timed(
            "watermark advance",
            self.definitions.advance_watermark(definition.id, entry.date),
        )
        .await?;
        warn!(
            definition_id = %definition.id,
            entry_id = %entry.id,
            "recorded entry left by an interrupted materialization"
        );
        definition.watermark = entry.date;
        Ok(Some(entry.id))
    }

    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let after = self.options.call_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(ExpenseError::Timeout { operation, after }),
        }
    }
}
