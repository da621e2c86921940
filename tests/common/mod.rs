#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use expense_core::{
    core::{
        scheduler::{MaterializationScheduler, SchedulerOptions},
        services::{ExpenseService, RecurringService},
    },
    domain::{Category, NewRecurringDefinition, RecurringInterval, ReportJob},
    errors::{ExpenseError, Result},
    queue::ReportHandler,
    storage::{CategoryResolver, JsonStore},
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Unique data directory that outlives the test.
pub fn temp_base() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn definition(
    interval: RecurringInterval,
    amount: i64,
    category: Option<&str>,
) -> NewRecurringDefinition {
    NewRecurringDefinition {
        amount: Decimal::new(amount, 0),
        description: format!("{} bill", interval.label()),
        interval,
        start_date: date(2024, 1, 1),
        end_date: None,
        category_name: category.map(str::to_string),
    }
}

/// In-memory store with the services wired over it.
pub struct Harness {
    pub store: Arc<JsonStore>,
    pub scheduler: MaterializationScheduler,
    pub recurring: RecurringService,
    pub expenses: ExpenseService,
}

pub fn harness() -> Harness {
    let store = Arc::new(JsonStore::in_memory());
    harness_with(store.clone(), store)
}

pub fn harness_with(store: Arc<JsonStore>, resolver: Arc<dyn CategoryResolver>) -> Harness {
    Harness {
        scheduler: MaterializationScheduler::new(
            store.clone(),
            store.clone(),
            resolver,
            SchedulerOptions::default(),
        ),
        recurring: RecurringService::new(store.clone(), store.clone()),
        expenses: ExpenseService::new(store.clone(), store.clone()),
        store,
    }
}

/// Delegates to the store but fails for one category name or one owner.
pub struct FlakyResolver {
    pub inner: Arc<JsonStore>,
    pub failing_name: Option<String>,
    pub failing_owner: Option<Uuid>,
}

impl FlakyResolver {
    fn check(&self, owner_id: Uuid, name: Option<&str>) -> Result<()> {
        if self.failing_owner == Some(owner_id) {
            return Err(ExpenseError::Storage("category service unreachable".into()));
        }
        if name.is_some() && name == self.failing_name.as_deref() {
            return Err(ExpenseError::CategoryResolution(format!(
                "cannot resolve category {}",
                name.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryResolver for FlakyResolver {
    async fn resolve_or_create(&self, owner_id: Uuid, name: &str) -> Result<Category> {
        self.check(owner_id, Some(name))?;
        self.inner.resolve_or_create(owner_id, name).await
    }

    async fn category(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Category>> {
        self.check(owner_id, None)?;
        self.inner.category(owner_id, id).await
    }
}

/// Report handler that remembers what it was given.
#[derive(Default)]
pub struct RecordingHandler {
    pub jobs: Mutex<Vec<ReportJob>>,
}

impl RecordingHandler {
    pub fn jobs(&self) -> Vec<ReportJob> {
        self.jobs.lock().expect("lock recorded jobs").clone()
    }
}

#[async_trait]
impl ReportHandler for RecordingHandler {
    async fn handle(&self, job: &ReportJob) -> Result<()> {
        self.jobs.lock().expect("lock recorded jobs").push(job.clone());
        Ok(())
    }
}
