//! Store interfaces consumed by the scheduler, the aggregator and the services.
//!
//! Every collaborator is injected as an `Arc<dyn Trait>` so tests can swap in
//! failing or slow fakes.

pub mod json_backend;
pub mod state;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Category, DateWindow, LedgerEntry, NewLedgerEntry, Owner, RecurringDefinition,
};
use crate::errors::Result;

pub use json_backend::JsonStore;
pub use state::StoreState;

/// Persists immutable ledger entries.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_entry(&self, entry: NewLedgerEntry) -> Result<Uuid>;

    async fn entry(&self, id: Uuid) -> Result<Option<LedgerEntry>>;

    /// Entries for `owner_id` whose UTC date lies in the inclusive window.
    async fn query_range(&self, owner_id: Uuid, window: DateWindow) -> Result<Vec<LedgerEntry>>;

    /// Entries of `owner_id` materialized from a recurring definition, oldest first.
    async fn find_by_origin(
        &self,
        owner_id: Uuid,
        definition_id: Uuid,
    ) -> Result<Vec<LedgerEntry>>;

    /// Fills in a missing category. Entries that already have one are rejected.
    async fn attach_category(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        category_id: Uuid,
    ) -> Result<LedgerEntry>;

    async fn delete_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<bool>;
}

/// Persists recurring definitions and their watermarks.
#[async_trait]
pub trait RecurringStore: Send + Sync {
    async fn insert_definition(&self, definition: RecurringDefinition) -> Result<()>;

    async fn definition(&self, id: Uuid) -> Result<Option<RecurringDefinition>>;

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<RecurringDefinition>>;

    /// Active definitions whose date range covers `now`'s UTC date.
    async fn list_eligible(&self, now: DateTime<Utc>) -> Result<Vec<RecurringDefinition>>;

    /// Replaces owner-editable fields. The stored watermark is kept.
    async fn update_definition(&self, definition: RecurringDefinition) -> Result<()>;

    /// Moves the watermark forward. Moving it backwards is an invariant violation.
    async fn advance_watermark(&self, id: Uuid, to: DateTime<Utc>) -> Result<()>;

    async fn delete_definition(&self, owner_id: Uuid, id: Uuid) -> Result<bool>;
}

/// External collaborator that owns categories.
#[async_trait]
pub trait CategoryResolver: Send + Sync {
    async fn resolve_or_create(&self, owner_id: Uuid, name: &str) -> Result<Category>;

    async fn category(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Category>>;
}

/// External collaborator that knows who the owners are.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn owner(&self, id: Uuid) -> Result<Option<Owner>>;

    async fn list_owners(&self) -> Result<Vec<Owner>>;

    async fn upsert_owner(&self, owner: Owner) -> Result<()>;
}
