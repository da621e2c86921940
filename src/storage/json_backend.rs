use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::core::utils::write_atomic;
use crate::domain::{
    Category, DateWindow, LedgerEntry, NewLedgerEntry, Owner, RecurringDefinition,
};
use crate::errors::{ExpenseError, Result};

use super::state::{StoreState, STORE_SCHEMA_VERSION};
use super::{CategoryResolver, LedgerStore, OwnerDirectory, RecurringStore};

/// Local store backing every store trait with one [`StoreState`].
///
/// With a path, each mutation is applied to a copy of the state, written
/// atomically and only then swapped in. The write runs on its own task and
/// finishes even when the caller stops waiting for it.
pub struct JsonStore {
    path: Option<PathBuf>,
    state: Arc<Mutex<StoreState>>,
}

impl JsonStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// Opens the document at `path`, starting empty when it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let state: StoreState = serde_json::from_str(&data)?;
                if state.schema_version > STORE_SCHEMA_VERSION {
                    return Err(ExpenseError::Storage(format!(
                        "store `{}` is from a newer schema version",
                        path.display()
                    )));
                }
                state
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = state.entries.len(), "opened json store");
        Ok(Self {
            path: Some(path),
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&StoreState) -> T + Send,
    {
        let state = self.state.lock().await;
        f(&*state)
    }

    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(path) = self.path.clone() else {
            let mut state = self.state.lock().await;
            return f(&mut *state);
        };
        let state = Arc::clone(&self.state);
        let write = tokio::spawn(async move {
            let mut state = state.lock().await;
            let mut next = state.clone();
            let value = f(&mut next)?;
            let json = serde_json::to_string_pretty(&next)?;
            write_atomic(&path, &json).await?;
            *state = next;
            Ok::<T, ExpenseError>(value)
        });
        write
            .await
            .map_err(|err| ExpenseError::Storage(format!("store write task failed: {err}")))?
    }
}

#[async_trait]
impl LedgerStore for JsonStore {
    async fn insert_entry(&self, entry: NewLedgerEntry) -> Result<Uuid> {
        self.mutate(move |state| state.insert_entry(entry)).await
    }

    async fn entry(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
        Ok(self.read(|state| state.entry(id).cloned()).await)
    }

    async fn query_range(&self, owner_id: Uuid, window: DateWindow) -> Result<Vec<LedgerEntry>> {
        Ok(self.read(|state| state.query_range(owner_id, window)).await)
    }

    async fn find_by_origin(
        &self,
        owner_id: Uuid,
        definition_id: Uuid,
    ) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read(|state| state.find_by_origin(owner_id, definition_id))
            .await)
    }

    async fn attach_category(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        category_id: Uuid,
    ) -> Result<LedgerEntry> {
        self.mutate(move |state| state.attach_category(owner_id, entry_id, category_id))
            .await
    }

    async fn delete_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<bool> {
        self.mutate(move |state| Ok(state.delete_entry(owner_id, entry_id)))
            .await
    }
}

#[async_trait]
impl RecurringStore for JsonStore {
    async fn insert_definition(&self, definition: RecurringDefinition) -> Result<()> {
        self.mutate(move |state| state.insert_definition(definition))
            .await
    }

    async fn definition(&self, id: Uuid) -> Result<Option<RecurringDefinition>> {
        Ok(self.read(|state| state.definition(id).cloned()).await)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<RecurringDefinition>> {
        Ok(self.read(|state| state.list_for_owner(owner_id)).await)
    }

    async fn list_eligible(&self, now: DateTime<Utc>) -> Result<Vec<RecurringDefinition>> {
        Ok(self.read(|state| state.list_eligible(now)).await)
    }

    async fn update_definition(&self, definition: RecurringDefinition) -> Result<()> {
        self.mutate(move |state| state.update_definition(definition))
            .await
    }

    async fn advance_watermark(&self, id: Uuid, to: DateTime<Utc>) -> Result<()> {
        self.mutate(move |state| state.advance_watermark(id, to)).await
    }

    async fn delete_definition(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.mutate(move |state| Ok(state.delete_definition(owner_id, id)))
            .await
    }
}

#[async_trait]
impl CategoryResolver for JsonStore {
    async fn resolve_or_create(&self, owner_id: Uuid, name: &str) -> Result<Category> {
        let name = name.to_string();
        self.mutate(move |state| state.resolve_or_create(owner_id, &name))
            .await
    }

    async fn category(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Category>> {
        Ok(self.read(|state| state.category(owner_id, id).cloned()).await)
    }
}

#[async_trait]
impl OwnerDirectory for JsonStore {
    async fn owner(&self, id: Uuid) -> Result<Option<Owner>> {
        Ok(self.read(|state| state.owner(id).cloned()).await)
    }

    async fn list_owners(&self) -> Result<Vec<Owner>> {
        Ok(self.read(|state| state.owners.clone()).await)
    }

    async fn upsert_owner(&self, owner: Owner) -> Result<()> {
        self.mutate(move |state| {
            state.upsert_owner(owner);
            Ok(())
        })
        .await
    }
}
