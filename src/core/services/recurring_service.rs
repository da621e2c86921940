use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::common::normalize_category_name;
use crate::domain::{NewRecurringDefinition, Owned, RecurringDefinition, RecurringDefinitionPatch};
use crate::errors::{ExpenseError, Result};
use crate::storage::{CategoryResolver, RecurringStore};

/// Owner-facing lifecycle of recurring definitions. The scheduler is the only
/// other writer and it only ever touches the watermark.
pub struct RecurringService {
    definitions: Arc<dyn RecurringStore>,
    categories: Arc<dyn CategoryResolver>,
}

impl RecurringService {
    pub fn new(definitions: Arc<dyn RecurringStore>, categories: Arc<dyn CategoryResolver>) -> Self {
        Self {
            definitions,
            categories,
        }
    }

    /// Stores a new active definition whose watermark starts at `now`.
    pub async fn create(
        &self,
        owner_id: Uuid,
        input: NewRecurringDefinition,
        now: DateTime<Utc>,
    ) -> Result<RecurringDefinition> {
        let mut definition = RecurringDefinition::create(owner_id, input, now)?;
        definition.category_name = self
            .canonical_category(owner_id, definition.category_name.take())
            .await?;
        self.definitions.insert_definition(definition.clone()).await?;
        info!(
            definition_id = %definition.id,
            %owner_id,
            interval = %definition.interval,
            "recurring expense created"
        );
        Ok(definition)
    }

    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        mut patch: RecurringDefinitionPatch,
    ) -> Result<RecurringDefinition> {
        let mut definition = self.get(owner_id, id).await?;
        if let Some(name) = patch.category_name.clone() {
            let name = normalize_category_name(name);
            patch.category_name = Some(self.canonical_category(owner_id, name).await?);
        }
        definition.apply(patch)?;
        self.definitions.update_definition(definition).await?;
        self.get(owner_id, id).await
    }

    pub async fn set_active(
        &self,
        owner_id: Uuid,
        id: Uuid,
        is_active: bool,
    ) -> Result<RecurringDefinition> {
        let definition = self
            .update(owner_id, id, RecurringDefinitionPatch::active(is_active))
            .await?;
        info!(definition_id = %id, %owner_id, is_active, "recurring expense toggled");
        Ok(definition)
    }

    pub async fn remove(&self, owner_id: Uuid, id: Uuid) -> Result<()> {
        if !self.definitions.delete_definition(owner_id, id).await? {
            return Err(ExpenseError::not_found(format!("recurring definition {id}")));
        }
        info!(definition_id = %id, %owner_id, "recurring expense removed");
        Ok(())
    }

    /// Foreign definitions are reported as missing.
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<RecurringDefinition> {
        self.definitions
            .definition(id)
            .await?
            .filter(|definition| definition.is_owned_by(owner_id))
            .ok_or_else(|| ExpenseError::not_found(format!("recurring definition {id}")))
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<RecurringDefinition>> {
        self.definitions.list_for_owner(owner_id).await
    }

    /// Resolves the name so a bad category fails at creation time, and stores
    /// the resolver's spelling of it.
    async fn canonical_category(&self, owner_id: Uuid, name: Option<String>) -> Result<Option<String>> {
        match name {
            Some(name) => {
                let category = self.categories.resolve_or_create(owner_id, &name).await?;
                Ok(Some(category.name))
            }
            None => Ok(None),
        }
    }
}
