use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Category, DateWindow, LedgerEntry, NewLedgerEntry, Owned, Owner, RecurringDefinition,
};
use crate::errors::{ExpenseError, Result};

pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Everything the local store keeps, serialized as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreState {
    pub schema_version: u32,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub definitions: Vec<RecurringDefinition>,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            owners: Vec::new(),
            categories: Vec::new(),
            definitions: Vec::new(),
            entries: Vec::new(),
        }
    }
}

impl StoreState {
    pub fn insert_entry(&mut self, new: NewLedgerEntry) -> Result<Uuid> {
        let entry = LedgerEntry::from_new(new)?;
        let id = entry.id;
        self.entries.push(entry);
        Ok(id)
    }

    pub fn entry(&self, id: Uuid) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn query_range(&self, owner_id: Uuid, window: DateWindow) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.is_owned_by(owner_id) && window.contains(entry.day()))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.date);
        entries
    }

    pub fn find_by_origin(&self, owner_id: Uuid, definition_id: Uuid) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.is_owned_by(owner_id) && entry.origin == Some(definition_id))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.date);
        entries
    }

    pub fn attach_category(
        &mut self,
        owner_id: Uuid,
        entry_id: Uuid,
        category_id: Uuid,
    ) -> Result<LedgerEntry> {
        let category_known = self
            .categories
            .iter()
            .any(|category| category.id == category_id && category.is_owned_by(owner_id));
        if !category_known {
            return Err(ExpenseError::not_found(format!("category {category_id}")));
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == entry_id && entry.is_owned_by(owner_id))
            .ok_or_else(|| ExpenseError::not_found(format!("ledger entry {entry_id}")))?;
        if entry.category_id.is_some() {
            return Err(ExpenseError::invalid(format!(
                "ledger entry {entry_id} already has a category"
            )));
        }
        entry.category_id = Some(category_id);
        Ok(entry.clone())
    }

    pub fn delete_entry(&mut self, owner_id: Uuid, entry_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !(entry.id == entry_id && entry.is_owned_by(owner_id)));
        self.entries.len() != before
    }

    pub fn insert_definition(&mut self, definition: RecurringDefinition) -> Result<()> {
        definition.validate()?;
        if self.definitions.iter().any(|existing| existing.id == definition.id) {
            return Err(ExpenseError::invalid(format!(
                "recurring definition {} already exists",
                definition.id
            )));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn definition(&self, id: Uuid) -> Option<&RecurringDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    pub fn list_for_owner(&self, owner_id: Uuid) -> Vec<RecurringDefinition> {
        self.definitions
            .iter()
            .filter(|definition| definition.is_owned_by(owner_id))
            .cloned()
            .collect()
    }

    pub fn list_eligible(&self, now: DateTime<Utc>) -> Vec<RecurringDefinition> {
        let today = now.date_naive();
        self.definitions
            .iter()
            .filter(|definition| definition.is_eligible(today))
            .cloned()
            .collect()
    }

    pub fn update_definition(&mut self, mut definition: RecurringDefinition) -> Result<()> {
        definition.validate()?;
        let existing = self
            .definitions
            .iter_mut()
            .find(|existing| existing.id == definition.id && existing.owner_id == definition.owner_id)
            .ok_or_else(|| ExpenseError::not_found(format!("recurring definition {}", definition.id)))?;
        definition.watermark = existing.watermark;
        *existing = definition;
        Ok(())
    }

    pub fn advance_watermark(&mut self, id: Uuid, to: DateTime<Utc>) -> Result<()> {
        let definition = self
            .definitions
            .iter_mut()
            .find(|definition| definition.id == id)
            .ok_or_else(|| ExpenseError::not_found(format!("recurring definition {id}")))?;
        if to < definition.watermark {
            return Err(ExpenseError::InvariantViolation(format!(
                "watermark of {id} would move backwards from {} to {to}",
                definition.watermark
            )));
        }
        definition.watermark = to;
        Ok(())
    }

    pub fn delete_definition(&mut self, owner_id: Uuid, id: Uuid) -> bool {
        let before = self.definitions.len();
        self.definitions
            .retain(|definition| !(definition.id == id && definition.is_owned_by(owner_id)));
        self.definitions.len() != before
    }

    /// Exact match on the trimmed name within the owner's categories.
    pub fn resolve_or_create(&mut self, owner_id: Uuid, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ExpenseError::CategoryResolution(
                "category name must not be empty".into(),
            ));
        }
        if let Some(found) = self
            .categories
            .iter()
            .find(|category| category.is_owned_by(owner_id) && category.name == name)
        {
            return Ok(found.clone());
        }
        let category = Category::new(owner_id, name);
        self.categories.push(category.clone());
        Ok(category)
    }

    pub fn category(&self, owner_id: Uuid, id: Uuid) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.id == id && category.is_owned_by(owner_id))
    }

    pub fn owner(&self, id: Uuid) -> Option<&Owner> {
        self.owners.iter().find(|owner| owner.id == id)
    }

    pub fn upsert_owner(&mut self, owner: Owner) {
        match self.owners.iter_mut().find(|existing| existing.id == owner.id) {
            Some(existing) => *existing = owner,
            None => self.owners.push(owner),
        }
    }
}
