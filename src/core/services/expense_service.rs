use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::domain::common::normalize_category_name;
use crate::domain::{DateWindow, LedgerEntry, NewLedgerEntry};
use crate::errors::{ExpenseError, Result};
use crate::storage::{CategoryResolver, LedgerStore};

/// A manually entered expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: Decimal,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category_name: Option<String>,
}

pub struct ExpenseService {
    ledger: Arc<dyn LedgerStore>,
    categories: Arc<dyn CategoryResolver>,
}

impl ExpenseService {
    pub fn new(ledger: Arc<dyn LedgerStore>, categories: Arc<dyn CategoryResolver>) -> Self {
        Self { ledger, categories }
    }

    pub async fn record(&self, owner_id: Uuid, input: NewExpense) -> Result<LedgerEntry> {
        let category_id = match normalize_category_name(input.category_name) {
            Some(name) => Some(self.categories.resolve_or_create(owner_id, &name).await?.id),
            None => None,
        };
        let id = self
            .ledger
            .insert_entry(NewLedgerEntry {
                owner_id,
                amount: input.amount,
                description: input.description.trim().to_string(),
                date: input.date,
                category_id,
                origin: None,
            })
            .await?;
        info!(entry_id = %id, %owner_id, "expense recorded");
        self.ledger
            .entry(id)
            .await?
            .ok_or_else(|| ExpenseError::Storage(format!("entry {id} vanished after insert")))
    }

    /// Attaches a category to an entry recorded without one.
    pub async fn backfill_category(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        category_name: &str,
    ) -> Result<LedgerEntry> {
        let category = self.categories.resolve_or_create(owner_id, category_name).await?;
        let entry = self
            .ledger
            .attach_category(owner_id, entry_id, category.id)
            .await?;
        info!(%entry_id, %owner_id, category = %category.name, "category backfilled");
        Ok(entry)
    }

    pub async fn entries(&self, owner_id: Uuid, window: DateWindow) -> Result<Vec<LedgerEntry>> {
        self.ledger.query_range(owner_id, window).await
    }

    /// Entries the owner's recurring definition produced, looked up through
    /// the entry's origin reference.
    pub async fn materialized_from(
        &self,
        owner_id: Uuid,
        definition_id: Uuid,
    ) -> Result<Vec<LedgerEntry>> {
        self.ledger.find_by_origin(owner_id, definition_id).await
    }

    pub async fn delete(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        if !self.ledger.delete_entry(owner_id, entry_id).await? {
            return Err(ExpenseError::not_found(format!("ledger entry {entry_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStore;
    use chrono::TimeZone;

    #[tokio::test]
    async fn backfill_only_fills_missing_category() {
        let store = Arc::new(JsonStore::in_memory());
        let service = ExpenseService::new(store.clone(), store.clone());
        let owner = Uuid::new_v4();
        let entry = service
            .record(
                owner,
                NewExpense {
                    amount: Decimal::new(42, 0),
                    description: "Groceries".into(),
                    date: Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
                    category_name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(entry.category_id, None);

        let filled = service.backfill_category(owner, entry.id, "Food").await.unwrap();
        assert!(filled.category_id.is_some());
        assert!(matches!(
            service.backfill_category(owner, entry.id, "Other").await,
            Err(ExpenseError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let store = Arc::new(JsonStore::in_memory());
        let service = ExpenseService::new(store.clone(), store);
        let result = service
            .record(
                Uuid::new_v4(),
                NewExpense {
                    amount: Decimal::new(-5, 0),
                    description: "Refund".into(),
                    date: Utc::now(),
                    category_name: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ExpenseError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn materialized_entries_are_visible_only_to_their_owner() {
        let store = Arc::new(JsonStore::in_memory());
        let service = ExpenseService::new(store.clone(), store.clone());
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let definition_id = Uuid::new_v4();
        store
            .insert_entry(NewLedgerEntry {
                owner_id: owner,
                amount: Decimal::new(15, 0),
                description: "[Recurring] Gym".into(),
                date: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                category_id: None,
                origin: Some(definition_id),
            })
            .await
            .unwrap();

        let own = service.materialized_from(owner, definition_id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert!(service
            .materialized_from(stranger, definition_id)
            .await
            .unwrap()
            .is_empty());
    }
}
