//! Immutable ledger entries, whether entered by hand or materialized.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::*;
use crate::errors::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    /// Weak back-reference to the recurring definition that produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
}

impl LedgerEntry {
    pub fn from_new(new: NewLedgerEntry) -> Result<Self> {
        validate_amount(new.amount)?;
        validate_description(&new.description)?;
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            amount: new.amount,
            description: new.description,
            date: new.date,
            category_id: new.category_id,
            origin: new.origin,
        })
    }

    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    pub fn is_materialized(&self) -> bool {
        self.origin.is_some()
    }
}

impl Identifiable for LedgerEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Owned for LedgerEntry {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// Insert payload for the ledger store; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub owner_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category_id: Option<Uuid>,
    pub origin: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_omitted_from_json_for_manual_entries() {
        let entry = LedgerEntry::from_new(NewLedgerEntry {
            owner_id: Uuid::new_v4(),
            amount: Decimal::new(420, 2),
            description: "Coffee".into(),
            date: Utc::now(),
            category_id: None,
            origin: None,
        })
        .unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("origin").is_none());
        assert!(!entry.is_materialized());
    }

    #[test]
    fn rejects_blank_description() {
        let result = LedgerEntry::from_new(NewLedgerEntry {
            owner_id: Uuid::new_v4(),
            amount: Decimal::ONE,
            description: "   ".into(),
            date: Utc::now(),
            category_id: None,
            origin: None,
        });
        assert!(result.is_err());
    }
}
