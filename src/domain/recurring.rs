//! Recurring expense definitions and the owner-facing inputs that shape them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::*;
use crate::domain::interval::RecurringInterval;
use crate::errors::{ExpenseError, Result};

/// A template that the materialization scheduler turns into ledger entries.
///
/// The watermark is the only field the scheduler mutates; everything else is
/// owned by the definition's owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringDefinition {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub interval: RecurringInterval,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    pub is_active: bool,
    pub watermark: DateTime<Utc>,
}

impl RecurringDefinition {
    /// Builds a fresh, active definition whose watermark starts at `now`.
    pub fn create(owner_id: Uuid, input: NewRecurringDefinition, now: DateTime<Utc>) -> Result<Self> {
        let definition = Self {
            id: Uuid::new_v4(),
            owner_id,
            amount: input.amount,
            description: input.description.trim().to_string(),
            interval: input.interval,
            start_date: input.start_date,
            end_date: input.end_date,
            category_name: normalize_category_name(input.category_name),
            is_active: true,
            watermark: now,
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)?;
        validate_description(&self.description)?;
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ExpenseError::invalid(format!(
                    "end date {end} is before start date {}",
                    self.start_date
                )));
            }
        }
        Ok(())
    }

    /// Whether `date` lies inside the definition's inclusive active range.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.map_or(true, |end| end >= date)
    }

    /// Eligibility filter applied before dueness is evaluated.
    pub fn is_eligible(&self, today: NaiveDate) -> bool {
        self.is_active && self.covers(today)
    }

    /// Applies owner edits. The watermark is deliberately not reachable from a patch.
    pub fn apply(&mut self, patch: RecurringDefinitionPatch) -> Result<()> {
        let mut next = self.clone();
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(description) = patch.description {
            next.description = description.trim().to_string();
        }
        if let Some(interval) = patch.interval {
            next.interval = interval;
        }
        if let Some(start_date) = patch.start_date {
            next.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            next.end_date = end_date;
        }
        if let Some(category_name) = patch.category_name {
            next.category_name = normalize_category_name(category_name);
        }
        if let Some(is_active) = patch.is_active {
            next.is_active = is_active;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

impl Identifiable for RecurringDefinition {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Owned for RecurringDefinition {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// Owner input for creating a recurring definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecurringDefinition {
    pub amount: Decimal,
    pub description: String,
    pub interval: RecurringInterval,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category_name: Option<String>,
}

/// Partial owner edit. `Some(None)` on the nested options clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurringDefinitionPatch {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub interval: Option<RecurringInterval>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub category_name: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl RecurringDefinitionPatch {
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }
}
