use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::{ExpenseError, Result};

/// Identifies entities that expose a stable unique identifier.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Entities that belong to exactly one owner and are only visible to them.
pub trait Owned {
    fn owner_id(&self) -> Uuid;

    fn is_owned_by(&self, owner_id: Uuid) -> bool {
        self.owner_id() == owner_id
    }
}

/// Amounts are strictly positive; refunds are not modelled.
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(ExpenseError::invalid(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(ExpenseError::invalid("description must not be empty"));
    }
    Ok(())
}

/// Trims a user supplied category name, treating blank names as absent.
pub fn normalize_category_name(name: Option<String>) -> Option<String> {
    name.map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

// Re-export common dependencies so consumers can rely on this module as a façade.
pub use chrono;
pub use rust_decimal;
pub use uuid;
