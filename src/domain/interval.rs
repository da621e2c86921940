use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::ExpenseError;

/// How often a recurring definition owes a new ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    Daily,
    Weekly,
    Monthly,
}

impl RecurringInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::Daily => "daily",
            RecurringInterval::Weekly => "weekly",
            RecurringInterval::Monthly => "monthly",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecurringInterval::Daily => "Daily",
            RecurringInterval::Weekly => "Weekly",
            RecurringInterval::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurringInterval {
    type Err = ExpenseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(RecurringInterval::Daily),
            "weekly" | "week" => Ok(RecurringInterval::Weekly),
            "monthly" | "month" => Ok(RecurringInterval::Monthly),
            other => Err(ExpenseError::invalid(format!(
                "unknown interval `{other}` (expected daily, weekly or monthly)"
            ))),
        }
    }
}
