use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{ExpenseError, Result};

/// Inclusive calendar-date range `[start, end]` in the reporting timezone (UTC).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ExpenseError::invalid(format!(
                "window end {end} must not be before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = first_of_month(date);
        let end = first_of_next_month(start) - Duration::days(1);
        Self { start, end }
    }

    /// The calendar month before the one containing `today`.
    pub fn previous_month(today: NaiveDate) -> Self {
        let this_month = first_of_month(today);
        Self::month_of(this_month - Duration::days(1))
    }

    /// "January 2024" style label keyed on the window start.
    pub fn month_label(&self) -> String {
        self.start.format("%B %Y").to_string()
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn first_of_next_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(first)
}
