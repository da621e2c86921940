//! Report payloads exchanged between producers and the report worker.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{owner::Owner, window::DateWindow};
use crate::errors::ExpenseError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Html,
    Csv,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Html => "html",
            ReportFormat::Csv => "csv",
        };
        f.write_str(label)
    }
}

impl FromStr for ReportFormat {
    type Err = ExpenseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "html" => Ok(ReportFormat::Html),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(ExpenseError::invalid(format!("unknown report format `{other}`"))),
        }
    }
}

/// Totals for one owner over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_amount: Decimal,
    pub category_totals: HashMap<String, Decimal>,
}

/// Queue message. Field names follow the wire schema (camelCase JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    pub owner_id: Uuid,
    pub owner_email: String,
    pub owner_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_amount: Decimal,
    pub category_totals: HashMap<String, Decimal>,
    pub format: ReportFormat,
    pub generated_at: DateTime<Utc>,
}

impl ReportJob {
    pub fn new(
        owner: &Owner,
        window: DateWindow,
        summary: ReportSummary,
        format: ReportFormat,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id: owner.id,
            owner_email: owner.email.clone(),
            owner_name: owner.name.clone(),
            period_start: window.start,
            period_end: window.end,
            total_amount: summary.total_amount,
            category_totals: summary.category_totals,
            format,
            generated_at,
        }
    }

    pub fn period_label(&self) -> String {
        DateWindow {
            start: self.period_start,
            end: self.period_end,
        }
        .month_label()
    }
}
