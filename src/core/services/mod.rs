pub mod expense_service;
pub mod recurring_service;
pub mod report_service;

pub use expense_service::{ExpenseService, NewExpense};
pub use recurring_service::RecurringService;
pub use report_service::{
    MonthlyOutcome, MonthlyRunReport, OwnerReportOutcome, ReportAck, ReportAggregator,
    ReportService,
};
