pub mod category;
pub mod common;
pub mod entry;
pub mod interval;
pub mod owner;
pub mod recurring;
pub mod report;
pub mod window;

pub use category::{Category, UNCATEGORIZED};
pub use common::{Identifiable, Owned};
pub use entry::{LedgerEntry, NewLedgerEntry};
pub use interval::RecurringInterval;
pub use owner::Owner;
pub use recurring::{NewRecurringDefinition, RecurringDefinition, RecurringDefinitionPatch};
pub use report::{ReportFormat, ReportJob, ReportSummary};
pub use window::DateWindow;
