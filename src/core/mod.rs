pub mod dueness;
pub mod scheduler;
pub mod services;
pub mod time;
pub mod triggers;
pub mod utils;

pub use scheduler::{MaterializationScheduler, RunReport, SchedulerOptions, TickOutcome};
pub use time::{Clock, FixedClock, SystemClock};
pub use triggers::Triggers;
