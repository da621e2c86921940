#![doc(test(attr(deny(warnings))))]

//! Expense Core tracks owner expenses, materializes recurring expenses into
//! the ledger on a schedule and dispatches report jobs through a durable queue.

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod queue;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter and emits a startup info log.
pub fn init() {
    init_with_filter(None);
}

pub fn init_with_filter(filter: Option<&str>) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(filter);
        tracing::info!("Expense Core tracing initialized.");
    });
}
