use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::DEFAULT_LOG_FILTER;

static TRACING_INIT: Once = Once::new();

/// Installs the global fmt subscriber. `RUST_LOG` wins over `filter` when set;
/// later calls are no-ops.
pub fn init_tracing(filter: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let directives = filter.unwrap_or(DEFAULT_LOG_FILTER);
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directives))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
