//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "SQL_LINEAGE_LOG";

static INIT: Once = Once::new();

/// Initialize logging to stderr.
///
/// Reads `SQL_LINEAGE_LOG` for the filter (e.g. `sql_lineage=debug`), falling back
/// to `sql_lineage=info`. Calling it more than once has no effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("sql_lineage=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
