// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-wide `tracing` setup.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "PORTRISK_LOG";
/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_FILTER: &str = "portrisk=info";

static INIT: Once = Once::new();

/// Install the stderr subscriber. Later calls are no-ops.
///
/// `PORTRISK_LOG=portrisk::bayes=debug,portrisk=info` raises one module's
/// level.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // a test harness may already own the global subscriber
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
