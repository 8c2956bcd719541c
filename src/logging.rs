use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::Result;

/// Environment variable holding the tracing filter, e.g. `NBACK_LOG=debug`
pub const LOG_ENV: &str = "NBACK_LOG";

/// Install the global subscriber, appending to the log file at `path`.
///
/// The terminal is owned by the UI, so nothing is written to stdout/stderr.
pub fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    // a second init in the same process keeps the first subscriber
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
    Ok(())
}
