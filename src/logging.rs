//! Logging setup and subsystem-tagged log macros.
//!
//! Output goes to stderr with a compact `HH:MM:SS.mmm` timestamp so that
//! commands like `zipwatch cat` can write payloads to stdout untouched.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "zipwatch::watcher" = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=zipwatch=debug zipwatch watch notes.txt
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string for a logging config.
///
/// `default` comes first, then one `target=level` directive per override.
pub fn filter_directives(config: &LoggingConfig) -> String {
    config
        .modules
        .iter()
        .fold(config.default.clone(), |mut directives, (target, level)| {
            directives.push_str(&format!(",{target}={level}"));
            directives
        })
}

/// Initialize logging. Only the first call in a process takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log an info event tagged with a subsystem.
///
/// # Examples
/// ```ignore
/// log_event!("zip", "finished", "{}", path.display());
/// log_event!("watch", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($subsystem:expr, $event:expr) => {
        tracing::info!("[{}] {}", $subsystem, $event)
    };
    ($subsystem:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $subsystem, $event, format!($($arg)*))
    };
}

/// Debug-level counterpart of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($subsystem:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $subsystem, $event)
    };
    ($subsystem:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $subsystem, $event, format!($($arg)*))
    };
}
