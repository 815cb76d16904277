//! Tracing subscriber setup shared by the redshift binaries.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! forwards those records alongside native `tracing` events. Console output is
//! always on. Debug builds can also write newline-delimited JSON to a file, which
//! is where per-frame `trace` records from the compositor are worth keeping.

use std::path::{Path, PathBuf};

use redshift_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
/// GPU backends are noisy at `info`, so they start at `warn`.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "redshift.log";

/// Filter directive for a given config: the configured level with the GPU
/// backends quieted, or [`DEFAULT_FILTER`] when the level is blank.
pub fn filter_directive(config: Option<&Config>) -> String {
    match config.map(|c| c.debug.log_level.trim()) {
        Some(level) if !level.is_empty() => {
            if level.contains("wgpu") || level.contains(',') {
                level.to_string()
            } else {
                format!("{level},wgpu=warn,naga=warn")
            }
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Path of the JSON log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the config level. When `debug_build` is set and
/// `log_dir` can be created, a JSON file layer is added; if the file cannot be
/// opened the console layer still gets installed.
///
/// ```no_run
/// use redshift_config::Config;
/// use redshift_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), cfg!(debug_assertions), Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let directive = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        tracing::debug!(
            filter = %directive,
            file = %log_file_path(log_dir).display(),
            "logging initialized"
        );
        return;
    }

    subscriber.init();
    tracing::debug!(filter = %directive, "logging initialized");
}

/// [`EnvFilter`] built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
