// Logging System for Colony
//
// This module provides the logging setup for pools and their workers.
// It is built on the `tracing` ecosystem; worker threads inherit the
// dispatcher of the thread that started them, so one `init` call covers
// every worker.
//
// # Usage Examples
//
// ## Basic Initialization
//
// ```rust
// use colony::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## File Logging
//
// ```rust
// use colony::logging;
//
// let config = logging::LogConfig::default();
// logging::init_with_file(config, "/var/log/colony/pool.log").unwrap();
// ```
//
// ## Worker and Pool Events
//
// ```rust
// let span = colony::worker_span!("3f2a9c1e");
// let _guard = span.enter();
//
// colony::log_worker!("3f2a9c1e", "started");
// colony::log_pool!("release", "closed", idle = 4);
// ```

use std::fmt;
use std::io;
use std::sync::{Mutex, Once};
use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt as tfmt, prelude::*, EnvFilter};

use colony_api::Logger;

/// Configuration for the colony logging system
///
/// # Examples
///
/// ```rust
/// use colony::logging::LogConfig;
/// use tracing::Level;
///
/// let custom_config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("colony=debug,colony::worker=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for directive in filters.split(',') {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(tfmt::layer().json().flatten_event(true))),
            (false, true) => Box::new(registry.with(
                tfmt::layer()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
            (false, false) => Box::new(registry.with(
                tfmt::layer()
                    .without_time()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` for appending, creating it if needed
pub fn file_writer(path: &str) -> io::Result<std::fs::File> {
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging with both console and file output
///
/// The file is opened up front so a bad path is reported to the caller.
/// File output never carries ANSI colours.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    let file = file_writer(log_file)?;

    INIT.call_once(move || {
        let console_layer = tfmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let file_layer = tfmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level, with worker lifecycles at TRACE
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("colony=debug,colony::worker=trace".to_string()),
        ..LogConfig::default()
    });
}

/// INFO level JSON output without file/line information
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Initialize logging for testing
///
/// Only warnings and errors, no thread info or timestamps.
///
/// ```rust
/// #[test]
/// fn my_test() {
///     colony::logging::init_test();
/// }
/// ```
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Default [`Logger`] for pools: forwards every message to `tracing` at ERROR.
///
/// The only messages a worker sends to its logger are panic reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "colony::worker", "{}", args);
    }
}

/// Create a span covering one worker's processing loop
///
/// ```rust
/// let span = colony::worker_span!("3f2a9c1e");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! worker_span {
    ($worker_id:expr) => {
        tracing::debug_span!("worker", id = $worker_id)
    };
    ($worker_id:expr, $($fields:tt)*) => {
        tracing::debug_span!("worker", id = $worker_id, $($fields)*)
    };
}

/// Log worker lifecycle events
///
/// ```rust
/// colony::log_worker!("3f2a9c1e", "exited", completed = 12);
/// ```
#[macro_export]
macro_rules! log_worker {
    ($worker_id:expr, $event:expr) => {
        tracing::debug!(worker_id = $worker_id, event = $event)
    };
    ($worker_id:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(worker_id = $worker_id, event = $event, $($fields)*)
    };
}

/// Log pool state changes
///
/// ```rust
/// colony::log_pool!("tune", "resized", capacity = 8);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($operation:expr, $status:expr) => {
        tracing::info!(operation = $operation, status = $status)
    };
    ($operation:expr, $status:expr, $($fields:tt)*) => {
        tracing::info!(operation = $operation, status = $status, $($fields)*)
    };
}

/// Log error events
///
/// ```rust
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "spawn failed");
/// colony::log_error!(error, component = "purger");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Used when spawning worker threads so they log through the same
/// subscriber as the thread that started them.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
