// Logging for ThreadIt
//
// The runtime reports through the `tracing` ecosystem. Library code only
// emits events and spans; the host decides where they go by installing a
// subscriber with one of the `init*` functions below.
//
// ```rust
// use threadit::logging;
//
// // INFO level, human readable console output
// logging::init(logging::LogConfig::default());
//
// // or one of the presets
// logging::init_development();
// ```
//
// Every active object thread runs inside an `active_object` span carrying
// its name and instance id, so events emitted from handlers can be told
// apart without extra fields.

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[doc(hidden)]
pub use tracing;

/// Configuration for the ThreadIt logging system
///
/// ```rust
/// use threadit::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     target_filters: Some("threadit::active=trace".to_string()),
///     ..Default::default()
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
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            match filter.trim().parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(err) => eprintln!("Ignoring invalid log filter '{}': {}", filter, err),
            }
        }
    }
    env_filter
}

/// Initialize the logging system with the given configuration
///
/// Safe to call more than once; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(build_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
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

/// Initialize logging to the console and to a file opened in append mode.
///
/// # Errors
/// Returns an error if the log file cannot be opened or created.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    // Open once up front so a bad path is reported to the caller.
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    let file = std::sync::Mutex::new(file);

    INIT.call_once(move || {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(file)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true);

        let subscriber = tracing_subscriber::registry()
            .with(build_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// Development preset: DEBUG everywhere, TRACE for the runtime loop.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("threadit=debug,threadit::active=trace".to_string()),
        ..Default::default()
    });
}

/// Production preset: INFO, JSON output, no source locations.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        target_filters: None,
    });
}

/// Test preset: warnings and errors only, no thread info.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_thread_info: false,
        ..Default::default()
    });
}

/// Get the current tracing dispatcher
///
/// Useful when a thread is spawned outside the runtime and should log
/// through the same subscriber.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

/// Create the span an active object thread runs in.
///
/// ```rust
/// let span = threadit::active_object_span!("poller", "3f0c...");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! active_object_span {
    ($name:expr, $id:expr) => {
        $crate::logging::tracing::info_span!("active_object", name = %$name, id = %$id)
    };
    ($name:expr, $id:expr, $($fields:tt)*) => {
        $crate::logging::tracing::info_span!("active_object", name = %$name, id = %$id, $($fields)*)
    };
}

/// Log active object lifecycle transitions
#[macro_export]
macro_rules! log_lifecycle {
    ($name:expr, $event:expr) => {
        $crate::logging::tracing::info!(active_object = %$name, event = $event);
    };
    ($name:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::tracing::info!(active_object = %$name, event = $event, $($fields)*);
    };
}

/// Log the outcome of a processed work item
#[macro_export]
macro_rules! log_work {
    ($instruction:expr, $status:expr) => {
        $crate::logging::tracing::debug!(instruction = $instruction, status = %$status);
    };
    ($instruction:expr, $status:expr, $($fields:tt)*) => {
        $crate::logging::tracing::debug!(
            instruction = $instruction,
            status = %$status,
            $($fields)*
        );
    };
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
