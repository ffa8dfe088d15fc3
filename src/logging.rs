//! Request-scoped logging and process logging bootstrap
//!
//! Each pipeline owns one [`RequestLogger`]. Entries are collected while the
//! request runs and written out when the pipeline flushes, which it does
//! exactly once per request on every exit path.
//!
//! [`TracingRequestLogger`] is the default implementation: it buffers entries
//! and emits them as `tracing` events tagged with the request id and route key.
//! Level mapping:
//!
//! | Logger    | tracing |
//! |-----------|---------|
//! | `debug`   | TRACE   |
//! | `verbose` | DEBUG   |
//! | `info`    | INFO    |
//! | `warn`    | WARN    |
//! | `error`   | ERROR   |
//!
//! [`init_logging`] installs a `tracing-subscriber` stack (env filter, JSON or
//! pretty output, optional non-blocking writer) driven by [`LogConfig`].

use crate::ids::RequestId;
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::env;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Verbose,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    #[must_use]
    pub fn tracing_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::TRACE,
            LogLevel::Verbose => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// One buffered log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub payload: Option<JsonValue>,
}

/// Logger handed to one request pipeline.
pub trait RequestLogger: Send {
    fn log(&mut self, level: LogLevel, message: &str, payload: Option<JsonValue>);

    /// Write out everything logged so far.
    fn flush(&mut self);

    fn debug(&mut self, message: &str, payload: Option<JsonValue>) {
        self.log(LogLevel::Debug, message, payload);
    }

    fn verbose(&mut self, message: &str, payload: Option<JsonValue>) {
        self.log(LogLevel::Verbose, message, payload);
    }

    fn info(&mut self, message: &str, payload: Option<JsonValue>) {
        self.log(LogLevel::Info, message, payload);
    }

    fn warn(&mut self, message: &str, payload: Option<JsonValue>) {
        self.log(LogLevel::Warn, message, payload);
    }

    fn error(&mut self, message: &str, payload: Option<JsonValue>) {
        self.log(LogLevel::Error, message, payload);
    }
}

/// Creates the logger of each request.
pub trait LoggerProvider: Send + Sync {
    fn logger(&self, request_id: RequestId, route_key: &str) -> Box<dyn RequestLogger>;
}

/// Buffers entries and emits them through `tracing` on flush.
pub struct TracingRequestLogger {
    request_id: RequestId,
    route_key: String,
    entries: Vec<LogEntry>,
}

impl TracingRequestLogger {
    pub fn new(request_id: RequestId, route_key: impl Into<String>) -> Self {
        Self {
            request_id,
            route_key: route_key.into(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &[LogEntry] {
        &self.entries
    }
}

impl RequestLogger for TracingRequestLogger {
    fn log(&mut self, level: LogLevel, message: &str, payload: Option<JsonValue>) {
        self.entries.push(LogEntry {
            level,
            message: message.to_string(),
            payload,
        });
    }

    fn flush(&mut self) {
        let id = self.request_id;
        let route = self.route_key.as_str();
        for entry in self.entries.drain(..) {
            let payload = entry.payload.map(|p| p.to_string()).unwrap_or_default();
            let message = entry.message.as_str();
            match entry.level {
                LogLevel::Debug => trace!(request_id = %id, route = %route, payload = %payload, "{message}"),
                LogLevel::Verbose => debug!(request_id = %id, route = %route, payload = %payload, "{message}"),
                LogLevel::Info => info!(request_id = %id, route = %route, payload = %payload, "{message}"),
                LogLevel::Warn => warn!(request_id = %id, route = %route, payload = %payload, "{message}"),
                LogLevel::Error => error!(request_id = %id, route = %route, payload = %payload, "{message}"),
            }
        }
    }
}

/// Default [`LoggerProvider`] producing [`TracingRequestLogger`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLoggers;

impl LoggerProvider for TracingLoggers {
    fn logger(&self, request_id: RequestId, route_key: &str) -> Box<dyn RequestLogger> {
        Box::new(TracingRequestLogger::new(request_id, route_key))
    }
}

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra comma-separated filter directives, e.g. `schemaroute=debug`
    pub target_filter: Option<String>,
    /// Write through a `tracing-appender` non-blocking worker
    pub async_logging: bool,
    /// Include file:line location
    pub include_location: bool,
}

impl LogConfig {
    /// Read `SCHEMAROUTE_LOG_*` variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("SCHEMAROUTE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("SCHEMAROUTE_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("SCHEMAROUTE_LOG_TARGET_FILTER").ok(),
            async_logging: env::var("SCHEMAROUTE_LOG_ASYNC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            include_location: env::var("SCHEMAROUTE_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }

    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            async_logging: false,
            include_location: true,
        }
    }

    #[must_use]
    pub fn default_prod() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
            async_logging: true,
            include_location: false,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let level = match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                if let Ok(parsed) = directive.parse() {
                    filter = filter.add_directive(parsed);
                } else {
                    eprintln!("Warning: Invalid log filter directive: {directive}");
                }
            }
        }
        filter
    }
}

fn fmt_layer<S, W>(config: &LogConfig, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard owns the background writer; keep
/// it alive for the lifetime of the process or buffered lines are lost.
///
/// ```no_run
/// use schemaroute::logging::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::from_env()).expect("logging");
/// ```
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(config.env_filter());
    if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        registry
            .with(fmt_layer(config, writer))
            .try_init()
            .context("Failed to initialize async logging")?;
        Ok(Some(guard))
    } else {
        registry
            .with(fmt_layer(config, std::io::stdout))
            .try_init()
            .context("Failed to initialize sync logging")?;
        Ok(None)
    }
}
