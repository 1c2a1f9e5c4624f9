//! Logging setup and the in-memory log sink.
//!
//! All components log through `tracing`. [`init`] installs a subscriber with
//! three outputs:
//!
//! ```text
//! tracing events ──► EnvFilter ─┬─► file (tracing-appender, non-blocking)
//!                               └─► LogBufferLayer ──► LogBuffer (bounded ring)
//!                                                         ▲
//!                                          front-end log viewer reads here
//! ```
//!
//! The [`LogBuffer`] is handed to whoever wants to display logs; there is no
//! process-global log stream.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default number of records kept in memory.
pub const DEFAULT_BUFFER_CAPACITY: usize = 2000;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "netinstall.log";

/// Bounded, shareable ring of formatted log lines.
#[derive(Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.line_count())
            .finish()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a line, dropping the oldest when full.
    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Copy of every buffered line, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// The newest `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    /// All lines joined with newlines, for copying to a clipboard or file.
    pub fn contents(&self) -> String {
        self.snapshot().join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    /// A tracing layer feeding this buffer.
    pub fn layer(&self) -> LogBufferLayer {
        LogBufferLayer {
            buffer: self.clone(),
        }
    }
}

/// Tracing layer that formats events as `HH:MM:SS - LEVEL - message` and
/// pushes them into a [`LogBuffer`].
pub struct LogBufferLayer {
    buffer: LogBuffer,
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut line = format!(
            "{} - {} - {}",
            chrono::Local::now().format("%H:%M:%S"),
            event.metadata().level(),
            visitor.message
        );
        if !visitor.fields.is_empty() {
            line.push(' ');
            line.push_str(&visitor.fields.join(" "));
        }
        self.buffer.push(line);
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug)]
pub enum LoggingError {
    /// The log directory could not be created.
    CreateDir { path: PathBuf, source: io::Error },
    /// A global subscriber is already installed.
    AlreadyInitialized(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, source } => {
                write!(f, "failed to create log directory {}: {}", path.display(), source)
            }
            Self::AlreadyInitialized(msg) => write!(f, "logging already initialized: {}", msg),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::AlreadyInitialized(_) => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the log file. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// Log file name inside `log_dir`.
    pub file_name: String,
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: String,
    /// Capacity of the in-memory buffer.
    pub buffer_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: Some(default_log_dir()),
            file_name: DEFAULT_LOG_FILE.to_string(),
            default_filter: "info".to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Platform cache directory for logs, falling back to the temp directory.
pub fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("netinstall")
        .join("logs")
}

/// Keeps the file writer alive and exposes the in-memory buffer.
///
/// Dropping the guard flushes pending file output.
pub struct LoggingGuard {
    buffer: LogBuffer,
    log_file: Option<PathBuf>,
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Path of the log file, if file logging is enabled.
    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }
}

/// Install the global tracing subscriber.
pub fn init(config: LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let buffer = LogBuffer::new(config.buffer_capacity);

    let (file_layer, file_guard, log_file) = match config.log_dir {
        Some(dir) => {
            fs::create_dir_all(&dir).map_err(|e| LoggingError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::never(&dir, &config.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard), Some(dir.join(&config.file_name)))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(buffer.layer())
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        buffer,
        log_file,
        _file_guard: file_guard,
    })
}
