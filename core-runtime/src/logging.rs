//! Tracing setup for the cache engine.
//!
//! [`init_logging`] installs a global `tracing` subscriber made of three
//! layers: an [`EnvFilter`] scoped to the workspace crates, a `fmt` layer
//! writing to stdout, and a forwarding layer that hands each event to the
//! host's [`LoggerSink`] when one is configured.
//!
//! Media URLs are routinely signed (`?Expires=..&Signature=..`). Code that
//! logs a URL passes it through [`redact_url`]; entries forwarded to the
//! sink are additionally scrubbed field by field with [`redact_field`].
//!
//! ```ignore
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//! init_logging(config)?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates whose events follow the configured level. Everything else is
/// held at `warn`.
const WORKSPACE_CRATES: &[&str] = &[
    "feedcache_workspace",
    "core_runtime",
    "core_cache",
    "core_service",
    "bridge_desktop",
];

/// Chatty transport crates pinned to `warn` unless a custom filter says otherwise.
const QUIET_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

/// Field names whose values never leave the process.
const CREDENTIAL_FIELDS: &[&str] = &[
    "token",
    "signature",
    "password",
    "secret",
    "api_key",
    "authorization",
    "cookie",
];

const REDACTED: &str = "[REDACTED]";

/// Shape of the stdout output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for local development
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line text
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates
    pub level: LogLevel,
    /// Scrub URLs and credentials in entries forwarded to the sink
    pub redact_urls: bool,
    /// Replaces the generated directives entirely (e.g. `"core_cache=trace"`)
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Report span enter/exit in the fmt output
    pub spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_urls: true,
            filter: None,
            logger_sink: None,
            spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_url_redaction(mut self, redact: bool) -> Self {
        self.redact_urls = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, spans: bool) -> Self {
        self.spans = spans;
        self
    }

    fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str().to_ascii_lowercase();
        WORKSPACE_CRATES
            .iter()
            .map(|krate| format!("{krate}={level}"))
            .chain(QUIET_CRATES.iter().map(|krate| format!("{krate}=warn")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// Only one subscriber may be installed per process; later calls fail with
/// [`Error::Config`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let forward = SinkForwardLayer {
        sink: config.logger_sink.clone(),
        redact: config.redact_urls,
    };
    let span_events = if config.spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let output = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(config.spans)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .with(forward)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Copies events into [`LogEntry`] values for the host sink.
struct SinkForwardLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl<S> Layer<S> for SinkForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields.message.unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (name, value) in fields.values {
            let value = if self.redact {
                redact_field(&name, &value)
            } else {
                value
            };
            entry = entry.with_field(name, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_field("span", span.name());
        }

        deliver(Arc::clone(sink), entry);
    }
}

/// Hand an entry to the sink without blocking the emitting task when a
/// runtime is available.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = sink.log(entry).await {
                    eprintln!("logger sink rejected entry: {}", e);
                }
            });
        }
        Err(_) => {
            if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("logger sink rejected entry: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    // Without this, strings would arrive quoted through `record_debug`.
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

fn log_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Trace,
    }
}

/// Drop the query string and fragment of a URL.
///
/// ```ignore
/// debug!(url = %redact_url(key.as_str()), "Cache miss");
/// ```
pub fn redact_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Strip the query and fragment of every URL embedded in free text, such
/// as a transport error message.
pub fn redact_urls_in(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in text.split_inclusive(char::is_whitespace) {
        let word = piece.trim_end();
        if word.contains("://") {
            // Closing punctuation after the URL survives.
            let url = word.trim_end_matches(|c: char| ")]}>\"',;:".contains(c));
            out.push_str(redact_url(url));
            out.push_str(&piece[url.len()..]);
        } else {
            out.push_str(piece);
        }
    }
    out
}

/// Scrub a field value by name before it leaves the process.
///
/// Credential-like fields are replaced outright; anything that looks like a
/// URL loses its query.
pub fn redact_field(name: &str, value: &str) -> String {
    let name = name.to_ascii_lowercase();
    if CREDENTIAL_FIELDS.iter().any(|c| name.contains(c)) {
        REDACTED.to_string()
    } else if name.contains("url") || name == "key" || value.contains("://") {
        redact_url(value).to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
        floor: Option<LogLevel>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.floor.unwrap_or(LogLevel::Trace)
        }
    }

    fn capture(sink: Arc<RecordingSink>, redact: bool) -> tracing::subscriber::DefaultGuard {
        let layer = SinkForwardLayer {
            sink: Some(sink as Arc<dyn LoggerSink>),
            redact,
        };
        tracing::subscriber::set_default(tracing_subscriber::registry().with(layer))
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_url_redaction(false)
            .with_filter("core_cache=trace")
            .with_spans(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.redact_urls);
        assert_eq!(config.filter.as_deref(), Some("core_cache=trace"));
        assert!(config.spans);
    }

    #[test]
    fn test_directives_cover_workspace_and_quiet_transports() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directives();
        assert!(directives.contains("core_cache=debug"));
        assert!(directives.contains("core_service=debug"));
        assert!(directives.contains("reqwest=warn"));
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn test_custom_filter_replaces_directives() {
        let config = LoggingConfig::default().with_filter("bridge_desktop=trace");
        assert_eq!(config.directives(), "bridge_desktop=trace");
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://cdn.test/reels/a.mp4?X-Amz-Signature=abc&exp=1"),
            "https://cdn.test/reels/a.mp4"
        );
        assert_eq!(redact_url("https://cdn.test/a.mp4#t=10"), "https://cdn.test/a.mp4");
        assert_eq!(redact_url("https://cdn.test/a.mp4"), "https://cdn.test/a.mp4");
        assert_eq!(redact_url(""), "");
    }

    #[test]
    fn test_redact_urls_in_text() {
        assert_eq!(
            redact_urls_in("error sending request for url (https://cdn.test/a.mp4?sig=abc): timed out"),
            "error sending request for url (https://cdn.test/a.mp4): timed out"
        );
        assert_eq!(
            redact_urls_in("GET https://cdn.test/a.mp4?token=1 failed\tafter 3 tries"),
            "GET https://cdn.test/a.mp4 failed\tafter 3 tries"
        );
        assert_eq!(redact_urls_in("connection reset"), "connection reset");
    }

    #[test]
    fn test_redact_field() {
        assert_eq!(redact_field("access_token", "secret123"), REDACTED);
        assert_eq!(redact_field("Signature", "abc"), REDACTED);
        assert_eq!(
            redact_field("source", "https://cdn.test/b.mp4?sig=1"),
            "https://cdn.test/b.mp4"
        );
        assert_eq!(redact_field("size", "12345"), "12345");
    }

    #[test]
    fn test_forwarded_event_is_redacted() {
        let sink = Arc::new(RecordingSink::default());
        let _guard = capture(sink.clone(), true);

        tracing::info!(
            target: "core_cache::manager",
            url = "https://cdn.test/a.mp4?token=xyz",
            size = 42u64,
            "cache hit"
        );

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "core_cache::manager");
        assert_eq!(entries[0].message, "cache hit");
        assert_eq!(
            entries[0].fields.get("url").map(String::as_str),
            Some("https://cdn.test/a.mp4")
        );
        assert_eq!(entries[0].fields.get("size").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_forwarding_without_redaction_keeps_query() {
        let sink = Arc::new(RecordingSink::default());
        let _guard = capture(sink.clone(), false);

        tracing::debug!(url = "https://cdn.test/a.mp4?token=xyz", "miss");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(
            entries[0].fields.get("url").map(String::as_str),
            Some("https://cdn.test/a.mp4?token=xyz")
        );
    }

    #[test]
    fn test_sink_floor_filters_events() {
        let sink = Arc::new(RecordingSink {
            floor: Some(LogLevel::Warn),
            ..RecordingSink::default()
        });
        let _guard = capture(sink.clone(), true);

        tracing::info!("ignored");
        tracing::warn!("kept");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }
}
