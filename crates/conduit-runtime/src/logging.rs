//! Logging setup for Conduit.
//!
//! Binding diagnostics are `debug` events under the
//! [`BINDING_LOG_TARGET`] target, each carrying `event_id` and `event_name`
//! fields. They stay hidden at the default `info` level; set
//! `logging.binding_events = true` to see them without lowering the level of
//! everything else. Every invocation runs inside an `endpoint` span, which
//! `logging.endpoint_spans` turns into timing or lifecycle lines.
//!
//! ```rust,ignore
//! use conduit_runtime::config::ConfigLoader;
//! use conduit_runtime::logging;
//!
//! let config = ConfigLoader::new().load()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! ```rust,ignore
//! use conduit_runtime::config::EndpointSpans;
//! use conduit_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .binding_events(true)
//!     .endpoint_spans(EndpointSpans::Timing)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use conduit_framework::BINDING_LOG_TARGET;
use tracing::{Subscriber, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::{EndpointSpans, LogFormat, LogLevel, LogOutput, LoggingConfig};

/// Initialize logging from a `LoggingConfig`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

impl EndpointSpans {
    fn fmt_span(self) -> FmtSpan {
        match self {
            Self::Off => FmtSpan::NONE,
            Self::Timing => FmtSpan::CLOSE,
            Self::Lifecycle => FmtSpan::NEW | FmtSpan::CLOSE,
        }
    }
}

/// Builds the global subscriber.
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    level: LogLevel,
    filters: Vec<String>,
    binding_events: bool,
    endpoint_spans: EndpointSpans,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    thread_ids: bool,
    file_location: bool,
}

impl LoggingBuilder {
    /// Info level, compact lines on stdout, binding events hidden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors `config`.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level,
            filters: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            binding_events: config.binding_events,
            endpoint_spans: config.endpoint_spans,
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    /// Sets the global level.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `conduit_runtime=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.filters.push(directive.into());
        self
    }

    /// Shows binding diagnostics whatever the global level.
    pub fn binding_events(mut self, enabled: bool) -> Self {
        self.binding_events = enabled;
        self
    }

    /// Chooses which `endpoint` span events are logged.
    pub fn endpoint_spans(mut self, spans: EndpointSpans) -> Self {
        self.endpoint_spans = spans;
        self
    }

    /// Sets the line format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the destination; [`LogOutput::File`] also needs [`file_path`](Self::file_path).
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Sets the log file.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Includes thread ids.
    pub fn thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes source file names and line numbers.
    pub fn file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// Installs the subscriber globally, ignoring an existing one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber globally.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (writer, ansi) = self.make_writer();
        self.into_subscriber(writer, ansi).try_init()
    }

    /// Directives applied on top of the base level, binding events first so
    /// explicit filters can still override them.
    fn directives(&self) -> Vec<String> {
        let mut directives = Vec::with_capacity(self.filters.len() + 1);
        if self.binding_events {
            directives.push(format!("{BINDING_LOG_TARGET}=debug"));
        }
        directives.extend(self.filters.iter().cloned());
        directives
    }

    /// `RUST_LOG` replaces the configured level; directives are added on top
    /// of either. Unparsable directives are skipped.
    fn build_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        for directive in self.directives() {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(_) => warn!(directive = %directive, "Ignoring invalid log filter"),
            }
        }
        filter
    }

    /// The writer for the configured output, and whether it takes ANSI colors.
    fn make_writer(&self) -> (BoxMakeWriter, bool) {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), true),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), true),
            (LogOutput::File, Some(path)) => {
                let appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| Path::new(".")),
                    path.file_name().unwrap_or_else(|| OsStr::new("conduit.log")),
                );
                (BoxMakeWriter::new(appender), false)
            }
            (LogOutput::File, None) => {
                warn!("File output requested but no file path configured, falling back to stdout");
                (BoxMakeWriter::new(std::io::stdout), true)
            }
        }
    }

    fn into_subscriber(
        self,
        writer: BoxMakeWriter,
        ansi: bool,
    ) -> impl Subscriber + Send + Sync + 'static {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(self.fmt_layer(writer, ansi))
            .with(filter)
    }

    fn fmt_layer<S>(&self, writer: BoxMakeWriter, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let spans = self.endpoint_spans.fmt_span();
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_span_events(spans)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);
        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            // `event_id` and `event_name` become top-level keys next to the
            // endpoint span.
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn capture(builder: LoggingBuilder, emit: impl FnOnce()) -> String {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = builder.into_subscriber(BoxMakeWriter::new(move || sink.clone()), false);
        tracing::subscriber::with_default(subscriber, emit);
        captured.text()
    }

    fn binding_failure() {
        tracing::debug!(
            target: BINDING_LOG_TARGET,
            event_id = 3,
            event_name = "ParameterBindingFailed",
            "Failed to bind parameter \"u32 id\" from \"abc\"."
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            thread_ids: true,
            file_location: true,
            binding_events: true,
            endpoint_spans: EndpointSpans::Timing,
            ..Default::default()
        };
        config.filters.insert("conduit_runtime".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, LogLevel::Debug);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.thread_ids && builder.file_location);
        assert_eq!(builder.endpoint_spans.fmt_span(), FmtSpan::CLOSE);
        assert_eq!(
            builder.directives(),
            ["conduit::binding=debug", "conduit_runtime=trace"]
        );
    }

    #[test]
    fn test_binding_events_pass_the_info_level() {
        let out = capture(LoggingBuilder::new().binding_events(true), || {
            binding_failure();
            tracing::debug!(target: "conduit_runtime::host", "hidden");
        });
        assert!(out.contains("event_id=3"), "{out}");
        assert!(out.contains("event_name=\"ParameterBindingFailed\""), "{out}");
        assert!(out.contains("Failed to bind parameter \"u32 id\" from \"abc\"."));
        assert!(!out.contains("hidden"));
    }

    #[test]
    fn test_binding_events_hidden_by_default() {
        let out = capture(LoggingBuilder::new(), binding_failure);
        assert!(!out.contains("ParameterBindingFailed"), "{out}");
    }

    #[test]
    fn test_endpoint_timing_line() {
        let out = capture(
            LoggingBuilder::new()
                .level(LogLevel::Debug)
                .endpoint_spans(EndpointSpans::Timing),
            || {
                let span = tracing::debug_span!("endpoint", endpoint = "todos.create");
                span.in_scope(|| {});
            },
        );
        assert!(out.contains("endpoint"), "{out}");
        assert!(out.contains("close"), "{out}");
        assert!(out.contains("time.busy"), "{out}");
    }
}
