//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber (env filter, JSON or pretty output)
//! - Render request log entries as single-line JSON with a severity,
//!   component and optional trace reference
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured filter
//! - Severity is a closed set; unknown names are coerced to `DEFAULT`
//! - Entry rendering never fails the caller; write errors are only traced

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Header carrying the incoming request's trace context.
pub const TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

/// Install the global `tracing` subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
}

/// Recognized log entry severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
    Fatal,
}

impl Severity {
    pub const ALL: [Severity; 10] = [
        Severity::Default,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
        Severity::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
            Severity::Fatal => "FATAL",
        }
    }

    /// Case-insensitive lookup. Unknown names become [`Severity::Default`].
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }

    /// Whether `name` names a recognized severity.
    pub fn is_known(name: &str) -> bool {
        Self::ALL.iter().any(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    #[serde(rename = "logging.googleapis.com/trace", skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub component: String,
}

impl LogEntry {
    /// Render as one line of JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Build the trace reference from an `X-Cloud-Trace-Context` value
/// (`TRACE_ID/SPAN_ID;o=OPTIONS`).
pub fn trace_from_header(project: &str, header: &str) -> Option<String> {
    let trace_id = header.split('/').next().unwrap_or_default().trim();
    if trace_id.is_empty() {
        return None;
    }
    Some(format!("projects/{}/traces/{}", project, trace_id))
}

/// Writes [`LogEntry`] lines for one component.
pub struct StructuredLogger {
    component: String,
    project: String,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl StructuredLogger {
    /// Logger writing to standard output.
    pub fn stdout(component: impl Into<String>, project: impl Into<String>) -> Self {
        Self::with_writer(component, project, io::stdout())
    }

    pub fn with_writer<W>(component: impl Into<String>, project: impl Into<String>, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            component: component.into(),
            project: project.into(),
            sink: Mutex::new(Box::new(writer)),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Build an entry, attaching the trace when a trace header is supplied.
    pub fn entry(&self, severity: Severity, message: impl Into<String>, trace_header: Option<&str>) -> LogEntry {
        LogEntry {
            message: message.into(),
            severity,
            trace: trace_header.and_then(|h| trace_from_header(&self.project, h)),
            component: self.component.clone(),
        }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>, trace_header: Option<&str>) {
        let entry = self.entry(severity, message, trace_header);
        let line = match entry.to_json() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to render log entry");
                return;
            }
        };

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(sink, "{}", line) {
            tracing::warn!(error = %e, "Failed to write log entry");
        }
    }

    /// Log with a severity given by name, coercing unknown names.
    pub fn log_named(&self, severity: &str, message: impl Into<String>, trace_header: Option<&str>) {
        self.log(Severity::parse(severity), message, trace_header)
    }

    pub fn debug(&self, message: impl Into<String>, trace_header: Option<&str>) {
        self.log(Severity::Debug, message, trace_header)
    }

    pub fn info(&self, message: impl Into<String>, trace_header: Option<&str>) {
        self.log(Severity::Info, message, trace_header)
    }

    pub fn notice(&self, message: impl Into<String>, trace_header: Option<&str>) {
        self.log(Severity::Notice, message, trace_header)
    }

    pub fn warning(&self, message: impl Into<String>, trace_header: Option<&str>) {
        self.log(Severity::Warning, message, trace_header)
    }

    pub fn error(&self, message: impl Into<String>, trace_header: Option<&str>) {
        self.log(Severity::Error, message, trace_header)
    }
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("component", &self.component)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn entry_renders_expected_json() {
        let entry = LogEntry {
            message: "this is a log message".into(),
            severity: Severity::Alert,
            trace: Some("some-trace-key".into()),
            component: "test".into(),
        };

        assert_eq!(
            entry.to_json().unwrap(),
            r#"{"message":"this is a log message","severity":"ALERT","logging.googleapis.com/trace":"some-trace-key","component":"test"}"#
        );
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let entry = LogEntry {
            message: "m".into(),
            severity: Severity::Info,
            trace: None,
            component: String::new(),
        };
        assert_eq!(entry.to_json().unwrap(), r#"{"message":"m","severity":"INFO"}"#);
    }

    #[test]
    fn severity_parsing() {
        assert_eq!(Severity::parse("DEBUG"), Severity::Debug);
        assert_eq!(Severity::parse("alert"), Severity::Alert);
        assert_eq!(Severity::parse("DEFAULT"), Severity::Default);
        assert_eq!(Severity::parse("BOGUS"), Severity::Default);
        assert_eq!(Severity::parse(""), Severity::Default);

        assert!(Severity::is_known("EMERGENCY"));
        assert!(!Severity::is_known("BOGUS"));
        assert!(!Severity::is_known(""));
    }

    #[test]
    fn trace_header_parsing() {
        assert_eq!(
            trace_from_header("my-project", "105445aa7843bc8bf206b12000100000/1;o=1").as_deref(),
            Some("projects/my-project/traces/105445aa7843bc8bf206b12000100000")
        );
        assert_eq!(trace_from_header("my-project", ""), None);
        assert_eq!(trace_from_header("my-project", "/1;o=1"), None);
    }

    #[test]
    fn logger_writes_one_line_per_entry() {
        let buf = SharedBuf::default();
        let logger = StructuredLogger::with_writer("api", "proj-123", buf.clone());

        logger.notice("started", None);
        logger.log_named("NOPE", "coerced", Some("abc/2"));

        let out = buf.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"message":"started","severity":"NOTICE","component":"api"}"#);
        assert_eq!(
            lines[1],
            r#"{"message":"coerced","severity":"DEFAULT","logging.googleapis.com/trace":"projects/proj-123/traces/abc","component":"api"}"#
        );
    }
}
