use serde::Deserialize;

use crate::error::XdlError;
use crate::term::{Level, Terminal};

pub const TRACE: u16 = 10;
pub const DEBUG: u16 = 20;
pub const INFO: u16 = 30;
pub const WARN: u16 = 40;
pub const ERROR: u16 = 50;

pub const DEVICE_TAG: &str = "device";

/// Notification codes carried by the global stream.
pub const START_LOADING: &str = "START_LOADING";
pub const STOP_LOADING: &str = "STOP_LOADING";
pub const DOWNLOAD_CLI_PROGRESS: &str = "DOWNLOAD_CLI_PROGRESS";

/// A leveled message emitted by the project collaborator.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    #[serde(default = "default_level")]
    pub level: u16,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_level() -> u16 {
    INFO
}

impl LogRecord {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            level: INFO,
            msg: msg.into(),
            code: None,
            tag: None,
        }
    }

    pub fn severity(&self) -> Level {
        if self.level <= INFO {
            Level::Info
        } else if self.level == WARN {
            Level::Warn
        } else {
            Level::Error
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEvent {
    BuildStarted,
    /// Percentage of the bundle built so far.
    BuildProgress { percent: u8 },
    BuildFinished {
        error: Option<String>,
        duration_ms: Option<u64>,
    },
    Record(LogRecord),
}

impl LogEvent {
    fn tag(&self) -> Option<&str> {
        match self {
            LogEvent::Record(record) => record.tag.as_deref(),
            _ => None,
        }
    }
}

/// Which events an attached observer wants to see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFilter {
    All,
    OnlyTag(String),
    ExceptTag(String),
}

impl LogFilter {
    pub fn accepts(&self, event: &LogEvent) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::OnlyTag(tag) => event.tag() == Some(tag.as_str()),
            LogFilter::ExceptTag(tag) => event.tag() != Some(tag.as_str()),
        }
    }
}

/// Receives one stream of log events: messages, then a terminal error or completion.
pub trait LogObserver: Send + Sync {
    fn next(&self, event: &LogEvent);

    fn error(&self, _error: &XdlError) {}

    fn complete(&self) {}
}

/// Routes each line of a record's message to the terminal by severity.
pub fn log_with_level(term: &Terminal, record: &LogRecord) {
    for line in split_message(&record.msg) {
        term.log(record.severity(), line);
    }
}

pub(crate) fn split_message(msg: &str) -> Vec<&str> {
    if msg.trim().is_empty() {
        return Vec::new();
    }
    msg.trim_end_matches(['\r', '\n'])
        .lines()
        .collect()
}

/// Prints every record it sees; attached for `device`-tagged output.
pub struct SeveritySink {
    term: Terminal,
}

impl SeveritySink {
    pub fn new(term: Terminal) -> Self {
        Self { term }
    }
}

impl LogObserver for SeveritySink {
    fn next(&self, event: &LogEvent) {
        if let LogEvent::Record(record) = event {
            log_with_level(&self.term, record);
        }
    }
}

/// Global notification observer: spinner control plus leveled records.
pub struct NotificationSink {
    term: Terminal,
}

impl NotificationSink {
    pub fn new(term: Terminal) -> Self {
        Self { term }
    }
}

impl LogObserver for NotificationSink {
    fn next(&self, event: &LogEvent) {
        let LogEvent::Record(record) = event else {
            return;
        };
        match record.code.as_deref() {
            Some(START_LOADING) => self.term.start_spinner(""),
            Some(STOP_LOADING) => self.term.stop_spinner(),
            Some(DOWNLOAD_CLI_PROGRESS) => {}
            _ => log_with_level(&self.term, record),
        }
    }

    fn complete(&self) {
        self.term.stop_spinner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: u16, tag: Option<&str>) -> LogRecord {
        LogRecord {
            level,
            msg: "x".into(),
            code: None,
            tag: tag.map(str::to_string),
        }
    }

    #[test]
    fn severity_follows_bunyan_levels() {
        assert_eq!(record(TRACE, None).severity(), Level::Info);
        assert_eq!(record(DEBUG, None).severity(), Level::Info);
        assert_eq!(record(INFO, None).severity(), Level::Info);
        assert_eq!(record(WARN, None).severity(), Level::Warn);
        assert_eq!(record(ERROR, None).severity(), Level::Error);
        assert_eq!(record(60, None).severity(), Level::Error);
    }

    #[test]
    fn multi_line_messages_split_per_line() {
        assert_eq!(split_message("one\ntwo\r\nthree\n"), vec!["one", "two", "three"]);
        assert!(split_message("").is_empty());
        assert!(split_message("  \n").is_empty());
    }

    #[test]
    fn filters_select_by_tag() {
        let device = LogEvent::Record(record(INFO, Some(DEVICE_TAG)));
        let metro = LogEvent::Record(record(INFO, Some("metro")));
        let build = LogEvent::BuildStarted;

        let only = LogFilter::OnlyTag(DEVICE_TAG.into());
        assert!(only.accepts(&device));
        assert!(!only.accepts(&metro));
        assert!(!only.accepts(&build));

        let except = LogFilter::ExceptTag(DEVICE_TAG.into());
        assert!(!except.accepts(&device));
        assert!(except.accepts(&metro));
        assert!(except.accepts(&build));

        assert!(LogFilter::All.accepts(&device));
    }

    #[test]
    fn records_default_to_info_level() {
        let parsed: LogRecord = serde_json::from_str(r#"{"msg":"hello"}"#).unwrap();
        assert_eq!(parsed, LogRecord::info("hello"));
    }
}
