use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::{
    Platform, ProjectStatus, ProjectTools, PublishOptions, PublishResult, Severity, StartOptions,
};
use crate::cli::{Settings, UrlSettings};
use crate::config::{ApiSection, ExpConfig, HOST_ENV, PORT_ENV};
use crate::error::XdlError;
use crate::logs::{LogEvent, LogFilter, LogObserver, LogRecord};
use crate::util::process::{self, CommandSpec};

const TOOL_NAME: &str = "xdl";

/// One line of xdl's machine-readable output.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum XdlMessage {
    Log(LogRecord),
    Notification(LogRecord),
    BuildStarted,
    BuildProgress {
        percent: u8,
    },
    BuildFinished {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    Result {
        #[serde(default)]
        value: JsonValue,
    },
    Error {
        code: String,
        message: String,
    },
}

fn parse_line(line: &str) -> Option<XdlMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(message) => Some(message),
        Err(_) => Some(XdlMessage::Log(LogRecord::info(line))),
    }
}

struct Attached {
    root: PathBuf,
    filter: LogFilter,
    observer: Arc<dyn LogObserver>,
}

/// Runs the external `xdl` executable for every project operation.
pub struct XdlDelegate {
    configured: Option<PathBuf>,
    api: ApiSection,
    observers: Mutex<Vec<Attached>>,
    notifications: Mutex<Vec<Arc<dyn LogObserver>>>,
}

#[derive(Deserialize)]
struct StatusResult {
    status: ProjectStatus,
}

#[derive(Deserialize)]
struct DoctorResult {
    severity: Severity,
}

#[derive(Deserialize)]
struct UrlResult {
    url: String,
}

impl XdlDelegate {
    pub fn from_config(config: &ExpConfig) -> Self {
        Self {
            configured: config.tools.xdl.path.clone(),
            api: config.api.clone(),
            observers: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    async fn run_op(
        &self,
        op: &str,
        root: &Path,
        extra: Vec<String>,
        settings: &Settings,
    ) -> Result<JsonValue, XdlError> {
        let spec = self.command(op, root, extra, settings)?;
        self.run_spec(op, root, spec).await
    }

    fn command(
        &self,
        op: &str,
        root: &Path,
        extra: Vec<String>,
        settings: &Settings,
    ) -> Result<CommandSpec, XdlError> {
        let program = process::resolve_binary(TOOL_NAME, self.configured.as_deref())
            .map_err(|err| XdlError::new("XDL_NOT_FOUND", format!("{err:#}")))?;

        let mut spec = CommandSpec::new(program)
            .arg(op)
            .arg("--project-root")
            .arg(root.as_os_str().to_os_string())
            .env(HOST_ENV, self.api.host.clone());
        if let Some(port) = self.api.port {
            spec = spec.env(PORT_ENV, port.to_string());
        }
        if root.is_dir() {
            spec.current_dir = Some(root.to_path_buf());
        }
        spec.args.extend(extra.into_iter().map(OsString::from));
        if settings.offline {
            spec = spec.arg("--offline");
        }
        if settings.non_interactive {
            spec = spec.arg("--non-interactive");
        }
        Ok(spec)
    }

    async fn run_spec(
        &self,
        op: &str,
        root: &Path,
        spec: CommandSpec,
    ) -> Result<JsonValue, XdlError> {
        tracing::debug!(op, root = %root.display(), "invoking xdl");

        let mut result = JsonValue::Null;
        let mut failure: Option<XdlError> = None;
        let status = process::run_lines(spec, |line| match parse_line(line) {
            None => {}
            Some(XdlMessage::Log(record)) => self.dispatch(root, &LogEvent::Record(record)),
            Some(XdlMessage::Notification(record)) => self.notify(&LogEvent::Record(record)),
            Some(XdlMessage::BuildStarted) => self.dispatch(root, &LogEvent::BuildStarted),
            Some(XdlMessage::BuildProgress { percent }) => {
                self.dispatch(root, &LogEvent::BuildProgress { percent })
            }
            Some(XdlMessage::BuildFinished { error, duration_ms }) => {
                self.dispatch(root, &LogEvent::BuildFinished { error, duration_ms })
            }
            Some(XdlMessage::Result { value }) => result = value,
            Some(XdlMessage::Error { code, message }) => {
                failure = Some(XdlError::new(code, message))
            }
        })
        .await
        .map_err(|err| XdlError::new("XDL_SPAWN", format!("{err:#}")))?;

        if let Some(err) = failure {
            self.signal_error(root, &err);
            return Err(err);
        }
        if !status.success() {
            let err = exit_error(op, status);
            self.signal_error(root, &err);
            return Err(err);
        }
        Ok(result)
    }

    async fn run_typed<T: DeserializeOwned>(
        &self,
        op: &str,
        root: &Path,
        extra: Vec<String>,
        settings: &Settings,
    ) -> Result<T, XdlError> {
        let value = self.run_op(op, root, extra, settings).await?;
        serde_json::from_value(value).map_err(|err| {
            XdlError::new(
                "XDL_BAD_RESPONSE",
                format!("unexpected result from `{TOOL_NAME} {op}`: {err}"),
            )
        })
    }

    fn matching(&self, root: &Path, event: &LogEvent) -> Vec<Arc<dyn LogObserver>> {
        lock(&self.observers)
            .iter()
            .filter(|attached| attached.root == root && attached.filter.accepts(event))
            .map(|attached| Arc::clone(&attached.observer))
            .collect()
    }

    fn dispatch(&self, root: &Path, event: &LogEvent) {
        let targets = self.matching(root, event);
        if targets.is_empty() {
            // Nobody listens for this project; fall back to the global stream.
            if let LogEvent::Record(_) = event {
                self.notify(event);
            }
            return;
        }
        for observer in targets {
            observer.next(event);
        }
    }

    fn notify(&self, event: &LogEvent) {
        let targets = lock(&self.notifications).clone();
        for observer in targets {
            observer.next(event);
        }
    }

    fn signal_error(&self, root: &Path, err: &XdlError) {
        let targets = lock(&self.observers)
            .iter()
            .filter(|attached| attached.root == root)
            .map(|attached| Arc::clone(&attached.observer))
            .collect::<Vec<_>>();
        for observer in targets {
            observer.error(err);
        }
    }
}

#[async_trait]
impl ProjectTools for XdlDelegate {
    async fn status(&self, root: &Path, settings: &Settings) -> Result<ProjectStatus, XdlError> {
        let result: StatusResult = self.run_typed("status", root, Vec::new(), settings).await?;
        Ok(result.status)
    }

    async fn validate(&self, root: &Path, settings: &Settings) -> Result<Severity, XdlError> {
        let result: DoctorResult = self.run_typed("doctor", root, Vec::new(), settings).await?;
        Ok(result.severity)
    }

    async fn start(
        &self,
        root: &Path,
        options: &StartOptions,
        settings: &Settings,
    ) -> Result<String, XdlError> {
        let mut extra = options.url.to_args();
        if options.clear {
            extra.push("--clear".to_string());
        }
        let result: UrlResult = self.run_typed("start", root, extra, settings).await?;
        Ok(result.url)
    }

    async fn stop(&self, root: &Path, settings: &Settings) -> Result<(), XdlError> {
        self.run_op("stop", root, Vec::new(), settings).await?;
        Ok(())
    }

    async fn publish(
        &self,
        root: &Path,
        options: &PublishOptions,
        settings: &Settings,
    ) -> Result<PublishResult, XdlError> {
        let mut extra = Vec::new();
        if options.quiet {
            extra.push("--quiet".to_string());
        }
        if let Some(channel) = &options.release_channel {
            extra.push("--release-channel".to_string());
            extra.push(channel.clone());
        }
        self.run_typed("publish", root, extra, settings).await
    }

    async fn url(
        &self,
        root: &Path,
        url: &UrlSettings,
        settings: &Settings,
    ) -> Result<String, XdlError> {
        let result: UrlResult = self.run_typed("url", root, url.to_args(), settings).await?;
        Ok(result.url)
    }

    async fn prepare_detached_build(
        &self,
        root: &Path,
        platform: Platform,
        settings: &Settings,
    ) -> Result<(), XdlError> {
        let extra = vec!["--platform".to_string(), platform.as_str().to_string()];
        self.run_op("prepare-detached-build", root, extra, settings)
            .await?;
        Ok(())
    }

    async fn follow_logs(&self, root: &Path, settings: &Settings) -> Result<(), XdlError> {
        let mut spec = self.command("logs", root, vec!["--follow".to_string()], settings)?;
        // Ctrl+C is handled by the caller, which drops (and so kills) the stream.
        spec.own_process_group = true;
        self.run_spec("logs", root, spec).await?;
        Ok(())
    }

    fn attach_logs(&self, root: &Path, filter: LogFilter, observer: Arc<dyn LogObserver>) {
        lock(&self.observers).push(Attached {
            root: root.to_path_buf(),
            filter,
            observer,
        });
    }

    fn detach_logs(&self, root: &Path) {
        let detached = {
            let mut observers = lock(&self.observers);
            let (gone, kept): (Vec<_>, Vec<_>) = observers
                .drain(..)
                .partition(|attached| attached.root == root);
            *observers = kept;
            gone
        };
        for attached in detached {
            attached.observer.complete();
        }
    }

    fn attach_notifications(&self, observer: Arc<dyn LogObserver>) {
        lock(&self.notifications).push(observer);
    }
}

fn exit_error(op: &str, status: ExitStatus) -> XdlError {
    if let Some(code) = status.code() {
        return XdlError::new(
            "XDL_EXIT",
            format!("`{TOOL_NAME} {op}` failed with exit code {code}"),
        );
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return XdlError::new(
                crate::error::XDL_SIGNALLED,
                format!("`{TOOL_NAME} {op}` was terminated by signal {signal}"),
            );
        }
    }
    XdlError::new("XDL_EXIT", format!("`{TOOL_NAME} {op}` failed: {status}"))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
