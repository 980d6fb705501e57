//! In-memory collaborators for wrapper tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::cli::{OutputFormat, Settings, UrlSettings};
use crate::config::ExpConfig;
use crate::context::AppContext;
use crate::delegate::{
    Accounts, Credentials, Platform, ProjectStatus, ProjectTools, PublishOptions, PublishResult,
    RegistrationForm, Services, Severity, StartOptions, Telemetry, UpdateState, User,
    VersionCheck, VersionSource,
};
use crate::error::{ApiError, XdlError};
use crate::logs::{LogFilter, LogObserver};
use crate::term::Terminal;

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

fn note(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

pub struct FakeProject {
    pub journal: Journal,
    pub status: ProjectStatus,
    pub severity: Severity,
    attached: Mutex<Vec<(PathBuf, LogFilter, Arc<dyn LogObserver>)>>,
    follow_failure: Mutex<Option<XdlError>>,
}

impl FakeProject {
    pub fn new(journal: Journal, status: ProjectStatus, severity: Severity) -> Self {
        Self {
            journal,
            status,
            severity,
            attached: Mutex::new(Vec::new()),
            follow_failure: Mutex::new(None),
        }
    }

    pub fn attached_count(&self) -> usize {
        self.attached.lock().unwrap().len()
    }

    /// Makes the next `follow_logs` end with `err` instead of returning cleanly.
    pub fn fail_follow(&self, err: XdlError) {
        *self.follow_failure.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl ProjectTools for FakeProject {
    async fn status(&self, _root: &Path, _settings: &Settings) -> Result<ProjectStatus, XdlError> {
        note(&self.journal, "status");
        Ok(self.status.clone())
    }

    async fn validate(&self, _root: &Path, _settings: &Settings) -> Result<Severity, XdlError> {
        note(&self.journal, "validate");
        Ok(self.severity)
    }

    async fn start(
        &self,
        _root: &Path,
        _options: &StartOptions,
        _settings: &Settings,
    ) -> Result<String, XdlError> {
        note(&self.journal, "start");
        Ok("exp://localhost:19000".into())
    }

    async fn stop(&self, _root: &Path, _settings: &Settings) -> Result<(), XdlError> {
        note(&self.journal, "stop");
        Ok(())
    }

    async fn publish(
        &self,
        _root: &Path,
        _options: &PublishOptions,
        _settings: &Settings,
    ) -> Result<PublishResult, XdlError> {
        note(&self.journal, "publish");
        Ok(PublishResult {
            url: "https://exp.host/@ada/app".into(),
        })
    }

    async fn url(
        &self,
        _root: &Path,
        _url: &UrlSettings,
        _settings: &Settings,
    ) -> Result<String, XdlError> {
        note(&self.journal, "url");
        Ok("exp://localhost:19000".into())
    }

    async fn prepare_detached_build(
        &self,
        _root: &Path,
        _platform: Platform,
        _settings: &Settings,
    ) -> Result<(), XdlError> {
        note(&self.journal, "prepare-detached-build");
        Ok(())
    }

    async fn follow_logs(&self, _root: &Path, _settings: &Settings) -> Result<(), XdlError> {
        note(&self.journal, "follow_logs");
        match self.follow_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn attach_logs(&self, root: &Path, filter: LogFilter, observer: Arc<dyn LogObserver>) {
        note(&self.journal, "attach");
        self.attached
            .lock()
            .unwrap()
            .push((root.to_path_buf(), filter, observer));
    }

    fn detach_logs(&self, root: &Path) {
        note(&self.journal, "detach");
        let mut attached = self.attached.lock().unwrap();
        for (_, _, observer) in attached.iter().filter(|(dir, _, _)| dir == root) {
            observer.complete();
        }
        attached.retain(|(dir, _, _)| dir != root);
    }

    fn attach_notifications(&self, _observer: Arc<dyn LogObserver>) {}
}

pub struct FakeAccounts {
    pub journal: Journal,
    pub user: Option<User>,
}

#[async_trait]
impl Accounts for FakeAccounts {
    async fn current_user(&self, _settings: &Settings) -> Result<Option<User>, ApiError> {
        note(&self.journal, "current_user");
        Ok(self.user.clone())
    }

    async fn ensure_session(&self, settings: &Settings) -> Result<Option<User>, ApiError> {
        note(&self.journal, "ensure_session");
        match (&self.user, settings.offline) {
            (_, true) => Ok(None),
            (Some(user), false) => Ok(Some(user.clone())),
            (None, false) => Err(ApiError::new("NOT_LOGGED_IN", "Not logged in.")),
        }
    }

    async fn login(
        &self,
        credentials: &Credentials,
        _settings: &Settings,
    ) -> Result<User, ApiError> {
        Ok(User {
            username: credentials.username.clone(),
            email: None,
        })
    }

    async fn register(
        &self,
        form: &RegistrationForm,
        _settings: &Settings,
    ) -> Result<User, ApiError> {
        Ok(User {
            username: form.username.clone(),
            email: Some(form.email.clone()),
        })
    }

    async fn logout(&self, _settings: &Settings) -> Result<(), ApiError> {
        Ok(())
    }
}

pub struct FakeVersions {
    pub journal: Journal,
}

#[async_trait]
impl VersionSource for FakeVersions {
    async fn check(&self) -> anyhow::Result<VersionCheck> {
        note(&self.journal, "update_check");
        Ok(VersionCheck {
            state: UpdateState::UpToDate,
            current: "0.4.0".into(),
            latest: "0.4.0".into(),
        })
    }
}

pub struct FakeTelemetry {
    pub journal: Journal,
}

#[async_trait]
impl Telemetry for FakeTelemetry {
    fn track(&self, event: &str, _properties: JsonValue) {
        note(&self.journal, format!("track:{event}"));
    }

    async fn flush(&self, _settings: &Settings) {
        note(&self.journal, "flush");
    }
}

pub struct Harness {
    pub journal: Journal,
    pub project: Arc<FakeProject>,
    pub services: Services,
}

impl Harness {
    pub fn new(status: ProjectStatus, severity: Severity, user: Option<User>) -> Self {
        let journal = Journal::default();
        let project = Arc::new(FakeProject::new(journal.clone(), status, severity));
        let services = Services {
            project: project.clone(),
            accounts: Arc::new(FakeAccounts {
                journal: journal.clone(),
                user,
            }),
            versions: Arc::new(FakeVersions {
                journal: journal.clone(),
            }),
            telemetry: Arc::new(FakeTelemetry {
                journal: journal.clone(),
            }),
        };
        Self {
            journal,
            project,
            services,
        }
    }

    pub fn context(&self, settings: Settings) -> AppContext {
        AppContext {
            settings,
            config: Arc::new(ExpConfig::default()),
            services: self.services.clone(),
            term: Terminal::new(OutputFormat::Raw),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        entries(&self.journal)
    }
}
