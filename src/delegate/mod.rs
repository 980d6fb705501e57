//! Collaborators this CLI hands its work to.
//!
//! Commands only talk to these traits; the concrete implementations live in
//! the submodules (`xdl` for project work, `api` for accounts and analytics,
//! `versions` for update checks).

pub mod api;
pub mod versions;
pub mod xdl;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cli::{Settings, UrlSettings};
use crate::config::ExpConfig;
use crate::error::{ApiError, XdlError};
use crate::logs::{LogFilter, LogObserver};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Running,
    Ill,
    Exited,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    NoIssues,
    Warning,
    Error,
    Fatal,
}

#[derive(Clone, Debug, Default)]
pub struct StartOptions {
    pub url: UrlSettings,
    /// Clear the bundler cache before starting.
    pub clear: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    pub quiet: bool,
    pub release_channel: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublishResult {
    pub url: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

#[async_trait]
pub trait ProjectTools: Send + Sync {
    async fn status(&self, root: &Path, settings: &Settings) -> Result<ProjectStatus, XdlError>;

    async fn validate(&self, root: &Path, settings: &Settings) -> Result<Severity, XdlError>;

    /// Starts the dev server in the background and returns the project URL.
    async fn start(
        &self,
        root: &Path,
        options: &StartOptions,
        settings: &Settings,
    ) -> Result<String, XdlError>;

    async fn stop(&self, root: &Path, settings: &Settings) -> Result<(), XdlError>;

    async fn publish(
        &self,
        root: &Path,
        options: &PublishOptions,
        settings: &Settings,
    ) -> Result<PublishResult, XdlError>;

    async fn url(
        &self,
        root: &Path,
        url: &UrlSettings,
        settings: &Settings,
    ) -> Result<String, XdlError>;

    async fn prepare_detached_build(
        &self,
        root: &Path,
        platform: Platform,
        settings: &Settings,
    ) -> Result<(), XdlError>;

    /// Streams the running project's logs to attached observers until the stream ends.
    async fn follow_logs(&self, root: &Path, settings: &Settings) -> Result<(), XdlError>;

    fn attach_logs(&self, root: &Path, filter: LogFilter, observer: Arc<dyn LogObserver>);

    /// Signals completion to and removes every observer attached for `root`.
    fn detach_logs(&self, root: &Path);

    /// Observers for the global notification stream.
    fn attach_notifications(&self, observer: Arc<dyn LogObserver>);
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn current_user(&self, settings: &Settings) -> Result<Option<User>, ApiError>;

    /// Fails unless a session exists; offline mode skips the check.
    async fn ensure_session(&self, settings: &Settings) -> Result<Option<User>, ApiError>;

    async fn login(&self, credentials: &Credentials, settings: &Settings)
    -> Result<User, ApiError>;

    async fn register(
        &self,
        form: &RegistrationForm,
        settings: &Settings,
    ) -> Result<User, ApiError>;

    async fn logout(&self, settings: &Settings) -> Result<(), ApiError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateState {
    UpToDate,
    OutOfDate,
    AheadOfPublished,
    Unknown(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionCheck {
    pub state: UpdateState,
    pub current: String,
    pub latest: String,
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn check(&self) -> anyhow::Result<VersionCheck>;
}

#[async_trait]
pub trait Telemetry: Send + Sync {
    fn track(&self, event: &str, properties: serde_json::Value);

    /// Sends buffered events. Best-effort: never fails the command.
    async fn flush(&self, settings: &Settings);
}

/// The full set of collaborators handed to every command.
#[derive(Clone)]
pub struct Services {
    pub project: Arc<dyn ProjectTools>,
    pub accounts: Arc<dyn Accounts>,
    pub versions: Arc<dyn VersionSource>,
    pub telemetry: Arc<dyn Telemetry>,
}

impl Services {
    /// Wires the production collaborators from the loaded config.
    pub fn from_config(config: &ExpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            project: Arc::new(xdl::XdlDelegate::from_config(config)),
            accounts: Arc::new(api::ApiClient::from_config(config)?),
            versions: Arc::new(versions::RegistryVersions::from_config(config)?),
            telemetry: Arc::new(api::Analytics::from_config(config)?),
        })
    }
}
