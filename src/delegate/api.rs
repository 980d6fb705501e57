use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use super::{Accounts, Credentials, RegistrationForm, Telemetry, User};
use crate::cli::Settings;
use crate::config::{self, ExpConfig};
use crate::error::ApiError;

const SESSION_HEADER: &str = "Expo-Session";
const STATE_FILE: &str = "state.json";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default = "unknown_code")]
    code: String,
    message: String,
}

fn unknown_code() -> String {
    "API_ERROR".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    session_secret: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct StateFile {
    #[serde(default)]
    auth: Option<StoredSession>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    session_secret: String,
    username: String,
}

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("exp/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

async fn post<T: DeserializeOwned>(
    http: &Client,
    base_url: &str,
    endpoint: &str,
    body: &JsonValue,
    session: Option<&str>,
) -> Result<T, ApiError> {
    let url = format!("{base_url}{endpoint}");
    let mut builder = http.post(url).json(body);
    if let Some(secret) = session {
        builder = builder.header(SESSION_HEADER, secret);
    }
    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let envelope: Envelope<T> = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(ApiError::new(
                format!("HTTP_{}", status.as_u16()),
                format!("API request to {endpoint} failed with status {status}"),
            ));
        }
        Err(err) => {
            return Err(ApiError::new(
                "BAD_RESPONSE",
                format!("invalid response from {endpoint}: {err}"),
            ));
        }
    };
    if let Some(first) = envelope.errors.into_iter().next() {
        return Err(ApiError::new(first.code, first.message));
    }
    if !status.is_success() {
        return Err(ApiError::new(
            format!("HTTP_{}", status.as_u16()),
            format!("API request to {endpoint} failed with status {status}"),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::new("BAD_RESPONSE", format!("{endpoint} returned no data")))
}

/// Account operations against the backend, with the session kept on disk.
pub struct ApiClient {
    base_url: String,
    http: Client,
    state_path: Option<PathBuf>,
}

impl ApiClient {
    pub fn from_config(config: &ExpConfig) -> Result<Self> {
        let state_path = config::state_dir().map(|dir| dir.join(STATE_FILE));
        Self::new(config.api.base_url(), state_path)
    }

    pub fn new(base_url: String, state_path: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            base_url,
            http: http_client()?,
            state_path,
        })
    }

    fn stored_session(&self) -> Option<StoredSession> {
        let path = self.state_path.as_ref()?;
        match read_state(path) {
            Ok(state) => state.auth,
            Err(err) => {
                tracing::warn!("ignoring unreadable session state: {err:#}");
                None
            }
        }
    }

    fn store_session(&self, session: Option<StoredSession>) -> Result<(), ApiError> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        let mut state = read_state(path).unwrap_or_default();
        state.auth = session;
        write_state(path, &state)
            .map_err(|err| ApiError::new("STATE_WRITE_FAILED", format!("{err:#}")))
    }

    async fn profile(&self, secret: &str) -> Result<User, ApiError> {
        post(
            &self.http,
            &self.base_url,
            "auth/userProfileAsync",
            &json!({}),
            Some(secret),
        )
        .await
    }
}

fn read_state(path: &Path) -> Result<StateFile> {
    if !path.exists() {
        return Ok(StateFile::default());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(StateFile::default());
    }
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_state(path: &Path, state: &StateFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = serde_json::to_string_pretty(state).context("failed to render state")?;
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
}

fn not_logged_in() -> ApiError {
    ApiError::new(
        "NOT_LOGGED_IN",
        "Not logged in. Run `exp login` to log in or `exp register` to create an account.",
    )
}

fn offline_error(action: &str) -> ApiError {
    ApiError::new("OFFLINE", format!("Cannot {action} while offline."))
}

#[async_trait]
impl Accounts for ApiClient {
    async fn current_user(&self, settings: &Settings) -> Result<Option<User>, ApiError> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };
        if settings.offline {
            return Ok(Some(User {
                username: session.username,
                email: None,
            }));
        }
        match self.profile(&session.session_secret).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.code == "UNAUTHORIZED" => {
                tracing::debug!("stored session was rejected; clearing it");
                self.store_session(None)?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn ensure_session(&self, settings: &Settings) -> Result<Option<User>, ApiError> {
        if settings.offline {
            return Ok(None);
        }
        match self.current_user(settings).await? {
            Some(user) => Ok(Some(user)),
            None => Err(not_logged_in()),
        }
    }

    async fn login(
        &self,
        credentials: &Credentials,
        settings: &Settings,
    ) -> Result<User, ApiError> {
        if settings.offline {
            return Err(offline_error("log in"));
        }
        let data: LoginData = post(
            &self.http,
            &self.base_url,
            "auth/loginAsync",
            &json!({
                "username": credentials.username,
                "password": credentials.password,
            }),
            None,
        )
        .await?;
        let user = self.profile(&data.session_secret).await?;
        self.store_session(Some(StoredSession {
            session_secret: data.session_secret,
            username: user.username.clone(),
        }))?;
        Ok(user)
    }

    async fn register(
        &self,
        form: &RegistrationForm,
        settings: &Settings,
    ) -> Result<User, ApiError> {
        if settings.offline {
            return Err(offline_error("register"));
        }
        let _created: JsonValue = post(
            &self.http,
            &self.base_url,
            "auth/createOrUpdateUser",
            &json!({
                "userData": {
                    "email": form.email,
                    "username": form.username,
                    "password": form.password,
                }
            }),
            None,
        )
        .await?;
        let credentials = Credentials {
            username: form.username.clone(),
            password: form.password.clone(),
        };
        self.login(&credentials, settings).await
    }

    async fn logout(&self, settings: &Settings) -> Result<(), ApiError> {
        let Some(session) = self.stored_session() else {
            return Ok(());
        };
        if !settings.offline {
            let revoked: Result<JsonValue, ApiError> = post(
                &self.http,
                &self.base_url,
                "auth/logout",
                &json!({}),
                Some(&session.session_secret),
            )
            .await;
            if let Err(err) = revoked {
                tracing::debug!("server-side logout failed: {err}");
            }
        }
        self.store_session(None)
    }
}

/// Buffers usage events and posts them in one batch on flush.
pub struct Analytics {
    base_url: String,
    http: Client,
    enabled: bool,
    buffer: Mutex<Vec<JsonValue>>,
}

impl Analytics {
    pub fn from_config(config: &ExpConfig) -> Result<Self> {
        Self::new(config.api.base_url(), config.telemetry.enabled)
    }

    pub fn new(base_url: String, enabled: bool) -> Result<Self> {
        Ok(Self {
            base_url,
            http: http_client()?,
            enabled,
            buffer: Mutex::new(Vec::new()),
        })
    }

    fn take_buffer(&self) -> Vec<JsonValue> {
        let mut guard = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *guard)
    }
}

#[async_trait]
impl Telemetry for Analytics {
    fn track(&self, event: &str, properties: JsonValue) {
        if !self.enabled {
            return;
        }
        let mut guard = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(json!({ "event": event, "properties": properties }));
    }

    async fn flush(&self, settings: &Settings) {
        let batch = self.take_buffer();
        if batch.is_empty() || !self.enabled || settings.offline {
            return;
        }
        let url = format!("{}analytics/batch", self.base_url);
        let sent = self
            .http
            .post(url)
            .timeout(Duration::from_secs(2))
            .json(&json!({ "batch": batch }))
            .send()
            .await;
        match sent {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(status = %response.status(), "telemetry batch rejected");
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("telemetry flush failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn client(server: &MockServer, dir: &TempDir) -> ApiClient {
        ApiClient::new(
            format!("{}/--/api/v2/", server.base_url()),
            Some(dir.path().join(STATE_FILE)),
        )
        .unwrap()
    }

    fn online() -> Settings {
        Settings::default()
    }

    #[tokio::test]
    async fn login_stores_the_session() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/--/api/v2/auth/loginAsync")
                    .json_body(json!({"username": "ada", "password": "hunter2"}));
                then.status(200)
                    .json_body(json!({"data": {"sessionSecret": "s3cret"}}));
            })
            .await;
        let profile = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/--/api/v2/auth/userProfileAsync")
                    .header(SESSION_HEADER, "s3cret");
                then.status(200)
                    .json_body(json!({"data": {"username": "ada", "email": "ada@example.com"}}));
            })
            .await;

        let api = client(&server, &dir);
        let user = api
            .login(
                &Credentials {
                    username: "ada".into(),
                    password: "hunter2".into(),
                },
                &online(),
            )
            .await
            .unwrap();
        assert_eq!(user.username, "ada");
        login.assert_async().await;

        let current = api.current_user(&online()).await.unwrap();
        assert_eq!(current.map(|u| u.username).as_deref(), Some("ada"));
        profile.assert_hits_async(2).await;

        let stored = fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
        assert!(stored.contains("s3cret"));
    }

    #[tokio::test]
    async fn api_error_bodies_become_api_errors() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        server
            .mock_async(|when, then| {
                when.method(POST).path("/--/api/v2/auth/loginAsync");
                then.status(401).json_body(json!({
                    "errors": [{"code": "INVALID_PASSWORD", "message": "Invalid username or password"}]
                }));
            })
            .await;

        let err = client(&server, &dir)
            .login(
                &Credentials {
                    username: "ada".into(),
                    password: "wrong".into(),
                },
                &online(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_PASSWORD");
        assert_eq!(err.message, "Invalid username or password");
    }

    #[tokio::test]
    async fn ensure_session_fails_without_a_stored_session() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        let api = client(&server, &dir);
        let err = api.ensure_session(&online()).await.unwrap_err();
        assert_eq!(err.code, "NOT_LOGGED_IN");

        let offline = Settings {
            offline: true,
            ..Settings::default()
        };
        assert_eq!(api.ensure_session(&offline).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_session_is_cleared() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        write_state(
            &dir.path().join(STATE_FILE),
            &StateFile {
                auth: Some(StoredSession {
                    session_secret: "stale".into(),
                    username: "ada".into(),
                }),
            },
        )
        .unwrap();
        server
            .mock_async(|when, then| {
                when.method(POST).path("/--/api/v2/auth/userProfileAsync");
                then.status(401).json_body(json!({
                    "errors": [{"code": "UNAUTHORIZED", "message": "session expired"}]
                }));
            })
            .await;

        let api = client(&server, &dir);
        assert_eq!(api.current_user(&online()).await.unwrap(), None);
        assert!(api.stored_session().is_none());
    }

    #[tokio::test]
    async fn logout_forgets_the_session_even_if_the_server_fails() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        write_state(
            &dir.path().join(STATE_FILE),
            &StateFile {
                auth: Some(StoredSession {
                    session_secret: "s3cret".into(),
                    username: "ada".into(),
                }),
            },
        )
        .unwrap();
        server
            .mock_async(|when, then| {
                when.method(POST).path("/--/api/v2/auth/logout");
                then.status(500);
            })
            .await;

        let api = client(&server, &dir);
        api.logout(&online()).await.unwrap();
        assert!(api.stored_session().is_none());
    }

    #[tokio::test]
    async fn flush_posts_buffered_events_once() {
        let server = MockServer::start_async().await;
        let batch = server
            .mock_async(|when, then| {
                when.method(POST).path("/--/api/v2/analytics/batch");
                then.status(200).json_body(json!({"data": {}}));
            })
            .await;
        let analytics =
            Analytics::new(format!("{}/--/api/v2/", server.base_url()), true).unwrap();
        analytics.track("command", json!({"name": "start"}));
        analytics.flush(&online()).await;
        analytics.flush(&online()).await;
        batch.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn flush_is_skipped_offline() {
        let server = MockServer::start_async().await;
        let batch = server
            .mock_async(|when, then| {
                when.method(POST).path("/--/api/v2/analytics/batch");
                then.status(200);
            })
            .await;
        let analytics =
            Analytics::new(format!("{}/--/api/v2/", server.base_url()), true).unwrap();
        analytics.track("command", json!({"name": "start"}));
        let offline = Settings {
            offline: true,
            ..Settings::default()
        };
        analytics.flush(&offline).await;
        batch.assert_hits_async(0).await;
    }
}
