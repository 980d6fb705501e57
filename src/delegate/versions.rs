use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use semver::Version;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{UpdateState, VersionCheck, VersionSource};
use crate::config::{self, ExpConfig};

pub const CRATE_NAME: &str = "exp-cli";
const CACHE_FILE: &str = "update-check.json";
const CACHE_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_stable_version: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CachedCheck {
    checked_at: i64,
    latest: String,
}

/// Latest published version from a crates.io-compatible registry.
pub struct RegistryVersions {
    registry_url: String,
    current: String,
    cache_path: Option<PathBuf>,
    http: Client,
}

impl RegistryVersions {
    pub fn from_config(config: &ExpConfig) -> Result<Self> {
        Self::new(
            config.update.registry_url.clone(),
            env!("CARGO_PKG_VERSION").to_string(),
            config::state_dir().map(|dir| dir.join(CACHE_FILE)),
        )
    }

    pub fn new(registry_url: String, current: String, cache_path: Option<PathBuf>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(concat!("exp/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            registry_url: registry_url.trim_end_matches('/').to_string(),
            current,
            cache_path,
            http,
        })
    }

    fn cached_latest(&self, now: i64) -> Option<String> {
        let path = self.cache_path.as_ref()?;
        let raw = fs::read_to_string(path).ok()?;
        let cached: CachedCheck = serde_json::from_str(&raw).ok()?;
        (now - cached.checked_at < CACHE_TTL_SECS).then_some(cached.latest)
    }

    fn store_latest(&self, now: i64, latest: &str) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let cached = CachedCheck {
            checked_at: now,
            latest: latest.to_string(),
        };
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| {
                let rendered = serde_json::to_string(&cached).map_err(std::io::Error::other)?;
                fs::write(path, rendered)
            });
        if let Err(err) = written {
            tracing::debug!("failed to cache update check at {}: {err}", path.display());
        }
    }

    async fn fetch_latest(&self) -> Result<String> {
        let url = format!("{}/api/v1/crates/{CRATE_NAME}", self.registry_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to query {url}"))?;
        if !response.status().is_success() {
            bail!("{url} responded with {}", response.status());
        }
        let body: CrateResponse = response
            .json()
            .await
            .with_context(|| format!("invalid registry response from {url}"))?;
        body.krate
            .max_stable_version
            .with_context(|| format!("{CRATE_NAME} has no stable release"))
    }
}

/// Orders the running version against the latest published one.
pub fn compare(current: &str, latest: &str) -> UpdateState {
    let parsed = Version::parse(current).and_then(|c| Version::parse(latest).map(|l| (c, l)));
    match parsed {
        Ok((current, latest)) if current < latest => UpdateState::OutOfDate,
        Ok((current, latest)) if current > latest => UpdateState::AheadOfPublished,
        Ok(_) => UpdateState::UpToDate,
        Err(err) => UpdateState::Unknown(err.to_string()),
    }
}

#[async_trait]
impl VersionSource for RegistryVersions {
    async fn check(&self) -> Result<VersionCheck> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let latest = match self.cached_latest(now) {
            Some(latest) => latest,
            None => {
                let latest = self.fetch_latest().await?;
                self.store_latest(now, &latest);
                latest
            }
        };
        Ok(VersionCheck {
            state: compare(&self.current, &latest),
            current: self.current.clone(),
            latest,
        })
    }
}
