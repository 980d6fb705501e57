use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Enables stack traces, debug-only commands and debug logging.
pub const DEBUG_ENV: &str = "EXPO_DEBUG";
/// Backend host override.
pub const HOST_ENV: &str = "XDL_HOST";
/// Backend port override.
pub const PORT_ENV: &str = "XDL_PORT";
pub const CONFIG_ENV: &str = "EXP_CONFIG";
pub const HOME_ENV: &str = "EXP_HOME";
pub const NO_TELEMETRY_ENV: &str = "EXP_NO_TELEMETRY";

#[derive(Debug, Default, Deserialize)]
pub struct ExpConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub update: UpdateSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: None,
        }
    }
}

impl ApiSection {
    /// Root of the versioned API, always ending in `/`.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{port}/--/api/v2/", self.scheme, self.host),
            None => format!("{}://{}/--/api/v2/", self.scheme, self.host),
        }
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_host() -> String {
    "exp.host".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub xdl: ToolEntry,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolEntry {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSection {
    #[serde(default = "enabled")]
    pub check: bool,
    /// Crate registry queried for the latest published version.
    #[serde(default = "default_registry")]
    pub registry_url: String,
}

impl Default for UpdateSection {
    fn default() -> Self {
        Self {
            check: true,
            registry_url: default_registry(),
        }
    }
}

fn default_registry() -> String {
    "https://crates.io".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TelemetrySection {
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn enabled() -> bool {
    true
}

pub fn load() -> Result<ExpConfig> {
    let path_override = std::env::var(CONFIG_ENV).ok();
    let mut config = load_from(path_override.as_deref())?;
    apply_env_overrides(
        &mut config,
        std::env::var(HOST_ENV).ok(),
        std::env::var(PORT_ENV).ok(),
    )?;
    if std::env::var_os(NO_TELEMETRY_ENV).is_some() {
        config.telemetry.enabled = false;
    }
    Ok(config)
}

pub fn load_from(path_override: Option<&str>) -> Result<ExpConfig> {
    let Some(path) = config_path_override(path_override) else {
        return Ok(ExpConfig::default());
    };

    if !path.exists() {
        return Ok(ExpConfig::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: ExpConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    Ok(config)
}

fn apply_env_overrides(
    config: &mut ExpConfig,
    host: Option<String>,
    port: Option<String>,
) -> Result<()> {
    if let Some(host) = host.filter(|host| !host.trim().is_empty()) {
        config.api.host = host.trim().to_string();
    }
    if let Some(port) = port.filter(|port| !port.trim().is_empty()) {
        let parsed = port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("{PORT_ENV} must be a port number, got `{port}`"))?;
        config.api.port = Some(parsed);
    }
    Ok(())
}

fn config_path_override(path_override: Option<&str>) -> Option<PathBuf> {
    if let Some(raw) = path_override {
        return Some(PathBuf::from(raw));
    }
    config_path()
}

pub fn config_path() -> Option<PathBuf> {
    // Prefer XDG-style config path, but fall back to ~/.exp/config.toml.
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("exp");
        dir.push("config.toml");
        if dir.exists() {
            return Some(dir);
        }
    }
    state_dir().map(|mut dir| {
        dir.push("config.toml");
        dir
    })
}

/// Directory holding the session, user settings and update-check cache.
pub fn state_dir() -> Option<PathBuf> {
    if let Some(raw) = std::env::var_os(HOME_ENV) {
        return Some(PathBuf::from(raw));
    }
    dirs::home_dir().map(|mut home| {
        home.push(".exp");
        home
    })
}

/// True when the debug environment flag is set to anything but an explicit "off" value.
pub fn debug_enabled() -> bool {
    is_truthy(std::env::var(DEBUG_ENV).ok().as_deref())
}

fn is_truthy(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !matches!(v.as_str(), "" | "0" | "false" | "no" | "off"),
    }
}
