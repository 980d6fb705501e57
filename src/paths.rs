use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value as JsonValue};

use crate::config;

const USER_SETTINGS_FILE: &str = "user-settings.json";

/// Records the caller's `PATH` so detached tooling can find the same binaries.
pub async fn register_path() -> Result<()> {
    let Some(dir) = config::state_dir() else {
        tracing::debug!("no state directory; skipping PATH registration");
        return Ok(());
    };
    let Some(path) = std::env::var_os("PATH") else {
        return Ok(());
    };
    let path = path.to_string_lossy().into_owned();
    let file = dir.join(USER_SETTINGS_FILE);
    let changed = tokio::task::spawn_blocking(move || store_path(&file, &path))
        .await
        .context("PATH registration task failed")??;
    if changed {
        tracing::debug!("recorded PATH in user settings");
    }
    Ok(())
}

/// Merges `PATH` into the JSON settings file, leaving other keys untouched.
/// Returns whether the file changed.
pub fn store_path(file: &Path, path: &str) -> Result<bool> {
    let mut settings = if file.exists() {
        let raw = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        if raw.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", file.display()))?
            {
                JsonValue::Object(map) => map,
                _ => bail!("{} must contain a JSON object", file.display()),
            }
        }
    } else {
        Map::new()
    };

    if settings.get("PATH").and_then(JsonValue::as_str) == Some(path) {
        return Ok(false);
    }
    settings.insert("PATH".to_string(), JsonValue::String(path.to_string()));

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = serde_json::to_string_pretty(&JsonValue::Object(settings))
        .context("failed to render user settings")?;
    fs::write(file, rendered).with_context(|| format!("failed to write {}", file.display()))?;
    Ok(true)
}
