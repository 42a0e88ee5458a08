use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::AppSettings;
use anyhow::Context;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yaml";

/// Defaults for a fresh data directory; blobs are served from `<data>/blobs`.
pub fn default_settings(app_data_dir: &Path) -> AppSettings {
    AppSettings {
        public_base_url: Some(format!(
            "file://{}",
            app_data_dir.join("blobs").to_string_lossy().trim_end_matches('/')
        )),
        ..AppSettings::default()
    }
}

fn read_overlay(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let overlay: Value = serde_yaml::from_str(&raw).with_context(|| format!("invalid yaml in {}", path.display()))?;
    if !overlay.is_object() {
        anyhow::bail!("{} must contain a mapping of settings", path.display());
    }
    Ok(Some(overlay))
}

pub fn load_overlay(app_data_dir: &Path) -> AppResult<Option<Value>> {
    read_overlay(&app_data_dir.join(CONFIG_FILE)).map_err(|error| AppError::Validation(format!("{:#}", error)))
}

/// Seeds the settings row on first start, then lets `config.yaml` win on
/// every start.
pub fn bootstrap_settings(db: &Database, app_data_dir: &Path) -> AppResult<AppSettings> {
    db.ensure_default_settings(&default_settings(app_data_dir))?;
    match load_overlay(app_data_dir)? {
        Some(overlay) => {
            let settings = db.update_settings(overlay)?;
            tracing::info!(file = CONFIG_FILE, "settings overlay applied");
            Ok(settings)
        }
        None => db.get_settings(),
    }
}
