use crate::errors::AppResult;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const LAST_SEEN_NOTIFICATION_KEY: &str = "lastSeenNotifTime";

/// Device-local string key/value file, the desktop stand-in for browser storage.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .read_all()?
            .get(key)
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    pub fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&entries)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn last_seen_notification_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.get(LAST_SEEN_NOTIFICATION_KEY)? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
            Err(error) => {
                tracing::warn!(value = %raw, error = %error, "ignoring unparsable last-seen notification time");
                Ok(None)
            }
        }
    }

    pub fn mark_notifications_seen(&self, at: DateTime<Utc>) -> AppResult<()> {
        self.set(LAST_SEEN_NOTIFICATION_KEY, &at.to_rfc3339())
    }

    fn read_all(&self) -> AppResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let bytes = fs::read(&self.path)?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.to_string_lossy(), "local store is malformed; starting empty");
                Ok(Map::new())
            }
        }
    }
}
