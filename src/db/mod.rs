use crate::errors::{AppError, AppResult};
use crate::models::AppSettings;
use crate::store::{DocPath, DocumentStore, Filter};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// SQLite-backed document database. Documents are JSON objects keyed by
/// their full path; collections are implied by the `parent` column.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn ensure_default_settings(&self, seed: &AppSettings) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM settings WHERE key = 'app'", [], |row| row.get(0))?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)",
                params![serde_json::to_string(seed)?, Utc::now().to_rfc3339()],
            )?;
        }
        Ok(())
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value_json FROM settings WHERE key = 'app'", [], |row| row.get(0))
            .optional()?;
        match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(AppError::from),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, patch: Value) -> AppResult<AppSettings> {
        let mut current = serde_json::to_value(self.get_settings()?)?;
        merge_json(&mut current, patch);
        let settings: AppSettings = serde_json::from_value(current)
            .map_err(|error| AppError::Validation(format!("invalid settings: {}", error)))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at) VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;
        Ok(settings)
    }

    fn write_document(conn: &Connection, path: &DocPath, value: &Value) -> AppResult<()> {
        if !value.is_object() {
            return Err(AppError::Validation(format!("document at {} must be an object", path)));
        }
        let parent = path.parent().map(|parent| parent.to_string()).unwrap_or_default();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO documents (path, parent, doc_id, data_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(path) DO UPDATE SET data_json = excluded.data_json, updated_at = excluded.updated_at",
            params![path.to_string(), parent, path.id(), serde_json::to_string(value)?, now],
        )?;
        Ok(())
    }

    fn read_document(conn: &Connection, path: &DocPath) -> AppResult<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT data_json FROM documents WHERE path = ?1",
                [path.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(AppError::from))
            .transpose()
    }
}

impl DocumentStore for Database {
    fn get(&self, path: &DocPath) -> AppResult<Option<Value>> {
        let conn = self.lock()?;
        Self::read_document(&conn, path)
    }

    fn set(&self, path: &DocPath, value: &Value) -> AppResult<()> {
        let conn = self.lock()?;
        Self::write_document(&conn, path, value)
    }

    fn merge(&self, path: &DocPath, patch: &Value) -> AppResult<()> {
        let Some(fields) = patch.as_object() else {
            return Err(AppError::Validation(format!("patch for {} must be an object", path)));
        };
        let conn = self.lock()?;
        let Some(mut existing) = Self::read_document(&conn, path)? else {
            return Err(AppError::NotFound(format!("no document at {}", path)));
        };
        if let Some(target) = existing.as_object_mut() {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Self::write_document(&conn, path, &existing)
    }

    fn delete(&self, path: &DocPath) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM documents WHERE path = ?1", [path.to_string()])?;
        Ok(())
    }

    fn list(&self, collection: &DocPath, filter: Option<&Filter>) -> AppResult<Vec<(String, Value)>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT doc_id, data_json FROM documents WHERE parent = ?1 ORDER BY rowid ASC",
        )?;
        let rows = statement.query_map([collection.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            let value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!(collection = %collection, id = %id, error = %error, "skipping unreadable document");
                    continue;
                }
            };
            if filter.map_or(true, |filter| filter.matches(&value)) {
                result.push((id, value));
            }
        }
        Ok(result)
    }

    fn batch_delete(&self, paths: &[DocPath]) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for path in paths {
            tx.execute("DELETE FROM documents WHERE path = ?1", [path.to_string()])?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn merge_json(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
