pub mod blob;

use crate::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Slash-joined hierarchical address of a document or collection,
/// e.g. `users/{uid}/todolist/{taskId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    pub fn root(segment: &str) -> Self {
        Self {
            segments: vec![clean_segment(segment)],
        }
    }

    pub fn user(uid: &str) -> Self {
        Self::root("users").child(uid)
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        let segments = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if segments.is_empty() {
            return Err(AppError::Validation(format!("empty document path: {:?}", raw)));
        }
        Ok(Self { segments })
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(clean_segment(segment));
        Self { segments }
    }

    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn clean_segment(segment: &str) -> String {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return "_".to_string();
    }
    trimmed.replace('/', "_")
}

/// Equality predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

/// Hosted JSON document database contract. Every call is a single attempt;
/// writes are last-write-wins per path.
pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &DocPath) -> AppResult<Option<Value>>;

    /// Full overwrite, creating the document when missing.
    fn set(&self, path: &DocPath, value: &Value) -> AppResult<()>;

    /// Field-level merge into an existing document. Missing documents are `NotFound`.
    fn merge(&self, path: &DocPath, patch: &Value) -> AppResult<()>;

    fn delete(&self, path: &DocPath) -> AppResult<()>;

    /// Direct children of `collection`, optionally narrowed by an equality filter.
    fn list(&self, collection: &DocPath, filter: Option<&Filter>) -> AppResult<Vec<(String, Value)>>;

    fn batch_delete(&self, paths: &[DocPath]) -> AppResult<()>;

    fn add(&self, collection: &DocPath, value: &Value) -> AppResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&collection.child(&id), value)?;
        Ok(id)
    }
}

/// Named-object storage with public URL issuance.
pub trait BlobStore: Send + Sync {
    fn upload(&self, bucket: &str, name: &str, bytes: &[u8], content_type: &str, upsert: bool) -> AppResult<()>;

    fn public_url(&self, bucket: &str, name: &str) -> String;

    fn download(&self, bucket: &str, name: &str) -> AppResult<Vec<u8>>;

    fn download_url(&self, url: &str) -> AppResult<Vec<u8>>;

    fn list(&self, bucket: &str) -> AppResult<Vec<String>>;
}

pub fn to_document<T: Serialize>(value: &T) -> AppResult<Value> {
    let document = serde_json::to_value(value)?;
    if !document.is_object() {
        return Err(AppError::Internal("documents must serialize to JSON objects".to_string()));
    }
    Ok(document)
}

pub fn read_doc<T: DeserializeOwned>(store: &dyn DocumentStore, path: &DocPath) -> AppResult<Option<T>> {
    let Some(mut value) = store.get(path)? else {
        return Ok(None);
    };
    inject_id(&mut value, path.id());
    serde_json::from_value(value).map(Some).map_err(AppError::from)
}

/// Typed listing; documents that fail to decode are skipped with a warning.
pub fn list_docs<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &DocPath,
    filter: Option<&Filter>,
) -> AppResult<Vec<T>> {
    let mut items = Vec::new();
    for (id, mut value) in store.list(collection, filter)? {
        inject_id(&mut value, &id);
        match serde_json::from_value::<T>(value) {
            Ok(item) => items.push(item),
            Err(error) => {
                tracing::warn!(collection = %collection, id = %id, error = %error, "skipping malformed document");
            }
        }
    }
    Ok(items)
}

fn inject_id(value: &mut Value, id: &str) {
    if let Some(object) = value.as_object_mut() {
        object
            .entry("id".to_string())
            .or_insert_with(|| Value::String(id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::{DocPath, Filter};
    use serde_json::json;

    #[test]
    fn doc_path_builds_user_scoped_addresses() {
        let path = DocPath::user("u1").child("todolist").child("t/1");
        assert_eq!(path.to_string(), "users/u1/todolist/t_1");
        assert_eq!(path.id(), "t_1");
        assert_eq!(path.parent().expect("parent").to_string(), "users/u1/todolist");
        assert_eq!(DocPath::parse("/users/u1/").expect("parse"), DocPath::user("u1"));
        assert!(DocPath::parse("//").is_err());
    }

    #[test]
    fn filter_matches_on_equality_only() {
        let filter = Filter::eq("userId", "u1");
        assert!(filter.matches(&json!({ "userId": "u1", "title": "a" })));
        assert!(!filter.matches(&json!({ "userId": "u2" })));
        assert!(!filter.matches(&json!({ "title": "a" })));
    }
}
