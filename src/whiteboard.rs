use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, SaveWhiteboardPayload, WhiteboardRecord, WhiteboardScene};
use crate::store::{list_docs, BlobStore, DocPath, DocumentStore};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

pub const FILE_EXTENSION: &str = "excalidraw";
pub const UNTITLED: &str = "untitled";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static UNSAFE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_-]").expect("valid name regex"));

fn whiteboards_collection(uid: &str) -> DocPath {
    DocPath::user(uid).child("whiteboards")
}

fn views_collection(uid: &str) -> DocPath {
    DocPath::user(uid).child("whiteboardViews")
}

/// `{slug}-{epochMillis}.excalidraw`; a fresh name on every save.
pub fn whiteboard_file_name(title: &str, now: DateTime<Utc>) -> String {
    let dashed = WHITESPACE_RE.replace_all(title.trim(), "-").to_lowercase();
    let slug = UNSAFE_NAME_RE.replace_all(&dashed, "");
    let slug = if slug.trim_matches('-').is_empty() {
        UNTITLED
    } else {
        slug.as_ref()
    };
    format!("{}-{}.{}", slug, now.timestamp_millis(), FILE_EXTENSION)
}

pub fn load_scene(blobs: &dyn BlobStore, url: &str) -> AppResult<WhiteboardScene> {
    let bytes = blobs.download_url(url)?;
    serde_json::from_slice(&bytes)
        .map_err(|error| AppError::Validation(format!("whiteboard at {} is not a readable scene: {}", url, error)))
}

/// Best-effort: a failed write is logged and swallowed.
pub fn log_view(store: &dyn DocumentStore, uid: &str, url: &str, now: DateTime<Utc>) {
    if let Err(error) = store.add(&views_collection(uid), &json!({ "url": url, "viewedAt": now })) {
        tracing::warn!(uid, url, error = %error, "failed to log whiteboard view");
    }
}

pub fn open_whiteboard(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    uid: Option<&str>,
    url: &str,
    now: DateTime<Utc>,
) -> AppResult<WhiteboardScene> {
    let scene = load_scene(blobs, url)?;
    if let Some(uid) = uid {
        log_view(store, uid, url, now);
    }
    Ok(scene)
}

/// Uploads the scene as a new object, then records a pointer to it.
pub fn save_whiteboard(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    payload: &SaveWhiteboardPayload,
    now: DateTime<Utc>,
) -> AppResult<WhiteboardRecord> {
    let title = match payload.title.trim() {
        "" => UNTITLED,
        trimmed => trimmed,
    };

    let file_name = whiteboard_file_name(title, now);
    let bytes = serde_json::to_vec(&payload.scene)?;
    blobs.upload(&settings.whiteboard_bucket, &file_name, &bytes, "application/json", false)?;
    let url = blobs.public_url(&settings.whiteboard_bucket, &file_name);

    let local = now.with_timezone(&settings.offset());
    let readable_date = local.format("%B %-d, %Y %I:%M %p").to_string();
    let id = store.add(
        &whiteboards_collection(uid),
        &json!({
            "title": title,
            "url": url,
            "fileName": file_name,
            "createdAt": now,
            "readableDate": readable_date,
        }),
    )?;
    tracing::info!(uid, whiteboard_id = %id, file_name = %file_name, "whiteboard saved");

    Ok(WhiteboardRecord {
        id,
        title: title.to_string(),
        url,
        file_name,
        created_at: now,
        readable_date,
    })
}

/// Newest first.
pub fn list_whiteboards(store: &dyn DocumentStore, uid: &str) -> AppResult<Vec<WhiteboardRecord>> {
    let mut records: Vec<WhiteboardRecord> = list_docs(store, &whiteboards_collection(uid), None)?;
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::store::blob::FsBlobStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 16, 45, 0).single().expect("valid time")
    }

    fn scene() -> WhiteboardScene {
        WhiteboardScene {
            kind: "excalidraw".to_string(),
            elements: vec![json!({ "id": "rect-1", "type": "rectangle", "x": 10, "y": 20 })],
            app_state: json!({ "viewBackgroundColor": "#ffffff" }),
            files: json!({}),
        }
    }

    #[test]
    fn file_names_are_slugged_and_timestamped() {
        let now = now();
        let millis = now.timestamp_millis();
        assert_eq!(
            whiteboard_file_name("  Sprint   Plan ", now),
            format!("sprint-plan-{}.excalidraw", millis)
        );
        assert_eq!(whiteboard_file_name("???", now), format!("untitled-{}.excalidraw", millis));
        assert_eq!(whiteboard_file_name("", now), format!("untitled-{}.excalidraw", millis));
    }

    #[test]
    fn saving_twice_creates_two_objects_and_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("hub.sqlite")).expect("db");
        let blobs = FsBlobStore::new(&dir.path().join("blobs"), Some("https://cdn.test")).expect("blobs");
        let settings = AppSettings::default();
        let payload = SaveWhiteboardPayload {
            title: "Sprint Plan".to_string(),
            scene: scene(),
        };

        let first = save_whiteboard(&db, &blobs, &settings, "u1", &payload, now()).expect("first save");
        let second =
            save_whiteboard(&db, &blobs, &settings, "u1", &payload, now() + Duration::seconds(5)).expect("second save");

        assert_ne!(first.file_name, second.file_name);
        assert_eq!(first.url, format!("https://cdn.test/whiteboards/{}", first.file_name));
        assert_eq!(first.readable_date, "February 14, 2026 04:45 PM");
        assert_eq!(blobs.list("whiteboards").expect("list").len(), 2);

        let listed = list_whiteboards(&db, "u1").expect("list records");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);

        // Same millisecond means same name; the store refuses to overwrite.
        let clash = save_whiteboard(&db, &blobs, &settings, "u1", &payload, now());
        assert!(matches!(clash, Err(AppError::Conflict(_))));
    }

    #[test]
    fn blank_title_saves_as_untitled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("hub.sqlite")).expect("db");
        let blobs = FsBlobStore::new(&dir.path().join("blobs"), None).expect("blobs");
        let payload = SaveWhiteboardPayload {
            title: "   ".to_string(),
            scene: scene(),
        };

        let record = save_whiteboard(&db, &blobs, &AppSettings::default(), "u1", &payload, now()).expect("save");
        assert_eq!(record.title, "untitled");
        assert_eq!(record.file_name, format!("untitled-{}.excalidraw", now().timestamp_millis()));

        let listed = list_whiteboards(&db, "u1").expect("list records");
        assert_eq!(listed[0].title, "untitled");
        assert_eq!(listed[0].file_name, record.file_name);
    }

    #[test]
    fn opening_loads_the_scene_and_logs_a_view() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("hub.sqlite")).expect("db");
        let blobs = FsBlobStore::new(&dir.path().join("blobs"), None).expect("blobs");
        let payload = SaveWhiteboardPayload {
            title: "Map".to_string(),
            scene: scene(),
        };
        let record = save_whiteboard(&db, &blobs, &AppSettings::default(), "u1", &payload, now()).expect("save");

        let loaded = open_whiteboard(&db, &blobs, Some("u1"), &record.url, now()).expect("open");
        assert_eq!(loaded, scene());
        let views = db.list(&DocPath::user("u1").child("whiteboardViews"), None).expect("views");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].1["url"], json!(record.url));

        assert!(open_whiteboard(&db, &blobs, None, "https://elsewhere.test/x", now()).is_err());
    }
}
