use crate::achievements;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AppSettings, CounterBag, ProfilePictureUpload, ProfileView, SaveProfilePayload, SessionIdentity, UserProfile,
    XpHistoryEntry,
};
use crate::store::{list_docs, read_doc, to_document, BlobStore, DocPath, DocumentStore};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

pub const PICTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "webp", "png"];
const MAX_NAME_CHARS: usize = 10;

pub fn profile_path(uid: &str) -> DocPath {
    DocPath::user(uid)
}

fn xp_history_path(uid: &str) -> DocPath {
    DocPath::user(uid).child("xpHistory")
}

pub fn get_profile(store: &dyn DocumentStore, uid: &str) -> AppResult<Option<UserProfile>> {
    read_doc(store, &profile_path(uid))
}

/// Creates the profile document on first sign-in; later calls return it untouched.
pub fn ensure_profile(
    store: &dyn DocumentStore,
    identity: &SessionIdentity,
    now: DateTime<Utc>,
) -> AppResult<UserProfile> {
    if let Some(existing) = get_profile(store, &identity.uid)? {
        return Ok(existing);
    }

    let profile = UserProfile {
        name: identity.display_name.clone().unwrap_or_default(),
        email: identity.email.clone().unwrap_or_default(),
        gender: String::new(),
        birthday: String::new(),
        occupation: String::new(),
        profile_picture: String::new(),
        created_at: now,
        achievements: Vec::new(),
        titles: Vec::new(),
        selected_title: String::new(),
        counters: CounterBag::default(),
    };
    store.set(&profile_path(&identity.uid), &to_document(&profile)?)?;
    tracing::info!(uid = %identity.uid, "profile created");
    Ok(profile)
}

pub fn profile_view(profile: UserProfile, settings: &AppSettings) -> ProfileView {
    let per_level = settings.exp_per_level.max(1);
    let exp = profile.counters.exp;
    let display_title = if profile.selected_title.is_empty() {
        None
    } else {
        Some(
            achievements::title_name(&profile.selected_title)
                .map(ToString::to_string)
                .unwrap_or_else(|| profile.selected_title.clone()),
        )
    };
    ProfileView {
        level: exp.div_euclid(per_level),
        xp_label: format!("{}/{}XP", exp.rem_euclid(per_level), per_level),
        display_title,
        profile,
    }
}

pub fn picture_extension(file_name: &str) -> AppResult<String> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    if PICTURE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::Validation("Only JPG, PNG, or WebP files are allowed.".to_string()))
    }
}

fn decode_picture(upload: &ProfilePictureUpload) -> AppResult<Vec<u8>> {
    let raw = match upload.data.find("base64,") {
        Some(index) => &upload.data[index + "base64,".len()..],
        None => upload.data.as_str(),
    };
    Ok(base64::engine::general_purpose::STANDARD.decode(raw.trim())?)
}

/// Validates locally, uploads the picture (overwriting `{uid}.{ext}`) and
/// merges the editable fields.
pub fn save_profile(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    payload: SaveProfilePayload,
) -> AppResult<UserProfile> {
    if payload.name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Name must be at most {} characters.",
            MAX_NAME_CHARS
        )));
    }
    let upload = match &payload.picture {
        Some(picture) => Some((picture_extension(&picture.file_name)?, decode_picture(picture)?)),
        None => None,
    };

    let Some(existing) = get_profile(store, uid)? else {
        return Err(AppError::NotFound(format!("profile for {}", uid)));
    };

    let mut picture_url = existing.profile_picture.clone();
    if let Some((extension, bytes)) = upload {
        let object_name = format!("{}.{}", uid, extension);
        let content_type = match extension.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            _ => "image/jpeg",
        };
        blobs.upload(&settings.profile_picture_bucket, &object_name, &bytes, content_type, true)?;
        picture_url = blobs.public_url(&settings.profile_picture_bucket, &object_name);
    }

    store.merge(
        &profile_path(uid),
        &json!({
            "name": payload.name,
            "gender": payload.gender,
            "birthday": payload.birthday,
            "occupation": payload.occupation,
            "profilePicture": picture_url,
        }),
    )?;
    get_profile(store, uid)?.ok_or_else(|| AppError::NotFound(format!("profile for {}", uid)))
}

pub fn select_title(store: &dyn DocumentStore, uid: &str, title_id: &str) -> AppResult<()> {
    let Some(profile) = get_profile(store, uid)? else {
        return Err(AppError::NotFound(format!("profile for {}", uid)));
    };
    if !profile.titles.iter().any(|id| id == title_id) {
        return Err(AppError::Validation(format!("title {} is not unlocked", title_id)));
    }
    store.merge(&profile_path(uid), &json!({ "selectedTitle": title_id }))
}

/// Read-modify-write of numeric profile counters. Two callers racing on the
/// same profile can lose an update; nothing here serializes them.
pub fn bump_counters(store: &dyn DocumentStore, uid: &str, deltas: &[(&str, i64)]) -> AppResult<Option<Value>> {
    let path = profile_path(uid);
    let Some(current) = store.get(&path)? else {
        tracing::warn!(uid, "profile missing; counter update skipped");
        return Ok(None);
    };

    let mut patch = Map::new();
    for (field, delta) in deltas {
        let value = current.get(*field).and_then(Value::as_i64).unwrap_or(0) + delta;
        patch.insert((*field).to_string(), json!(value));
    }
    let patch = Value::Object(patch);
    store.merge(&path, &patch)?;
    Ok(Some(patch))
}

pub fn set_flags(store: &dyn DocumentStore, uid: &str, flags: &[(&str, bool)]) -> AppResult<()> {
    let mut patch = Map::new();
    for (field, value) in flags {
        patch.insert((*field).to_string(), json!(value));
    }
    store.merge(&profile_path(uid), &Value::Object(patch))
}

/// Adjusts experience and records the change in the xp history feed.
pub fn grant_exp(
    store: &dyn DocumentStore,
    uid: &str,
    delta: i64,
    extra: &[(&str, i64)],
    reason: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<i64>> {
    let mut deltas = vec![("exp", delta)];
    deltas.extend_from_slice(extra);
    let Some(patch) = bump_counters(store, uid, &deltas)? else {
        return Ok(None);
    };
    let exp = patch.get("exp").and_then(Value::as_i64).unwrap_or_default();

    let entry = json!({
        "xpAdded": delta,
        "reason": reason,
        "timestamp": now,
    });
    if let Err(error) = store.add(&xp_history_path(uid), &entry) {
        tracing::warn!(uid, error = %error, "failed to record xp history");
    }
    tracing::info!(uid, delta, exp, reason, "experience adjusted");
    Ok(Some(exp))
}

/// Newest first, at most `limit` entries.
pub fn xp_history(store: &dyn DocumentStore, uid: &str, limit: usize) -> AppResult<Vec<XpHistoryEntry>> {
    let mut entries: Vec<XpHistoryEntry> = list_docs(store, &xp_history_path(uid), None)?;
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);
    Ok(entries)
}

pub fn xp_history_entry_path(uid: &str, entry_id: &str) -> DocPath {
    xp_history_path(uid).child(entry_id)
}
