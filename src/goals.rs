use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, Goal, GoalCategory, GoalDraft, GoalSaveReport, SmartGoalSet};
use crate::store::{BlobStore, DocPath, DocumentStore};
use chrono::{DateTime, Utc};
use serde_json::json;

pub const DEFAULT_TEXT_COLOR: &str = "#000000";
pub const DEFAULT_BG_COLOR: &str = "#ffffff";

pub fn goals_path(uid: &str) -> DocPath {
    DocPath::user(uid).child("smartGoals").child("userGoals")
}

pub fn backup_object_name(now: DateTime<Utc>) -> String {
    format!("smart-goals-backup-{}.json", now.timestamp_millis())
}

/// Missing record reads as five empty lists.
pub fn load_goals(store: &dyn DocumentStore, uid: &str) -> AppResult<SmartGoalSet> {
    let Some(document) = store.get(&goals_path(uid))? else {
        return Ok(SmartGoalSet::default());
    };
    match document.get("goals") {
        Some(goals) => Ok(serde_json::from_value(goals.clone())?),
        None => Ok(SmartGoalSet::default()),
    }
}

/// Time-bound goals carry their deadline as RFC 3339 text; every other
/// category needs non-blank text. Relevant goals start unchecked.
pub fn goal_from_draft(category: GoalCategory, draft: &GoalDraft, now: DateTime<Utc>) -> AppResult<Goal> {
    let goal = match category {
        GoalCategory::TimeBound => draft
            .due_at
            .map(|due_at| due_at.to_rfc3339())
            .ok_or_else(|| AppError::Validation("Please pick a date and time.".to_string()))?,
        _ => {
            let text = draft.text.as_deref().map(str::trim).unwrap_or_default();
            if text.is_empty() {
                return Err(AppError::Validation("Goal text is required.".to_string()));
            }
            text.to_string()
        }
    };
    Ok(Goal {
        goal,
        text_color: color_or(draft.text_color.as_deref(), DEFAULT_TEXT_COLOR),
        bg_color: color_or(draft.bg_color.as_deref(), DEFAULT_BG_COLOR),
        created_at: now,
        completed: (category == GoalCategory::Relevant).then_some(false),
    })
}

fn color_or(color: Option<&str>, fallback: &str) -> String {
    color
        .map(str::trim)
        .filter(|color| !color.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Writes the whole set to the database, then mirrors it to blob storage.
///
/// A database failure is returned and the mirror is skipped. A mirror
/// failure after a successful database write is logged and reported as
/// `backup_object: None`; the database copy is what the next load sees.
pub fn save_goals(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    goals: SmartGoalSet,
    now: DateTime<Utc>,
) -> AppResult<GoalSaveReport> {
    store.set(&goals_path(uid), &json!({ "goals": goals }))?;

    let name = backup_object_name(now);
    let mirrored = serde_json::to_vec_pretty(&goals)
        .map_err(AppError::from)
        .and_then(|bytes| blobs.upload(&settings.goal_backup_bucket, &name, &bytes, "application/json", false));
    let backup_object = match mirrored {
        Ok(()) => Some(name),
        Err(error) => {
            tracing::warn!(uid, object = %name, error = %error, "goal backup upload failed; database copy kept");
            None
        }
    };

    tracing::info!(uid, goals = goals.len(), backup = backup_object.is_some(), "smart goals saved");
    Ok(GoalSaveReport { goals, backup_object })
}

pub fn add_goal(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    category: GoalCategory,
    draft: &GoalDraft,
    now: DateTime<Utc>,
) -> AppResult<GoalSaveReport> {
    let goal = goal_from_draft(category, draft, now)?;
    let mut goals = load_goals(store, uid)?;
    goals.list_mut(category).push(goal);
    save_goals(store, blobs, settings, uid, goals, now)
}

#[allow(clippy::too_many_arguments)]
pub fn edit_goal(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    category: GoalCategory,
    index: usize,
    draft: &GoalDraft,
    now: DateTime<Utc>,
) -> AppResult<GoalSaveReport> {
    let replacement = goal_from_draft(category, draft, now)?;
    let mut goals = load_goals(store, uid)?;
    let existing = goal_at(&mut goals, category, index)?;
    existing.goal = replacement.goal;
    existing.text_color = replacement.text_color;
    existing.bg_color = replacement.bg_color;
    save_goals(store, blobs, settings, uid, goals, now)
}

pub fn delete_goal(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    category: GoalCategory,
    index: usize,
    now: DateTime<Utc>,
) -> AppResult<GoalSaveReport> {
    let mut goals = load_goals(store, uid)?;
    goal_at(&mut goals, category, index)?;
    goals.list_mut(category).remove(index);
    save_goals(store, blobs, settings, uid, goals, now)
}

/// Only relevant goals carry a completion checkbox.
pub fn toggle_goal_completed(
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    settings: &AppSettings,
    uid: &str,
    index: usize,
    now: DateTime<Utc>,
) -> AppResult<GoalSaveReport> {
    let mut goals = load_goals(store, uid)?;
    let goal = goal_at(&mut goals, GoalCategory::Relevant, index)?;
    goal.completed = Some(!goal.completed.unwrap_or(false));
    save_goals(store, blobs, settings, uid, goals, now)
}

fn goal_at(goals: &mut SmartGoalSet, category: GoalCategory, index: usize) -> AppResult<&mut Goal> {
    goals
        .list_mut(category)
        .get_mut(index)
        .ok_or_else(|| AppError::NotFound(format!("goal {:?}[{}]", category, index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::store::blob::FsBlobStore;
    use crate::store::Filter;
    use chrono::{Duration, TimeZone};
    use serde_json::Value;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).single().expect("valid time")
    }

    fn setup() -> (tempfile::TempDir, Database, FsBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("hub.sqlite")).expect("db");
        let blobs = FsBlobStore::new(&dir.path().join("blobs"), None).expect("blobs");
        (dir, db, blobs)
    }

    fn text(value: &str) -> GoalDraft {
        GoalDraft {
            text: Some(value.to_string()),
            ..GoalDraft::default()
        }
    }

    struct RejectingDocs;

    impl DocumentStore for RejectingDocs {
        fn get(&self, _path: &DocPath) -> AppResult<Option<Value>> {
            Ok(None)
        }

        fn set(&self, _path: &DocPath, _value: &Value) -> AppResult<()> {
            Err(AppError::Storage("database unavailable".to_string()))
        }

        fn merge(&self, _path: &DocPath, _patch: &Value) -> AppResult<()> {
            Err(AppError::Storage("database unavailable".to_string()))
        }

        fn delete(&self, _path: &DocPath) -> AppResult<()> {
            Ok(())
        }

        fn list(&self, _collection: &DocPath, _filter: Option<&Filter>) -> AppResult<Vec<(String, Value)>> {
            Ok(Vec::new())
        }

        fn batch_delete(&self, _paths: &[DocPath]) -> AppResult<()> {
            Ok(())
        }
    }

    struct RejectingBlobs;

    impl BlobStore for RejectingBlobs {
        fn upload(&self, _bucket: &str, _name: &str, _bytes: &[u8], _content_type: &str, _upsert: bool) -> AppResult<()> {
            Err(AppError::Storage("bucket unavailable".to_string()))
        }

        fn public_url(&self, bucket: &str, name: &str) -> String {
            format!("mem://{}/{}", bucket, name)
        }

        fn download(&self, bucket: &str, name: &str) -> AppResult<Vec<u8>> {
            Err(AppError::NotFound(format!("{}/{}", bucket, name)))
        }

        fn download_url(&self, url: &str) -> AppResult<Vec<u8>> {
            Err(AppError::NotFound(url.to_string()))
        }

        fn list(&self, _bucket: &str) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn drafts_apply_category_rules_and_default_colors() {
        let now = now();
        let specific = goal_from_draft(GoalCategory::Specific, &text(" Run 5k "), now).expect("specific");
        assert_eq!(specific.goal, "Run 5k");
        assert_eq!(specific.text_color, DEFAULT_TEXT_COLOR);
        assert_eq!(specific.bg_color, DEFAULT_BG_COLOR);
        assert_eq!(specific.completed, None);

        let relevant = goal_from_draft(GoalCategory::Relevant, &text("Health"), now).expect("relevant");
        assert_eq!(relevant.completed, Some(false));

        let due = now + Duration::days(30);
        let deadline = GoalDraft {
            due_at: Some(due),
            bg_color: Some("#ffeeaa".to_string()),
            ..GoalDraft::default()
        };
        let time_bound = goal_from_draft(GoalCategory::TimeBound, &deadline, now).expect("time bound");
        assert_eq!(time_bound.goal, due.to_rfc3339());
        assert_eq!(time_bound.bg_color, "#ffeeaa");

        assert!(goal_from_draft(GoalCategory::TimeBound, &text("soon"), now).is_err());
        assert!(goal_from_draft(GoalCategory::Measurable, &GoalDraft::default(), now).is_err());
    }

    #[test]
    fn every_mutation_writes_database_and_backup_with_the_same_structure() {
        let (_dir, db, blobs) = setup();
        let settings = AppSettings::default();
        let start = now();

        add_goal(&db, &blobs, &settings, "u1", GoalCategory::Specific, &text("Run 5k"), start).expect("add");
        add_goal(
            &db,
            &blobs,
            &settings,
            "u1",
            GoalCategory::Relevant,
            &text("Health"),
            start + Duration::seconds(1),
        )
        .expect("add");
        let report = edit_goal(
            &db,
            &blobs,
            &settings,
            "u1",
            GoalCategory::Specific,
            0,
            &text("Run 10k"),
            start + Duration::seconds(2),
        )
        .expect("edit");

        let object = report.backup_object.expect("backup written");
        assert_eq!(object, format!("smart-goals-backup-{}.json", (start + Duration::seconds(2)).timestamp_millis()));
        let mirrored: SmartGoalSet =
            serde_json::from_slice(&blobs.download("smart-goals-backups", &object).expect("download")).expect("parse");
        let stored = load_goals(&db, "u1").expect("load");

        assert_eq!(mirrored, stored);
        assert_eq!(stored, report.goals);
        assert_eq!(stored.specific[0].goal, "Run 10k");
        assert_eq!(stored.len(), 2);
        assert_eq!(blobs.list("smart-goals-backups").expect("list").len(), 3);

        toggle_goal_completed(&db, &blobs, &settings, "u1", 0, start + Duration::seconds(3)).expect("toggle");
        assert_eq!(load_goals(&db, "u1").expect("load").relevant[0].completed, Some(true));

        delete_goal(&db, &blobs, &settings, "u1", GoalCategory::Specific, 0, start + Duration::seconds(4))
            .expect("delete");
        assert!(load_goals(&db, "u1").expect("load").specific.is_empty());
        assert!(delete_goal(&db, &blobs, &settings, "u1", GoalCategory::Specific, 0, start).is_err());
    }

    #[test]
    fn database_failure_skips_the_backup() {
        let (_dir, _db, blobs) = setup();
        let error = add_goal(
            &RejectingDocs,
            &blobs,
            &AppSettings::default(),
            "u1",
            GoalCategory::Achievable,
            &text("Read"),
            now(),
        )
        .expect_err("database rejected");
        assert!(matches!(error, AppError::Storage(_)));
        assert!(blobs.list("smart-goals-backups").expect("list").is_empty());
    }

    #[test]
    fn backup_failure_keeps_the_database_write() {
        let (_dir, db, _blobs) = setup();
        let report = add_goal(
            &db,
            &RejectingBlobs,
            &AppSettings::default(),
            "u1",
            GoalCategory::Achievable,
            &text("Read"),
            now(),
        )
        .expect("database write succeeds");
        assert!(report.backup_object.is_none());
        assert_eq!(load_goals(&db, "u1").expect("load").achievable[0].goal, "Read");
    }
}
