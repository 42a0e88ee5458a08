use crate::achievements;
use crate::board;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AppSettings, ChecklistItem, CreateTaskPayload, ListTasksFilter, TaskRecord, TaskStatus, UpdateTaskPayload,
};
use crate::profile;
use crate::store::{list_docs, read_doc, to_document, DocPath, DocumentStore, Filter};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

pub const COMPLETION_REASON: &str = "task_completed";
pub const OVERDUE_REASON: &str = "task_overdue";

pub fn tasks_collection(uid: &str) -> DocPath {
    DocPath::user(uid).child("todolist")
}

pub fn task_path(uid: &str, task_id: &str) -> DocPath {
    tasks_collection(uid).child(task_id)
}

/// Comma-separated input, trimmed, blanks dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.iter().flat_map(|tag| parse_tags(tag)).collect()
}

fn clean_checklist(items: Vec<ChecklistItem>) -> Vec<ChecklistItem> {
    items
        .into_iter()
        .filter_map(|item| {
            let text = item.text.trim().to_string();
            (!text.is_empty()).then_some(ChecklistItem {
                text,
                checked: item.checked,
            })
        })
        .collect()
}

/// Local validation, run before anything touches storage.
pub fn validate_new_task(payload: &CreateTaskPayload, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("Task title is required.".to_string()));
    }
    let Some(due_date) = payload.due_date else {
        return Err(AppError::Validation("Task due date and time are required.".to_string()));
    };
    if due_date < now {
        return Err(AppError::Validation("Task due date cannot be in the past.".to_string()));
    }
    Ok(due_date)
}

pub fn create_task(
    store: &dyn DocumentStore,
    uid: &str,
    payload: CreateTaskPayload,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let due_date = validate_new_task(&payload, now)?;
    let id = Uuid::new_v4().simple().to_string();
    let record = TaskRecord {
        id: id.clone(),
        title: payload.title.trim().to_string(),
        description: payload.description.trim().to_string(),
        tags: clean_tags(payload.tags),
        due_date,
        checklist: clean_checklist(payload.checklist),
        status: TaskStatus::Pending,
        priority: payload.priority,
        user_id: uid.to_string(),
        created_at: now,
        completed_time: None,
        exp_deducted: false,
    };
    store.set(&task_path(uid, &id), &to_document(&record)?)?;
    tracing::info!(uid, task_id = %id, "task created");
    Ok(id)
}

pub fn get_task(store: &dyn DocumentStore, uid: &str, task_id: &str) -> AppResult<Option<TaskRecord>> {
    read_doc(store, &task_path(uid, task_id))
}

/// Owner equality query, optionally narrowed to one status.
pub fn list_tasks(store: &dyn DocumentStore, uid: &str, filter: &ListTasksFilter) -> AppResult<Vec<TaskRecord>> {
    let owner = Filter::eq("userId", uid);
    let mut tasks: Vec<TaskRecord> = list_docs(store, &tasks_collection(uid), Some(&owner))?;
    if let Some(status) = filter.status {
        tasks.retain(|task| task.status == status);
    }
    Ok(tasks)
}

pub fn update_task(store: &dyn DocumentStore, uid: &str, task_id: &str, update: UpdateTaskPayload) -> AppResult<()> {
    if matches!(&update.title, Some(title) if title.trim().is_empty()) {
        return Err(AppError::Validation("Task title is required.".to_string()));
    }
    let update = UpdateTaskPayload {
        title: update.title.map(|title| title.trim().to_string()),
        description: update.description,
        tags: update.tags.map(clean_tags),
        priority: update.priority,
        checklist: update.checklist.map(clean_checklist),
    };
    store.merge(&task_path(uid, task_id), &to_document(&update)?)
}

pub fn move_to_in_progress(store: &dyn DocumentStore, uid: &str, task_id: &str) -> AppResult<()> {
    store.merge(
        &task_path(uid, task_id),
        &json!({ "status": TaskStatus::InProgress.as_str() }),
    )?;
    tracing::info!(uid, task_id, "task moved to in progress");
    Ok(())
}

/// Marks the task completed, then grants experience through a separate
/// read-modify-write of the profile. Nothing stops a second call from
/// granting again.
pub fn complete_task(
    store: &dyn DocumentStore,
    settings: &AppSettings,
    uid: &str,
    task_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<i64>> {
    store.merge(
        &task_path(uid, task_id),
        &json!({
            "status": TaskStatus::Completed.as_str(),
            "completedTime": now,
        }),
    )?;
    tracing::info!(uid, task_id, "task completed");

    let exp = profile::grant_exp(
        store,
        uid,
        settings.completion_exp,
        &[("tasksCompleted", 1)],
        COMPLETION_REASON,
        now,
    )?;
    if exp.is_some() {
        achievements::evaluate_and_store(store, uid)?;
    }
    Ok(exp)
}

pub fn delete_task(store: &dyn DocumentStore, uid: &str, task_id: &str) -> AppResult<()> {
    store.delete(&task_path(uid, task_id))?;
    tracing::info!(uid, task_id, "task deleted");
    Ok(())
}

pub fn toggle_checklist_item(
    store: &dyn DocumentStore,
    uid: &str,
    task_id: &str,
    index: usize,
) -> AppResult<Vec<ChecklistItem>> {
    let mut checklist = load_checklist(store, uid, task_id)?;
    let Some(item) = checklist.get_mut(index) else {
        return Err(AppError::Validation(format!("checklist item {} does not exist", index)));
    };
    item.checked = !item.checked;
    store.merge(&task_path(uid, task_id), &json!({ "checklist": checklist }))?;
    Ok(checklist)
}

pub fn move_checklist_item(
    store: &dyn DocumentStore,
    uid: &str,
    task_id: &str,
    from: usize,
    to: usize,
) -> AppResult<Vec<ChecklistItem>> {
    let mut checklist = load_checklist(store, uid, task_id)?;
    if from >= checklist.len() || to >= checklist.len() {
        return Err(AppError::Validation("checklist position out of range".to_string()));
    }
    let item = checklist.remove(from);
    checklist.insert(to, item);
    store.merge(&task_path(uid, task_id), &json!({ "checklist": checklist }))?;
    Ok(checklist)
}

fn load_checklist(store: &dyn DocumentStore, uid: &str, task_id: &str) -> AppResult<Vec<ChecklistItem>> {
    get_task(store, uid, task_id)?
        .map(|task| task.checklist)
        .ok_or_else(|| AppError::NotFound(format!("task {}", task_id)))
}

/// Deducts the overdue penalty once per task. The persisted `expDeducted`
/// flag covers later passes; `in_flight` covers passes that overlap this one.
pub fn apply_overdue_penalties(
    store: &dyn DocumentStore,
    settings: &AppSettings,
    uid: &str,
    tasks: &[TaskRecord],
    now: DateTime<Utc>,
    in_flight: &Mutex<HashSet<String>>,
) -> AppResult<Vec<String>> {
    let mut penalized = Vec::new();
    for task in tasks {
        if task.exp_deducted || !board::is_overdue(task, now) {
            continue;
        }
        {
            let mut claimed = in_flight
                .lock()
                .map_err(|_| AppError::Internal("penalty set poisoned".to_string()))?;
            if !claimed.insert(task.id.clone()) {
                continue;
            }
        }

        let outcome = penalize(store, settings, uid, task, now);
        if let Ok(mut claimed) = in_flight.lock() {
            claimed.remove(&task.id);
        }
        if outcome? {
            penalized.push(task.id.clone());
        }
    }
    Ok(penalized)
}

fn penalize(
    store: &dyn DocumentStore,
    settings: &AppSettings,
    uid: &str,
    task: &TaskRecord,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    // The list passed in may be stale; the stored flag decides.
    let Some(current) = get_task(store, uid, &task.id)? else {
        return Ok(false);
    };
    if current.exp_deducted || !board::is_overdue(&current, now) {
        return Ok(false);
    }
    store.merge(&task_path(uid, &task.id), &json!({ "expDeducted": true }))?;
    profile::grant_exp(store, uid, -settings.overdue_penalty_exp, &[], OVERDUE_REASON, now)?;
    tracing::info!(uid, task_id = %task.id, "overdue penalty applied");
    Ok(true)
}
