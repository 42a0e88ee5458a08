pub mod achievements;
pub mod board;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod flashcards;
pub mod goals;
pub mod hub;
pub mod local_store;
pub mod models;
pub mod notifications;
pub mod profile;
pub mod session;
pub mod store;
pub mod tasks;
pub mod views;
pub mod whiteboard;

use crate::achievements::AchievementStatus;
use crate::hub::HubCore;
use crate::models::{
    AppSettings, BoardSnapshot, BooleanResponse, CalendarEntry, CreateTaskPayload, Flashcard, FlashcardDeck,
    FlashcardTopic, GoalCategory, GoalDraft, GoalSaveReport, ListTasksFilter, NotificationFeed, NotificationKind,
    ProfileView, ReviewResult, SaveCardPayload, SaveDeckPayload, SaveProfilePayload, SaveWhiteboardPayload,
    SessionIdentity, SmartGoalSet, TaskRecord, UpdateTaskPayload, UserProfile, WhiteboardRecord, XpHistoryEntry,
};
use crate::views::{ActiveView, ViewData};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Handle the front end holds; every command below takes it.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<HubCore>,
    background: Arc<Vec<JoinHandle<()>>>,
}

impl AppState {
    pub fn shutdown(&self) {
        for task in self.background.iter() {
            task.abort();
        }
    }
}

pub fn sign_in(state: &AppState, identity: SessionIdentity) -> Result<UserProfile, String> {
    state.hub.sign_in(identity).map_err(to_client_error)
}

pub fn sign_out(state: &AppState) -> Result<BooleanResponse, String> {
    state.hub.sign_out().map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn get_settings(state: &AppState) -> AppSettings {
    state.hub.settings()
}

pub fn update_settings(state: &AppState, patch: serde_json::Value) -> Result<AppSettings, String> {
    state.hub.update_settings(patch).map_err(to_client_error)
}

pub fn create_task(state: &AppState, payload: CreateTaskPayload) -> Result<Option<String>, String> {
    state.hub.create_task(payload).map_err(to_client_error)
}

pub fn list_tasks(state: &AppState, filter: ListTasksFilter) -> Result<Vec<TaskRecord>, String> {
    state.hub.list_tasks(filter).map_err(to_client_error)
}

pub fn update_task(state: &AppState, task_id: String, payload: UpdateTaskPayload) -> Result<BooleanResponse, String> {
    state.hub.update_task(&task_id, payload).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn start_task(state: &AppState, task_id: String) -> Result<BooleanResponse, String> {
    state.hub.start_task(&task_id).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn complete_task(state: &AppState, task_id: String) -> Result<Option<i64>, String> {
    state.hub.complete_task(&task_id).map_err(to_client_error)
}

pub fn delete_task(state: &AppState, task_id: String) -> Result<BooleanResponse, String> {
    state.hub.delete_task(&task_id).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn toggle_checklist_item(state: &AppState, task_id: String, index: usize) -> Result<BooleanResponse, String> {
    state
        .hub
        .toggle_checklist_item(&task_id, index)
        .map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn move_checklist_item(
    state: &AppState,
    task_id: String,
    from: usize,
    to: usize,
) -> Result<BooleanResponse, String> {
    state
        .hub
        .move_checklist_item(&task_id, from, to)
        .map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn get_board(state: &AppState) -> BoardSnapshot {
    state.hub.board()
}

pub fn get_motivational_message(state: &AppState) -> String {
    state.hub.motivational_message().to_string()
}

pub fn get_notifications(state: &AppState) -> Result<NotificationFeed, String> {
    state.hub.notification_feed().map_err(to_client_error)
}

pub fn open_notifications(state: &AppState) -> Result<NotificationFeed, String> {
    state.hub.open_notifications().map_err(to_client_error)
}

pub fn delete_notification(state: &AppState, kind: NotificationKind, id: String) -> Result<BooleanResponse, String> {
    state.hub.delete_notification(kind, &id).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn clear_notifications(state: &AppState) -> Result<usize, String> {
    state.hub.clear_notifications().map_err(to_client_error)
}

pub fn get_calendar_highlights(state: &AppState) -> Result<Vec<NaiveDate>, String> {
    state.hub.calendar_highlights().map_err(to_client_error)
}

pub fn get_tasks_on_date(state: &AppState, date: NaiveDate) -> Result<Vec<CalendarEntry>, String> {
    state.hub.tasks_on_date(date).map_err(to_client_error)
}

pub fn get_profile(state: &AppState) -> Result<Option<ProfileView>, String> {
    state.hub.profile_view().map_err(to_client_error)
}

pub fn save_profile(state: &AppState, payload: SaveProfilePayload) -> Result<Option<UserProfile>, String> {
    state.hub.save_profile(payload).map_err(to_client_error)
}

pub fn select_title(state: &AppState, title_id: String) -> Result<BooleanResponse, String> {
    state.hub.select_title(&title_id).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn list_achievements(state: &AppState) -> Result<Vec<AchievementStatus>, String> {
    state.hub.achievements().map_err(to_client_error)
}

pub fn list_xp_history(state: &AppState) -> Result<Vec<XpHistoryEntry>, String> {
    state.hub.xp_history().map_err(to_client_error)
}

pub fn create_topic(state: &AppState, title: String) -> Result<Option<String>, String> {
    state.hub.create_topic(&title).map_err(to_client_error)
}

pub fn list_topics(state: &AppState) -> Result<Vec<FlashcardTopic>, String> {
    state.hub.list_topics().map_err(to_client_error)
}

pub fn rename_topic(state: &AppState, topic_id: String, title: String) -> Result<BooleanResponse, String> {
    state.hub.rename_topic(&topic_id, &title).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn delete_topic(state: &AppState, topic_id: String) -> Result<BooleanResponse, String> {
    state.hub.delete_topic(&topic_id).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn create_deck(state: &AppState, topic_id: String, payload: SaveDeckPayload) -> Result<Option<String>, String> {
    state.hub.create_deck(&topic_id, payload).map_err(to_client_error)
}

pub fn list_decks(state: &AppState, topic_id: String) -> Result<Vec<FlashcardDeck>, String> {
    state.hub.list_decks(&topic_id).map_err(to_client_error)
}

pub fn update_deck(
    state: &AppState,
    topic_id: String,
    deck_id: String,
    payload: SaveDeckPayload,
) -> Result<BooleanResponse, String> {
    state
        .hub
        .update_deck(&topic_id, &deck_id, payload)
        .map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn delete_deck(state: &AppState, topic_id: String, deck_id: String) -> Result<BooleanResponse, String> {
    state.hub.delete_deck(&topic_id, &deck_id).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn add_card(
    state: &AppState,
    topic_id: String,
    deck_id: String,
    payload: SaveCardPayload,
) -> Result<Option<String>, String> {
    state
        .hub
        .add_card(&topic_id, &deck_id, payload)
        .map_err(to_client_error)
}

pub fn list_cards(state: &AppState, topic_id: String, deck_id: String) -> Result<Vec<Flashcard>, String> {
    state.hub.list_cards(&topic_id, &deck_id).map_err(to_client_error)
}

pub fn update_card(
    state: &AppState,
    topic_id: String,
    deck_id: String,
    card_id: String,
    payload: SaveCardPayload,
) -> Result<BooleanResponse, String> {
    state
        .hub
        .update_card(&topic_id, &deck_id, &card_id, payload)
        .map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn delete_card(
    state: &AppState,
    topic_id: String,
    deck_id: String,
    card_id: String,
) -> Result<BooleanResponse, String> {
    state
        .hub
        .delete_card(&topic_id, &deck_id, &card_id)
        .map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn start_review(state: &AppState, topic_id: String, deck_id: String) -> Result<Vec<Flashcard>, String> {
    state.hub.start_review(&topic_id, &deck_id).map_err(to_client_error)
}

pub fn finish_review(state: &AppState, topic_id: String, result: ReviewResult) -> Result<BooleanResponse, String> {
    state.hub.finish_review(&topic_id, result).map_err(to_client_error)?;
    Ok(BooleanResponse { success: true })
}

pub fn load_goals(state: &AppState) -> Result<SmartGoalSet, String> {
    state.hub.load_goals().map_err(to_client_error)
}

pub fn add_goal(state: &AppState, category: GoalCategory, draft: GoalDraft) -> Result<Option<GoalSaveReport>, String> {
    state.hub.add_goal(category, draft).map_err(to_client_error)
}

pub fn edit_goal(
    state: &AppState,
    category: GoalCategory,
    index: usize,
    draft: GoalDraft,
) -> Result<Option<GoalSaveReport>, String> {
    state.hub.edit_goal(category, index, draft).map_err(to_client_error)
}

pub fn delete_goal(state: &AppState, category: GoalCategory, index: usize) -> Result<Option<GoalSaveReport>, String> {
    state.hub.delete_goal(category, index).map_err(to_client_error)
}

pub fn toggle_goal_completed(state: &AppState, index: usize) -> Result<Option<GoalSaveReport>, String> {
    state.hub.toggle_goal_completed(index).map_err(to_client_error)
}

pub fn save_whiteboard(state: &AppState, payload: SaveWhiteboardPayload) -> Result<Option<WhiteboardRecord>, String> {
    state.hub.save_whiteboard(payload).map_err(to_client_error)
}

pub fn list_whiteboards(state: &AppState) -> Result<Vec<WhiteboardRecord>, String> {
    state.hub.list_whiteboards().map_err(to_client_error)
}

pub fn open_view(state: &AppState, view: ActiveView) -> Result<ViewData, String> {
    state.hub.open_view(&view).map_err(to_client_error)
}

/// Builds the hub under `app_data_dir` and starts the session binder and
/// board ticker. Must be called from inside a tokio runtime.
pub fn run(app_data_dir: &Path) -> Result<AppState, String> {
    if tokio::runtime::Handle::try_current().is_err() {
        return Err("run must be called from within a tokio runtime".to_string());
    }
    std::fs::create_dir_all(app_data_dir).map_err(|error| error.to_string())?;
    init_tracing(app_data_dir)?;

    let hub = HubCore::new(app_data_dir.to_path_buf()).map_err(to_client_error)?;
    let background = vec![hub.start_session_binder(), hub.start_ticker()];
    tracing::info!(tick_interval_ms = hub.settings().tick_interval_ms, "background tasks started");

    Ok(AppState {
        hub,
        background: Arc::new(background),
    })
}

fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "hub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    if LOG_GUARD.set(guard).is_err() {
        // A subscriber is already installed for this process.
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    let message = error.to_string();
    tracing::warn!(error = %message, "command failed");
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_a_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(run(dir.path()).is_err());
    }

    #[tokio::test]
    async fn commands_surface_validation_messages_as_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = run(dir.path()).expect("run");
        sign_in(
            &state,
            SessionIdentity {
                uid: "u1".to_string(),
                email: None,
                display_name: Some("Ada".to_string()),
            },
        )
        .expect("sign in");

        let error = create_task(&state, CreateTaskPayload::default()).expect_err("blank task");
        assert_eq!(error, "VALIDATION: Task title is required.");
        assert!(dir.path().join("logs").exists());
        assert!(get_profile(&state).expect("profile").is_some());
        state.shutdown();
    }
}
