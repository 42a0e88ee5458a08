use crate::achievements::{self, AchievementStatus};
use crate::board;
use crate::clock::{Clock, SystemClock};
use crate::config;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::flashcards;
use crate::goals;
use crate::local_store::LocalStore;
use crate::models::{
    AppSettings, BoardSnapshot, CalendarEntry, CreateTaskPayload, Flashcard, FlashcardDeck, FlashcardTopic,
    GoalCategory, GoalDraft, GoalSaveReport, ListTasksFilter, NotificationFeed, NotificationKind, ProfileView,
    ReviewResult, SaveCardPayload, SaveDeckPayload, SaveProfilePayload, SaveWhiteboardPayload, SessionIdentity,
    SmartGoalSet, TaskRecord, UpdateTaskPayload, UserProfile, WhiteboardRecord, XpHistoryEntry,
};
use crate::notifications;
use crate::profile;
use crate::session::SessionContext;
use crate::store::blob::FsBlobStore;
use crate::store::{DocPath, DocumentStore};
use crate::tasks;
use crate::views::{self, ActiveView, ViewData};
use crate::whiteboard;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

const DB_FILE: &str = "hub.sqlite";
const BLOB_DIR: &str = "blobs";
const LOCAL_STORE_FILE: &str = "local-storage.json";

/// Owns the collaborators and the per-user derived state. Every user-scoped
/// operation reads the identity from the session and quietly does nothing
/// when nobody is signed in.
pub struct HubCore {
    db: Arc<Database>,
    blobs: Arc<FsBlobStore>,
    session: SessionContext,
    local: LocalStore,
    clock: Arc<dyn Clock>,
    settings: RwLock<AppSettings>,
    bound_uid: Mutex<Option<String>>,
    tasks: Mutex<Vec<TaskRecord>>,
    board_tx: watch::Sender<BoardSnapshot>,
    penalties_in_flight: Mutex<HashSet<String>>,
    app_data_dir: PathBuf,
}

impl HubCore {
    pub fn new(app_data_dir: PathBuf) -> AppResult<Arc<Self>> {
        Self::with_clock(app_data_dir, Arc::new(SystemClock))
    }

    pub fn with_clock(app_data_dir: PathBuf, clock: Arc<dyn Clock>) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&app_data_dir.join(DB_FILE))?);
        let settings = config::bootstrap_settings(&db, &app_data_dir)?;
        let blobs = Arc::new(FsBlobStore::new(
            &app_data_dir.join(BLOB_DIR),
            settings.public_base_url.as_deref(),
        )?);
        let (board_tx, _) = watch::channel(BoardSnapshot::default());

        tracing::info!(data_dir = %app_data_dir.display(), "hub core ready");
        Ok(Arc::new(Self {
            db,
            blobs,
            session: SessionContext::new(),
            local: LocalStore::new(&app_data_dir.join(LOCAL_STORE_FILE)),
            clock,
            settings: RwLock::new(settings),
            bound_uid: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            board_tx,
            penalties_in_flight: Mutex::new(HashSet::new()),
            app_data_dir,
        }))
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn settings(&self) -> AppSettings {
        self.settings
            .read()
            .map(|settings| settings.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn update_settings(&self, patch: Value) -> AppResult<AppSettings> {
        let updated = self.db.update_settings(patch)?;
        let mut settings = self
            .settings
            .write()
            .map_err(|_| AppError::Internal("settings lock poisoned".to_string()))?;
        *settings = updated.clone();
        Ok(updated)
    }

    fn uid(&self) -> Option<String> {
        self.session.uid()
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> AppResult<MutexGuard<'a, T>> {
        mutex
            .lock()
            .map_err(|_| AppError::Internal(format!("{} lock poisoned", what)))
    }

    // Session binding

    /// Publishes the identity and binds it right away so the caller sees
    /// the profile; the binder task skips identities already bound.
    pub fn sign_in(&self, identity: SessionIdentity) -> AppResult<UserProfile> {
        self.session.sign_in(identity.clone());
        self.on_identity_changed(Some(identity.clone()))?;
        profile::get_profile(self.db.as_ref(), &identity.uid)?
            .ok_or_else(|| AppError::NotFound(format!("profile for {}", identity.uid)))
    }

    pub fn sign_out(&self) -> AppResult<()> {
        self.session.sign_out();
        self.on_identity_changed(None)
    }

    /// Re-derives all per-user state for a new identity, or clears it on
    /// sign-out. The binding lock is held throughout so a racing binder and
    /// direct caller never interleave.
    pub fn on_identity_changed(&self, identity: Option<SessionIdentity>) -> AppResult<()> {
        let mut bound = Self::lock(&self.bound_uid, "session binding")?;
        let next = identity.as_ref().map(|identity| identity.uid.clone());
        if *bound == next {
            return Ok(());
        }

        match identity {
            Some(identity) => {
                profile::ensure_profile(self.db.as_ref(), &identity, self.clock.now())?;
                achievements::evaluate_and_store(self.db.as_ref(), &identity.uid)?;
                self.refresh_for(Some(&identity.uid))?;
                self.tick_for(Some(&identity.uid))?;
                tracing::info!(uid = %identity.uid, "session bound");
            }
            None => {
                Self::lock(&self.tasks, "task cache")?.clear();
                Self::lock(&self.penalties_in_flight, "penalty set")?.clear();
                self.board_tx.send_replace(BoardSnapshot::default());
                tracing::info!("session cleared");
            }
        }
        *bound = next;
        Ok(())
    }

    pub fn start_session_binder(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut receiver = self.session.subscribe();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let identity = receiver.borrow_and_update().clone();
                let Some(hub) = weak.upgrade() else {
                    break;
                };
                match tokio::task::spawn_blocking(move || hub.on_identity_changed(identity)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => tracing::warn!(error = %error, "failed to bind session change"),
                    Err(error) => tracing::warn!(error = %error, "session binding task failed"),
                }
            }
        })
    }

    // Board and ticker

    /// Reloads the task cache for the bound identity.
    pub fn refresh_tasks(&self) -> AppResult<Vec<TaskRecord>> {
        let bound = Self::lock(&self.bound_uid, "session binding")?;
        self.refresh_for(bound.as_deref())
    }

    // Callers hold `bound_uid`.
    fn refresh_for(&self, uid: Option<&str>) -> AppResult<Vec<TaskRecord>> {
        let tasks = match uid {
            Some(uid) => tasks::list_tasks(self.db.as_ref(), uid, &ListTasksFilter::default())?,
            None => Vec::new(),
        };
        *Self::lock(&self.tasks, "task cache")? = tasks.clone();
        Ok(tasks)
    }

    fn cached_tasks(&self) -> AppResult<Vec<TaskRecord>> {
        Ok(Self::lock(&self.tasks, "task cache")?.clone())
    }

    /// One pass of the periodic recomputation: settle overdue penalties,
    /// then rebuild and publish the board. Holds the binding lock so a
    /// concurrent sign-out cannot be overwritten by the previous user's board.
    pub fn tick(&self) -> AppResult<BoardSnapshot> {
        let bound = Self::lock(&self.bound_uid, "session binding")?;
        self.tick_for(bound.as_deref())
    }

    // Callers hold `bound_uid`.
    fn tick_for(&self, uid: Option<&str>) -> AppResult<BoardSnapshot> {
        let now = self.clock.now();
        let mut cached = self.cached_tasks()?;

        if let Some(uid) = uid {
            let penalized = tasks::apply_overdue_penalties(
                self.db.as_ref(),
                &self.settings(),
                uid,
                &cached,
                now,
                &self.penalties_in_flight,
            )?;
            if !penalized.is_empty() {
                cached = self.refresh_for(Some(uid))?;
            }
        }

        let snapshot = board::build_board(&cached, now);
        self.board_tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    pub fn board(&self) -> BoardSnapshot {
        self.board_tx.borrow().clone()
    }

    pub fn subscribe_board(&self) -> watch::Receiver<BoardSnapshot> {
        self.board_tx.subscribe()
    }

    pub fn start_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = Duration::from_millis(self.settings().tick_interval_ms.max(10));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(hub) = weak.upgrade() else {
                    break;
                };
                match tokio::task::spawn_blocking(move || hub.tick()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(error)) => tracing::warn!(error = %error, "board tick failed"),
                    Err(error) => tracing::warn!(error = %error, "board tick task failed"),
                }
            }
        })
    }

    fn after_task_mutation(&self) -> AppResult<()> {
        self.refresh_tasks()?;
        self.tick()?;
        Ok(())
    }

    // Tasks

    pub fn create_task(&self, payload: CreateTaskPayload) -> AppResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        let id = tasks::create_task(self.db.as_ref(), &uid, payload, self.clock.now())?;
        self.after_task_mutation()?;
        Ok(Some(id))
    }

    pub fn list_tasks(&self, filter: ListTasksFilter) -> AppResult<Vec<TaskRecord>> {
        match self.uid() {
            Some(uid) => tasks::list_tasks(self.db.as_ref(), &uid, &filter),
            None => Ok(Vec::new()),
        }
    }

    pub fn update_task(&self, task_id: &str, update: UpdateTaskPayload) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        tasks::update_task(self.db.as_ref(), &uid, task_id, update)?;
        self.after_task_mutation()
    }

    pub fn start_task(&self, task_id: &str) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        tasks::move_to_in_progress(self.db.as_ref(), &uid, task_id)?;
        self.after_task_mutation()
    }

    pub fn complete_task(&self, task_id: &str) -> AppResult<Option<i64>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        let exp = tasks::complete_task(self.db.as_ref(), &self.settings(), &uid, task_id, self.clock.now())?;
        self.after_task_mutation()?;
        Ok(exp)
    }

    pub fn delete_task(&self, task_id: &str) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        tasks::delete_task(self.db.as_ref(), &uid, task_id)?;
        self.after_task_mutation()
    }

    pub fn toggle_checklist_item(&self, task_id: &str, index: usize) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        tasks::toggle_checklist_item(self.db.as_ref(), &uid, task_id, index)?;
        self.after_task_mutation()
    }

    pub fn move_checklist_item(&self, task_id: &str, from: usize, to: usize) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        tasks::move_checklist_item(self.db.as_ref(), &uid, task_id, from, to)?;
        self.after_task_mutation()
    }

    pub fn motivational_message(&self) -> &'static str {
        board::motivational_message()
    }

    // Notifications and calendar

    pub fn notification_feed(&self) -> AppResult<NotificationFeed> {
        let Some(uid) = self.uid() else {
            return Ok(NotificationFeed::default());
        };
        let settings = self.settings();
        let tasks = tasks::list_tasks(self.db.as_ref(), &uid, &ListTasksFilter::default())?;
        let history = profile::xp_history(self.db.as_ref(), &uid, settings.xp_history_limit)?;
        Ok(notifications::derive_feed(
            &tasks,
            &history,
            self.clock.now(),
            settings.offset(),
            self.local.last_seen_notification_time()?,
        ))
    }

    /// Opening the panel records "now" as the last-seen time.
    pub fn open_notifications(&self) -> AppResult<NotificationFeed> {
        self.local.mark_notifications_seen(self.clock.now())?;
        self.notification_feed()
    }

    /// Removes the document behind one notification: the task for due and
    /// overdue items, the history entry for xp items.
    pub fn delete_notification(&self, kind: NotificationKind, id: &str) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        match kind {
            NotificationKind::Due | NotificationKind::Overdue => {
                tasks::delete_task(self.db.as_ref(), &uid, id)?;
                self.after_task_mutation()
            }
            NotificationKind::Xp => self.db.delete(&profile::xp_history_entry_path(&uid, id)),
        }
    }

    /// One batched delete covering every document in the feed.
    pub fn clear_notifications(&self) -> AppResult<usize> {
        let Some(uid) = self.uid() else {
            return Ok(0);
        };
        let feed = self.notification_feed()?;
        let mut paths: Vec<DocPath> = feed
            .due
            .iter()
            .chain(feed.overdue.iter())
            .map(|item| tasks::task_path(&uid, &item.id))
            .collect();
        paths.extend(feed.xp.iter().map(|item| profile::xp_history_entry_path(&uid, &item.id)));
        if paths.is_empty() {
            return Ok(0);
        }

        self.db.batch_delete(&paths)?;
        tracing::info!(uid = %uid, documents = paths.len(), "notifications cleared");
        self.after_task_mutation()?;
        Ok(paths.len())
    }

    pub fn calendar_highlights(&self) -> AppResult<Vec<NaiveDate>> {
        let Some(uid) = self.uid() else {
            return Ok(Vec::new());
        };
        let tasks = tasks::list_tasks(self.db.as_ref(), &uid, &ListTasksFilter::default())?;
        Ok(board::highlight_dates(&tasks, self.clock.now(), self.settings().offset())
            .into_iter()
            .collect())
    }

    pub fn tasks_on_date(&self, date: NaiveDate) -> AppResult<Vec<CalendarEntry>> {
        let Some(uid) = self.uid() else {
            return Ok(Vec::new());
        };
        let tasks = tasks::list_tasks(self.db.as_ref(), &uid, &ListTasksFilter::default())?;
        Ok(board::tasks_on_date(&tasks, date, self.settings().offset()))
    }

    // Profile

    pub fn profile_view(&self) -> AppResult<Option<ProfileView>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        let settings = self.settings();
        Ok(profile::get_profile(self.db.as_ref(), &uid)?.map(|stored| profile::profile_view(stored, &settings)))
    }

    pub fn save_profile(&self, payload: SaveProfilePayload) -> AppResult<Option<UserProfile>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        profile::save_profile(self.db.as_ref(), self.blobs.as_ref(), &self.settings(), &uid, payload).map(Some)
    }

    pub fn select_title(&self, title_id: &str) -> AppResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        profile::select_title(self.db.as_ref(), &uid, title_id)
    }

    pub fn achievements(&self) -> AppResult<Vec<AchievementStatus>> {
        let Some(uid) = self.uid() else {
            return Ok(achievements::catalog(&[]));
        };
        let unlocked = profile::get_profile(self.db.as_ref(), &uid)?
            .map(|stored| stored.achievements)
            .unwrap_or_default();
        Ok(achievements::catalog(&unlocked))
    }

    pub fn xp_history(&self) -> AppResult<Vec<XpHistoryEntry>> {
        match self.uid() {
            Some(uid) => profile::xp_history(self.db.as_ref(), &uid, self.settings().xp_history_limit),
            None => Ok(Vec::new()),
        }
    }

    // Flashcards

    pub fn create_topic(&self, title: &str) -> AppResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        flashcards::create_topic(self.db.as_ref(), &uid, title, self.clock.now()).map(Some)
    }

    pub fn list_topics(&self) -> AppResult<Vec<FlashcardTopic>> {
        match self.uid() {
            Some(uid) => flashcards::list_topics(self.db.as_ref(), &uid),
            None => Ok(Vec::new()),
        }
    }

    pub fn rename_topic(&self, topic_id: &str, title: &str) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::rename_topic(self.db.as_ref(), &uid, topic_id, title),
            None => Ok(()),
        }
    }

    pub fn delete_topic(&self, topic_id: &str) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::delete_topic(self.db.as_ref(), &uid, topic_id),
            None => Ok(()),
        }
    }

    pub fn create_deck(&self, topic_id: &str, payload: SaveDeckPayload) -> AppResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        flashcards::create_deck(self.db.as_ref(), &uid, topic_id, payload, self.clock.now()).map(Some)
    }

    pub fn list_decks(&self, topic_id: &str) -> AppResult<Vec<FlashcardDeck>> {
        match self.uid() {
            Some(uid) => flashcards::list_decks(self.db.as_ref(), &uid, topic_id),
            None => Ok(Vec::new()),
        }
    }

    pub fn update_deck(&self, topic_id: &str, deck_id: &str, payload: SaveDeckPayload) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::update_deck(self.db.as_ref(), &uid, topic_id, deck_id, payload),
            None => Ok(()),
        }
    }

    pub fn delete_deck(&self, topic_id: &str, deck_id: &str) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::delete_deck(self.db.as_ref(), &uid, topic_id, deck_id),
            None => Ok(()),
        }
    }

    pub fn add_card(&self, topic_id: &str, deck_id: &str, payload: SaveCardPayload) -> AppResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        flashcards::add_card(self.db.as_ref(), &uid, topic_id, deck_id, payload).map(Some)
    }

    pub fn list_cards(&self, topic_id: &str, deck_id: &str) -> AppResult<Vec<Flashcard>> {
        match self.uid() {
            Some(uid) => flashcards::list_cards(self.db.as_ref(), &uid, topic_id, deck_id),
            None => Ok(Vec::new()),
        }
    }

    pub fn update_card(
        &self,
        topic_id: &str,
        deck_id: &str,
        card_id: &str,
        payload: SaveCardPayload,
    ) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::update_card(self.db.as_ref(), &uid, topic_id, deck_id, card_id, payload),
            None => Ok(()),
        }
    }

    pub fn delete_card(&self, topic_id: &str, deck_id: &str, card_id: &str) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::delete_card(self.db.as_ref(), &uid, topic_id, deck_id, card_id),
            None => Ok(()),
        }
    }

    pub fn start_review(&self, topic_id: &str, deck_id: &str) -> AppResult<Vec<Flashcard>> {
        match self.uid() {
            Some(uid) => flashcards::start_review(self.db.as_ref(), &self.settings(), &uid, topic_id, deck_id),
            None => Ok(Vec::new()),
        }
    }

    pub fn finish_review(&self, topic_id: &str, result: ReviewResult) -> AppResult<()> {
        match self.uid() {
            Some(uid) => flashcards::finish_review(self.db.as_ref(), &uid, topic_id, &result),
            None => Ok(()),
        }
    }

    // Goals

    pub fn load_goals(&self) -> AppResult<SmartGoalSet> {
        match self.uid() {
            Some(uid) => goals::load_goals(self.db.as_ref(), &uid),
            None => Ok(SmartGoalSet::default()),
        }
    }

    pub fn add_goal(&self, category: GoalCategory, draft: GoalDraft) -> AppResult<Option<GoalSaveReport>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        goals::add_goal(
            self.db.as_ref(),
            self.blobs.as_ref(),
            &self.settings(),
            &uid,
            category,
            &draft,
            self.clock.now(),
        )
        .map(Some)
    }

    pub fn edit_goal(
        &self,
        category: GoalCategory,
        index: usize,
        draft: GoalDraft,
    ) -> AppResult<Option<GoalSaveReport>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        goals::edit_goal(
            self.db.as_ref(),
            self.blobs.as_ref(),
            &self.settings(),
            &uid,
            category,
            index,
            &draft,
            self.clock.now(),
        )
        .map(Some)
    }

    pub fn delete_goal(&self, category: GoalCategory, index: usize) -> AppResult<Option<GoalSaveReport>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        goals::delete_goal(
            self.db.as_ref(),
            self.blobs.as_ref(),
            &self.settings(),
            &uid,
            category,
            index,
            self.clock.now(),
        )
        .map(Some)
    }

    pub fn toggle_goal_completed(&self, index: usize) -> AppResult<Option<GoalSaveReport>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        goals::toggle_goal_completed(
            self.db.as_ref(),
            self.blobs.as_ref(),
            &self.settings(),
            &uid,
            index,
            self.clock.now(),
        )
        .map(Some)
    }

    // Whiteboards and the brainstorming area

    pub fn save_whiteboard(&self, payload: SaveWhiteboardPayload) -> AppResult<Option<WhiteboardRecord>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        whiteboard::save_whiteboard(
            self.db.as_ref(),
            self.blobs.as_ref(),
            &self.settings(),
            &uid,
            &payload,
            self.clock.now(),
        )
        .map(Some)
    }

    pub fn list_whiteboards(&self) -> AppResult<Vec<WhiteboardRecord>> {
        match self.uid() {
            Some(uid) => whiteboard::list_whiteboards(self.db.as_ref(), &uid),
            None => Ok(Vec::new()),
        }
    }

    pub fn open_view(&self, view: &ActiveView) -> AppResult<ViewData> {
        let uid = self.uid();
        views::render(
            view,
            self.db.as_ref(),
            self.blobs.as_ref(),
            uid.as_deref(),
            self.clock.now(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Lane, TaskStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 20, 10, 0, 0).single().expect("valid time")
    }

    fn identity() -> SessionIdentity {
        SessionIdentity {
            uid: "u1".to_string(),
            email: Some("ada@example.test".to_string()),
            display_name: Some("Ada".to_string()),
        }
    }

    fn hub() -> (tempfile::TempDir, Arc<ManualClock>, Arc<HubCore>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = Arc::new(ManualClock::new(start()));
        let hub = HubCore::with_clock(dir.path().to_path_buf(), clock.clone()).expect("hub");
        (dir, clock, hub)
    }

    fn due_in(title: &str, minutes: i64) -> CreateTaskPayload {
        CreateTaskPayload {
            title: title.to_string(),
            due_date: Some(start() + Duration::minutes(minutes)),
            ..CreateTaskPayload::default()
        }
    }

    #[test]
    fn signed_out_operations_are_silent_no_ops() {
        let (_dir, _clock, hub) = hub();
        assert_eq!(hub.create_task(due_in("nobody", 10)).expect("create"), None);
        assert!(hub.list_tasks(ListTasksFilter::default()).expect("list").is_empty());
        assert_eq!(hub.complete_task("missing").expect("complete"), None);
        assert!(hub.profile_view().expect("profile").is_none());
        assert!(!hub.notification_feed().expect("feed").has_unseen);
        assert_eq!(hub.clear_notifications().expect("clear"), 0);
        assert!(hub.achievements().expect("catalog").iter().all(|status| !status.unlocked));
    }

    #[test]
    fn sign_in_creates_profile_and_sign_out_clears_state() {
        let (_dir, _clock, hub) = hub();
        let stored = hub.sign_in(identity()).expect("sign in");
        assert_eq!(stored.name, "Ada");
        assert_eq!(stored.achievements, vec!["first_login".to_string()]);

        hub.create_task(due_in("Plan", 90)).expect("create");
        assert_eq!(hub.board().pending.len(), 1);
        assert_eq!(hub.board().pending[0].time_left, "1h");

        hub.sign_out().expect("sign out");
        assert_eq!(hub.board(), BoardSnapshot::default());
        assert!(hub.list_tasks(ListTasksFilter::default()).expect("list").is_empty());

        hub.sign_in(identity()).expect("sign in again");
        assert_eq!(hub.board().pending.len(), 1);
    }

    #[test]
    fn concurrent_ticks_never_republish_a_signed_out_board() {
        let (_dir, _clock, hub) = hub();
        hub.sign_in(identity()).expect("sign in");
        hub.create_task(due_in("Plan", 90)).expect("create");

        let stop = Arc::new(AtomicBool::new(false));
        let ticker = {
            let hub = hub.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    hub.tick().expect("tick");
                }
            })
        };

        for _ in 0..25 {
            hub.sign_out().expect("sign out");
            assert_eq!(hub.board(), BoardSnapshot::default());
            hub.sign_in(identity()).expect("sign in again");
            assert_eq!(hub.board().pending.len(), 1);
        }
        hub.sign_out().expect("sign out");

        stop.store(true, Ordering::SeqCst);
        ticker.join().expect("ticker thread");
        assert_eq!(hub.board(), BoardSnapshot::default());
        assert_eq!(hub.tick().expect("tick"), BoardSnapshot::default());
    }

    #[test]
    fn notifications_track_seen_time_and_clear_in_one_batch() {
        let (_dir, clock, hub) = hub();
        hub.sign_in(identity()).expect("sign in");
        let due_soon = hub.create_task(due_in("Soon", 60)).expect("create").expect("id");
        let done = hub.create_task(due_in("Done", 30)).expect("create").expect("id");
        let later = hub.create_task(due_in("Later", 3 * 24 * 60)).expect("create").expect("id");
        hub.complete_task(&done).expect("complete");

        let feed = hub.notification_feed().expect("feed");
        assert_eq!(
            feed.due.iter().map(|item| item.id.as_str()).collect::<Vec<_>>(),
            vec![due_soon.as_str(), done.as_str()]
        );
        assert_eq!(feed.xp.len(), 1);
        assert!(feed.has_unseen);

        clock.advance(Duration::hours(2));
        let opened = hub.open_notifications().expect("open");
        assert!(!opened.has_unseen);
        assert_eq!(opened.due.len(), 2);

        let cleared = hub.clear_notifications().expect("clear");
        assert_eq!(cleared, 3);
        let after = hub.notification_feed().expect("feed");
        assert!(after.due.is_empty() && after.xp.is_empty());
        let remaining = hub.list_tasks(ListTasksFilter::default()).expect("list");
        assert_eq!(remaining.iter().map(|task| task.id.as_str()).collect::<Vec<_>>(), vec![later.as_str()]);
    }

    #[test]
    fn deleting_an_xp_notification_removes_the_history_entry() {
        let (_dir, _clock, hub) = hub();
        hub.sign_in(identity()).expect("sign in");
        let id = hub.create_task(due_in("Ship", 30)).expect("create").expect("id");
        hub.complete_task(&id).expect("complete");

        let entry = hub.xp_history().expect("history").remove(0);
        hub.delete_notification(NotificationKind::Xp, &entry.id).expect("delete");
        assert!(hub.xp_history().expect("history").is_empty());
        assert_eq!(hub.profile_view().expect("view").expect("profile").profile.counters.exp, 5);
    }

    #[test]
    fn calendar_uses_the_configured_offset() {
        let (_dir, _clock, hub) = hub();
        hub.update_settings(serde_json::json!({ "utcOffsetMinutes": -660 })).expect("offset");
        hub.sign_in(identity()).expect("sign in");
        hub.create_task(due_in("Call", 30)).expect("create");

        let days = hub.calendar_highlights().expect("highlights");
        let local_day = NaiveDate::from_ymd_opt(2026, 4, 19).expect("date");
        assert_eq!(days, vec![local_day]);
        let entries = hub.tasks_on_date(local_day).expect("entries");
        assert_eq!(entries[0].time, "11:30 PM");
    }

    #[tokio::test]
    async fn ticker_publishes_overdue_lane_and_penalizes_once() {
        let (_dir, clock, hub) = hub();
        hub.update_settings(serde_json::json!({ "tickIntervalMs": 20 })).expect("fast ticks");
        hub.sign_in(identity()).expect("sign in");
        let id = hub.create_task(due_in("Late", 1)).expect("create").expect("id");
        hub.start_task(&id).expect("start");
        assert_eq!(hub.board().in_progress.len(), 1);

        let mut board = hub.subscribe_board();
        clock.advance(Duration::minutes(5));
        let ticker = hub.start_ticker();

        let overdue = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                board.changed().await.expect("board channel open");
                let snapshot = board.borrow_and_update().clone();
                if !snapshot.overdue.is_empty() {
                    break snapshot;
                }
            }
        })
        .await
        .expect("overdue lane within timeout");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        ticker.abort();

        assert_eq!(overdue.overdue[0].lane, Lane::Overdue);
        assert_eq!(overdue.overdue[0].task.status, TaskStatus::InProgress);
        assert_eq!(overdue.overdue[0].time_left, board::OVERDUE_LABEL);
        assert_eq!(hub.profile_view().expect("view").expect("profile").profile.counters.exp, -100);
        assert_eq!(hub.xp_history().expect("history").len(), 1);
    }

    #[tokio::test]
    async fn session_binder_follows_external_sign_out() {
        let (_dir, _clock, hub) = hub();
        let binder = hub.start_session_binder();
        hub.sign_in(identity()).expect("sign in");
        hub.create_task(due_in("Plan", 90)).expect("create");
        assert_eq!(hub.board().pending.len(), 1);

        let mut board = hub.subscribe_board();
        hub.session().sign_out();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !board.borrow_and_update().pending.is_empty() {
                board.changed().await.expect("board channel open");
            }
        })
        .await
        .expect("board cleared after sign-out");
        binder.abort();
        assert!(hub.list_tasks(ListTasksFilter::default()).expect("list").is_empty());
    }

    #[test]
    fn open_view_dispatches_through_the_session() {
        let (_dir, _clock, hub) = hub();
        hub.sign_in(identity()).expect("sign in");
        hub.add_goal(
            GoalCategory::Specific,
            GoalDraft {
                text: Some("Run 5k".to_string()),
                ..GoalDraft::default()
            },
        )
        .expect("add goal");
        match hub.open_view(&ActiveView::SmartGoals).expect("render") {
            ViewData::SmartGoals { goals } => assert_eq!(goals.specific.len(), 1),
            other => panic!("unexpected view data: {:?}", other),
        }
    }
}
