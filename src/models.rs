use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "onProgress")]
    InProgress,
    /// Present in stored data only; no UI transition leads here.
    #[serde(rename = "review")]
    Review,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "onProgress",
            Self::Review => "review",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exp_deducted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<ChecklistItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksFilter {
    pub status: Option<TaskStatus>,
}

/// Flat usage counters stored alongside the profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CounterBag {
    pub exp: i64,
    pub tasks_completed: i64,
    pub tasks_today: i64,
    pub tasks_completed_today: i64,
    pub task_streak: i64,
    pub pomodoro_sessions: i64,
    pub pomodoro_today: i64,
    pub zen_sessions: i64,
    pub pomodoro_total_minutes: i64,
    pub pomodoro_streak: i64,
    pub decks_created: i64,
    pub flashcard_reviews: i64,
    pub flashcard100: i64,
    pub flashcard_streak: i64,
    pub unique_decks_reviewed: i64,
    pub completed_task_today: bool,
    pub completed_pomodoro_today: bool,
    pub completed_flashcard_today: bool,
    pub used_all_features_streak: i64,
    pub used_all_features_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub profile_picture: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub selected_title: String,
    #[serde(flatten)]
    pub counters: CounterBag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureUpload {
    pub file_name: String,
    /// Raw base64 or a `data:` URL.
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProfilePayload {
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub occupation: String,
    pub picture: Option<ProfilePictureUpload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub profile: UserProfile,
    pub level: i64,
    pub xp_label: String,
    pub display_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpHistoryEntry {
    pub id: String,
    pub xp_added: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardTopic {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardDeck {
    pub id: String,
    pub topic_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDeckPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCardPayload {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub deck_id: String,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalCategory {
    Specific,
    Measurable,
    Achievable,
    Relevant,
    TimeBound,
}

impl GoalCategory {
    pub const ALL: [GoalCategory; 5] = [
        Self::Specific,
        Self::Measurable,
        Self::Achievable,
        Self::Relevant,
        Self::TimeBound,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Free text, or an RFC 3339 timestamp for time-bound goals.
    pub goal: String,
    pub text_color: String,
    pub bg_color: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartGoalSet {
    pub specific: Vec<Goal>,
    pub measurable: Vec<Goal>,
    pub achievable: Vec<Goal>,
    pub relevant: Vec<Goal>,
    pub time_bound: Vec<Goal>,
}

impl SmartGoalSet {
    pub fn list(&self, category: GoalCategory) -> &Vec<Goal> {
        match category {
            GoalCategory::Specific => &self.specific,
            GoalCategory::Measurable => &self.measurable,
            GoalCategory::Achievable => &self.achievable,
            GoalCategory::Relevant => &self.relevant,
            GoalCategory::TimeBound => &self.time_bound,
        }
    }

    pub fn list_mut(&mut self, category: GoalCategory) -> &mut Vec<Goal> {
        match category {
            GoalCategory::Specific => &mut self.specific,
            GoalCategory::Measurable => &mut self.measurable,
            GoalCategory::Achievable => &mut self.achievable,
            GoalCategory::Relevant => &mut self.relevant,
            GoalCategory::TimeBound => &mut self.time_bound,
        }
    }

    pub fn len(&self) -> usize {
        GoalCategory::ALL.iter().map(|category| self.list(*category).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDraft {
    pub text: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub text_color: Option<String>,
    pub bg_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSaveReport {
    pub goals: SmartGoalSet,
    pub backup_object: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardScene {
    #[serde(rename = "type", default = "default_scene_type")]
    pub kind: String,
    #[serde(default)]
    pub elements: Vec<serde_json::Value>,
    #[serde(default)]
    pub app_state: serde_json::Value,
    #[serde(default)]
    pub files: serde_json::Value,
}

fn default_scene_type() -> String {
    "excalidraw".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(alias = "filename")]
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub readable_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWhiteboardPayload {
    pub title: String,
    pub scene: WhiteboardScene,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lane {
    Pending,
    InProgress,
    Review,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCard {
    pub task: TaskRecord,
    pub time_left: String,
    pub overdue: bool,
    pub lane: Lane,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub generated_at: Option<DateTime<Utc>>,
    pub pending: Vec<TaskCard>,
    pub in_progress: Vec<TaskCard>,
    pub review: Vec<TaskCard>,
    pub completed: Vec<TaskCard>,
    pub overdue: Vec<TaskCard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Due,
    Overdue,
    Xp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub due: Vec<NotificationItem>,
    pub overdue: Vec<NotificationItem>,
    pub xp: Vec<NotificationItem>,
    pub latest: Option<DateTime<Utc>>,
    pub has_unseen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub id: String,
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub whiteboard_bucket: String,
    pub goal_backup_bucket: String,
    pub profile_picture_bucket: String,
    pub public_base_url: Option<String>,
    pub tick_interval_ms: u64,
    pub completion_exp: i64,
    pub overdue_penalty_exp: i64,
    pub exp_per_level: i64,
    pub min_cards_to_review: usize,
    pub xp_history_limit: usize,
    /// Fixed local offset used for calendar days and notification times.
    pub utc_offset_minutes: i32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            whiteboard_bucket: "whiteboards".to_string(),
            goal_backup_bucket: "smart-goals-backups".to_string(),
            profile_picture_bucket: "profile-pictures".to_string(),
            public_base_url: None,
            tick_interval_ms: 1_000,
            completion_exp: 5,
            overdue_penalty_exp: 100,
            exp_per_level: 100,
            min_cards_to_review: 4,
            xp_history_limit: 10,
            utc_offset_minutes: 0,
        }
    }
}

impl AppSettings {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }
}
