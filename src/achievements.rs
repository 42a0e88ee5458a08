use crate::errors::AppResult;
use crate::models::{CounterBag, UserProfile};
use crate::store::{read_doc, DocPath, DocumentStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One unlockable: the same id names both the achievement and its title.
pub struct AchievementRule {
    pub id: &'static str,
    pub achievement_name: &'static str,
    pub title_name: &'static str,
    pub description: &'static str,
    pub predicate: fn(&CounterBag) -> bool,
}

pub static RULES: &[AchievementRule] = &[
    AchievementRule {
        id: "first_login",
        achievement_name: "First Login",
        title_name: "Newcomer",
        description: "Logged in for the first time.",
        predicate: |_| true,
    },
    AchievementRule {
        id: "task_tamer",
        achievement_name: "Task Tamer",
        title_name: "Task Tamer",
        description: "Complete your first task.",
        predicate: |c| c.tasks_completed >= 1,
    },
    AchievementRule {
        id: "on_a_roll",
        achievement_name: "On a Roll",
        title_name: "On a Roll",
        description: "Complete 5 tasks in a day.",
        predicate: |c| c.tasks_today >= 5,
    },
    AchievementRule {
        id: "daily_streak",
        achievement_name: "Daily Streak",
        title_name: "Daily Streaker",
        description: "Complete tasks 3 days in a row.",
        predicate: |c| c.task_streak >= 3,
    },
    AchievementRule {
        id: "master_of_lists",
        achievement_name: "Master of Lists",
        title_name: "List Master",
        description: "Complete 100 total tasks.",
        predicate: |c| c.tasks_completed >= 100,
    },
    AchievementRule {
        id: "inbox_zero",
        achievement_name: "Inbox Zero",
        title_name: "Inbox Zero Hero",
        description: "Finish all tasks for the day.",
        predicate: |c| c.tasks_today > 0 && c.tasks_today == c.tasks_completed_today,
    },
    AchievementRule {
        id: "first_sprint",
        achievement_name: "First Sprint",
        title_name: "Sprinter",
        description: "Complete 1 Pomodoro session.",
        predicate: |c| c.pomodoro_sessions >= 1,
    },
    AchievementRule {
        id: "deep_focus",
        achievement_name: "Deep Focus",
        title_name: "Deep Focuser",
        description: "Complete 4 Pomodoros in a day.",
        predicate: |c| c.pomodoro_today >= 4,
    },
    AchievementRule {
        id: "zen_mode",
        achievement_name: "Zen Mode",
        title_name: "Zen Master",
        description: "Complete a 25-minute session without pausing.",
        predicate: |c| c.zen_sessions >= 1,
    },
    AchievementRule {
        id: "time_bender",
        achievement_name: "Time Bender",
        title_name: "Time Bender",
        description: "Accumulate 10 hours of Pomodoro time.",
        predicate: |c| c.pomodoro_total_minutes >= 600,
    },
    AchievementRule {
        id: "consistent_clocker",
        achievement_name: "Consistent Clocker",
        title_name: "Consistent Clocker",
        description: "Use the Pomodoro timer 7 days in a row.",
        predicate: |c| c.pomodoro_streak >= 7,
    },
    AchievementRule {
        id: "card_collector",
        achievement_name: "Card Collector",
        title_name: "Card Collector",
        description: "Create your first deck.",
        predicate: |c| c.decks_created >= 1,
    },
    AchievementRule {
        id: "brain_boost",
        achievement_name: "Brain Boost",
        title_name: "Brain Booster",
        description: "Review a full flashcard deck.",
        predicate: |c| c.flashcard_reviews >= 1,
    },
    AchievementRule {
        id: "memory_master",
        achievement_name: "Memory Master",
        title_name: "Memory Master",
        description: "Get 100% correct in a review session.",
        predicate: |c| c.flashcard100 >= 1,
    },
    AchievementRule {
        id: "study_streak",
        achievement_name: "Study Streak",
        title_name: "Study Streaker",
        description: "Study flashcards 5 days in a row.",
        predicate: |c| c.flashcard_streak >= 5,
    },
    AchievementRule {
        id: "deck_dominator",
        achievement_name: "Deck Dominator",
        title_name: "Deck Dominator",
        description: "Review 10 unique decks.",
        predicate: |c| c.unique_decks_reviewed >= 10,
    },
    AchievementRule {
        id: "productivity_prodigy",
        achievement_name: "Productivity Prodigy",
        title_name: "Productivity Prodigy",
        description: "Complete a task, a Pomodoro session, and review a flashcard deck in one day.",
        predicate: |c| c.completed_task_today && c.completed_pomodoro_today && c.completed_flashcard_today,
    },
    AchievementRule {
        id: "balance_bringer",
        achievement_name: "Balance Bringer",
        title_name: "Balance Bringer",
        description: "Use all three features for 7 days straight.",
        predicate: |c| c.used_all_features_streak >= 7,
    },
    AchievementRule {
        id: "power_user",
        achievement_name: "Power User",
        title_name: "Power User",
        description: "Use all features 100 times total.",
        predicate: |c| c.used_all_features_total >= 100,
    },
    AchievementRule {
        id: "task_master",
        achievement_name: "Task Master",
        title_name: "Task Master",
        description: "Completed 10 tasks.",
        predicate: |c| c.tasks_completed >= 10,
    },
    AchievementRule {
        id: "flashcard_novice",
        achievement_name: "Flashcard Novice",
        title_name: "Flashcard Novice",
        description: "Completed your first flashcard quiz.",
        predicate: |c| c.flashcard_reviews >= 1,
    },
    AchievementRule {
        id: "xp_100",
        achievement_name: "Xp 100+",
        title_name: "XP Farmer",
        description: "Earned 100 XP.",
        predicate: |c| c.exp >= 100,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub achievements: Vec<String>,
    pub titles: Vec<String>,
    pub achievements_changed: bool,
    pub titles_changed: bool,
}

impl Evaluation {
    pub fn changed(&self) -> bool {
        self.achievements_changed || self.titles_changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    pub id: String,
    pub name: String,
    pub title_name: String,
    pub description: String,
    pub unlocked: bool,
}

pub fn title_name(id: &str) -> Option<&'static str> {
    RULES.iter().find(|rule| rule.id == id).map(|rule| rule.title_name)
}

/// Ids are only ever appended, so running this twice on the same
/// counters leaves both lists untouched the second time.
pub fn evaluate(counters: &CounterBag, achievements: &[String], titles: &[String]) -> Evaluation {
    let mut next_achievements = achievements.to_vec();
    let mut next_titles = titles.to_vec();

    for rule in RULES {
        if !(rule.predicate)(counters) {
            continue;
        }
        if !next_achievements.iter().any(|id| id == rule.id) {
            next_achievements.push(rule.id.to_string());
        }
        if !next_titles.iter().any(|id| id == rule.id) {
            next_titles.push(rule.id.to_string());
        }
    }

    Evaluation {
        achievements_changed: sorted(&next_achievements) != sorted(achievements),
        titles_changed: sorted(&next_titles) != sorted(titles),
        achievements: next_achievements,
        titles: next_titles,
    }
}

/// Evaluates the stored profile and persists only the lists that changed.
pub fn evaluate_and_store(store: &dyn DocumentStore, uid: &str) -> AppResult<Option<Evaluation>> {
    let path = DocPath::user(uid);
    let Some(profile) = read_doc::<UserProfile>(store, &path)? else {
        return Ok(None);
    };

    let evaluation = evaluate(&profile.counters, &profile.achievements, &profile.titles);
    if evaluation.changed() {
        let mut patch = Map::new();
        if evaluation.achievements_changed {
            patch.insert("achievements".to_string(), json!(evaluation.achievements));
        }
        if evaluation.titles_changed {
            patch.insert("titles".to_string(), json!(evaluation.titles));
        }
        store.merge(&path, &Value::Object(patch))?;
        tracing::info!(
            uid,
            achievements = evaluation.achievements.len(),
            titles = evaluation.titles.len(),
            "achievement lists updated"
        );
    }
    Ok(Some(evaluation))
}

pub fn catalog(unlocked: &[String]) -> Vec<AchievementStatus> {
    RULES
        .iter()
        .map(|rule| AchievementStatus {
            id: rule.id.to_string(),
            name: rule.achievement_name.to_string(),
            title_name: rule.title_name.to_string(),
            description: rule.description.to_string(),
            unlocked: unlocked.iter().any(|id| id == rule.id),
        })
        .collect()
}

fn sorted(ids: &[String]) -> Vec<String> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;
    use std::collections::HashSet;

    #[test]
    fn rule_ids_are_unique() {
        let ids = RULES.iter().map(|rule| rule.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), RULES.len());
        assert_eq!(RULES[0].id, "first_login");
    }

    #[test]
    fn empty_counters_still_grant_first_login() {
        let evaluation = evaluate(&CounterBag::default(), &[], &[]);
        assert_eq!(evaluation.achievements, vec!["first_login".to_string()]);
        assert_eq!(evaluation.titles, vec!["first_login".to_string()]);
        assert!(evaluation.changed());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let counters = CounterBag {
            exp: 150,
            tasks_completed: 12,
            decks_created: 1,
            tasks_today: 3,
            tasks_completed_today: 3,
            ..CounterBag::default()
        };
        let first = evaluate(&counters, &[], &[]);
        let second = evaluate(&counters, &first.achievements, &first.titles);

        assert!(!second.changed());
        assert_eq!(second.achievements, first.achievements);
        for id in ["task_tamer", "task_master", "card_collector", "inbox_zero", "xp_100"] {
            assert!(first.achievements.iter().any(|a| a == id), "missing {}", id);
        }
        assert!(!first.achievements.iter().any(|a| a == "master_of_lists"));
    }

    #[test]
    fn every_achievement_has_a_matching_title() {
        let counters = CounterBag {
            exp: 1_000,
            tasks_completed: 100,
            flashcard_reviews: 1,
            completed_task_today: true,
            completed_pomodoro_today: true,
            completed_flashcard_today: true,
            ..CounterBag::default()
        };
        let evaluation = evaluate(&counters, &[], &["legacy_title".to_string()]);
        for id in &evaluation.achievements {
            assert!(evaluation.titles.contains(id));
        }
        assert!(evaluation.titles.contains(&"legacy_title".to_string()));
        assert!(evaluation.achievements.contains(&"productivity_prodigy".to_string()));
    }

    #[test]
    fn stored_lists_are_written_only_when_changed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("hub.sqlite")).expect("db");
        let path = DocPath::user("u1");
        db.set(
            &path,
            &json!({
                "name": "Ada",
                "createdAt": Utc::now(),
                "tasksCompleted": 1,
                "achievements": ["first_login", "task_tamer"],
                "titles": ["first_login"]
            }),
        )
        .expect("seed profile");

        let evaluation = evaluate_and_store(&db, "u1").expect("evaluate").expect("profile exists");
        assert!(!evaluation.achievements_changed);
        assert!(evaluation.titles_changed);

        let stored = db.get(&path).expect("get").expect("exists");
        assert_eq!(stored["titles"], json!(["first_login", "task_tamer"]));

        let again = evaluate_and_store(&db, "u1").expect("evaluate").expect("profile exists");
        assert!(!again.changed());
        assert!(evaluate_and_store(&db, "nobody").expect("evaluate").is_none());
        assert_eq!(title_name("xp_100"), Some("XP Farmer"));
    }
}
