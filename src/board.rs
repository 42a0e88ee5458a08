use crate::models::{BoardSnapshot, CalendarEntry, Lane, TaskCard, TaskRecord, TaskStatus};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rand::seq::IndexedRandom;
use std::collections::BTreeSet;

pub const OVERDUE_LABEL: &str = "Overdue";

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

const UNITS: [(i64, &str); 6] = [
    (YEAR, "y"),
    (MONTH, "mo"),
    (DAY, "d"),
    (HOUR, "h"),
    (MINUTE, "m"),
    (1, "s"),
];

const MOTIVATIONAL_MESSAGES: &[&str] = &[
    "Take one step today toward your goal, even a small one matters.",
    "Keep pushing forward. Your effort is building progress.",
    "Break your work into small, manageable steps and complete one now.",
    "Stay focused: eliminate distractions and commit to the task at hand.",
    "Complete one task and build momentum for the rest of your day.",
    "Repeat small productive habits. They create long-term success.",
    "Don't wait. Start now and build as you go.",
    "Begin with a small win: check off a simple task first.",
    "Take initiative. The sooner you start, the sooner you succeed.",
    "Trust your routine and stick to it today.",
    "Take five minutes to refocus, then return with purpose.",
    "Finish one important task before you move to the next.",
    "Write down your top priority and take action on it now.",
    "Be consistent and show up for your goals even if motivation fades.",
    "Choose progress over perfection and complete something now.",
    "Break a big goal into a smaller action and start with that.",
    "Use this moment to build a productive habit.",
    "Push through resistance: the hardest part is starting.",
    "Give yourself credit, then keep moving forward.",
    "Visualize the result and take the next right step toward it.",
];

/// Largest non-zero unit only: 25 hours renders as `1d`.
pub fn remaining_label(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now > due {
        return OVERDUE_LABEL.to_string();
    }
    let seconds = (due - now).num_seconds();
    for (size, suffix) in UNITS {
        if seconds >= size {
            return format!("{}{}", seconds / size, suffix);
        }
    }
    "0s".to_string()
}

pub fn is_overdue(task: &TaskRecord, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Completed && task.due_date < now
}

pub fn lane_for(status: TaskStatus, due: DateTime<Utc>, now: DateTime<Utc>) -> Lane {
    if status != TaskStatus::Completed && due < now {
        return Lane::Overdue;
    }
    match status {
        TaskStatus::Pending => Lane::Pending,
        TaskStatus::InProgress => Lane::InProgress,
        TaskStatus::Review => Lane::Review,
        TaskStatus::Completed => Lane::Completed,
    }
}

pub fn task_card(task: &TaskRecord, now: DateTime<Utc>) -> TaskCard {
    TaskCard {
        task: task.clone(),
        time_left: remaining_label(task.due_date, now),
        overdue: is_overdue(task, now),
        lane: lane_for(task.status, task.due_date, now),
    }
}

/// Every task lands in exactly one lane, in input order.
pub fn build_board(tasks: &[TaskRecord], now: DateTime<Utc>) -> BoardSnapshot {
    let mut board = BoardSnapshot {
        generated_at: Some(now),
        ..BoardSnapshot::default()
    };
    for task in tasks {
        let card = task_card(task, now);
        let lane = match card.lane {
            Lane::Pending => &mut board.pending,
            Lane::InProgress => &mut board.in_progress,
            Lane::Review => &mut board.review,
            Lane::Completed => &mut board.completed,
            Lane::Overdue => &mut board.overdue,
        };
        lane.push(card);
    }
    board
}

pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Calendar days that carry a due-soon or overdue task.
pub fn highlight_dates(tasks: &[TaskRecord], now: DateTime<Utc>, offset: FixedOffset) -> BTreeSet<NaiveDate> {
    tasks
        .iter()
        .filter(|task| crate::notifications::classify_due(task, now, offset).is_some())
        .map(|task| local_date(task.due_date, offset))
        .collect()
}

pub fn tasks_on_date(tasks: &[TaskRecord], date: NaiveDate, offset: FixedOffset) -> Vec<CalendarEntry> {
    let mut entries = tasks
        .iter()
        .filter(|task| local_date(task.due_date, offset) == date)
        .map(|task| CalendarEntry {
            id: task.id.clone(),
            title: task.title.clone(),
            due_date: task.due_date,
            time: task.due_date.with_timezone(&offset).format("%I:%M %p").to_string(),
        })
        .collect::<Vec<_>>();
    entries.sort_by_key(|entry| entry.due_date);
    entries
}

pub fn motivational_message() -> &'static str {
    MOTIVATIONAL_MESSAGES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(MOTIVATIONAL_MESSAGES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task(id: &str, status: TaskStatus, due: DateTime<Utc>) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: format!("task {}", id),
            description: String::new(),
            tags: Vec::new(),
            due_date: due,
            checklist: Vec::new(),
            status,
            priority: None,
            user_id: "u1".to_string(),
            created_at: due - Duration::days(1),
            completed_time: None,
            exp_deducted: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().expect("valid time")
    }

    #[test]
    fn label_reports_only_the_largest_unit() {
        let now = now();
        assert_eq!(remaining_label(now + Duration::hours(25), now), "1d");
        assert_eq!(remaining_label(now + Duration::minutes(30), now), "30m");
        assert_eq!(remaining_label(now + Duration::seconds(59), now), "59s");
        assert_eq!(remaining_label(now + Duration::days(45), now), "1mo");
        assert_eq!(remaining_label(now + Duration::days(400), now), "1y");
        assert_eq!(remaining_label(now + Duration::minutes(119), now), "1h");
        assert_eq!(remaining_label(now, now), "0s");
        assert_eq!(remaining_label(now - Duration::seconds(1), now), OVERDUE_LABEL);
    }

    #[test]
    fn overdue_tasks_leave_their_status_lane() {
        let now = now();
        let tasks = vec![
            task("late-progress", TaskStatus::InProgress, now - Duration::minutes(1)),
            task("late-done", TaskStatus::Completed, now - Duration::days(2)),
            task("soon", TaskStatus::Pending, now + Duration::minutes(30)),
            task("review", TaskStatus::Review, now + Duration::days(3)),
        ];

        let board = build_board(&tasks, now);
        let ids = |cards: &Vec<TaskCard>| cards.iter().map(|card| card.task.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(&board.overdue), vec!["late-progress"]);
        assert!(board.in_progress.is_empty());
        assert_eq!(ids(&board.completed), vec!["late-done"]);
        assert!(!board.completed[0].overdue);
        assert_eq!(ids(&board.pending), vec!["soon"]);
        assert_eq!(board.pending[0].time_left, "30m");
        assert_eq!(ids(&board.review), vec!["review"]);

        let total = board.pending.len()
            + board.in_progress.len()
            + board.review.len()
            + board.completed.len()
            + board.overdue.len();
        assert_eq!(total, tasks.len());
    }

    #[test]
    fn calendar_groups_by_local_day_and_orders_by_due_time() {
        let now = now();
        let offset = FixedOffset::east_opt(2 * 3600).expect("offset");
        let tasks = vec![
            task("late", TaskStatus::Pending, now + Duration::hours(3)),
            task("early", TaskStatus::Pending, now + Duration::hours(1)),
            task("far", TaskStatus::Pending, now + Duration::days(10)),
            task("past", TaskStatus::Pending, now - Duration::days(3)),
        ];

        let highlighted = highlight_dates(&tasks, now, offset);
        assert!(highlighted.contains(&NaiveDate::from_ymd_opt(2026, 3, 10).expect("date")));
        assert!(highlighted.contains(&NaiveDate::from_ymd_opt(2026, 3, 7).expect("date")));
        assert!(!highlighted.contains(&NaiveDate::from_ymd_opt(2026, 3, 20).expect("date")));

        let entries = tasks_on_date(&tasks, NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"), offset);
        assert_eq!(entries.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["early", "late"]);
        assert_eq!(entries[0].time, "03:00 PM");
    }

    #[test]
    fn motivational_message_comes_from_the_fixed_list() {
        assert_eq!(MOTIVATIONAL_MESSAGES.len(), 20);
        assert!(MOTIVATIONAL_MESSAGES.contains(&"Push through resistance: the hardest part is starting."));
        assert!(MOTIVATIONAL_MESSAGES.contains(&motivational_message()));
    }
}
