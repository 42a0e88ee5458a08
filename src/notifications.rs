use crate::models::{NotificationFeed, NotificationItem, NotificationKind, TaskRecord, XpHistoryEntry};
use chrono::{DateTime, Duration, FixedOffset, Utc};

/// Due-soon covers the local start of today through one day from now;
/// anything earlier than now and outside that window is overdue. Status
/// plays no part, so completed tasks are listed too.
pub fn classify_due(task: &TaskRecord, now: DateTime<Utc>, offset: FixedOffset) -> Option<NotificationKind> {
    let horizon = now + Duration::days(1);
    if task.due_date >= start_of_local_day(now, offset) && task.due_date <= horizon {
        Some(NotificationKind::Due)
    } else if task.due_date < now {
        Some(NotificationKind::Overdue)
    } else {
        None
    }
}

pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    now.with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}

pub fn derive_feed(
    tasks: &[TaskRecord],
    xp_history: &[XpHistoryEntry],
    now: DateTime<Utc>,
    offset: FixedOffset,
    last_seen: Option<DateTime<Utc>>,
) -> NotificationFeed {
    let mut feed = NotificationFeed::default();
    let mut latest: Option<DateTime<Utc>> = None;

    for task in tasks {
        let Some(kind) = classify_due(task, now, offset) else {
            continue;
        };
        latest = latest.max(Some(task.due_date));
        let item = notification_item(&task.id, kind, &task.title, task.due_date, offset);
        match kind {
            NotificationKind::Due => feed.due.push(item),
            _ => feed.overdue.push(item),
        }
    }

    let mut history = xp_history.to_vec();
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if let Some(newest) = history.first() {
        latest = latest.max(Some(newest.timestamp));
    }
    feed.xp = history
        .iter()
        .map(|entry| notification_item(&entry.id, NotificationKind::Xp, &xp_title(entry.xp_added), entry.timestamp, offset))
        .collect();

    feed.has_unseen = match (latest, last_seen) {
        (Some(latest), Some(seen)) => latest > seen,
        (Some(_), None) => true,
        (None, _) => false,
    };
    feed.latest = latest;
    feed
}

fn xp_title(xp_added: i64) -> String {
    if xp_added >= 0 {
        format!("You earned {} XP!", xp_added)
    } else {
        format!("You lost {} XP.", -xp_added)
    }
}

fn notification_item(
    id: &str,
    kind: NotificationKind,
    title: &str,
    at: DateTime<Utc>,
    offset: FixedOffset,
) -> NotificationItem {
    let local = at.with_timezone(&offset);
    NotificationItem {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        date: local.format("%B %-d, %Y").to_string(),
        time: local.format("%I:%M %p").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("utc offset")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).single().expect("valid time")
    }

    fn task(id: &str, due: DateTime<Utc>, status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            tags: Vec::new(),
            due_date: due,
            checklist: Vec::new(),
            status,
            priority: None,
            user_id: "u1".to_string(),
            created_at: due,
            completed_time: None,
            exp_deducted: false,
        }
    }

    #[test]
    fn due_window_starts_at_local_midnight() {
        let now = now();
        let earlier_today = task("earlier", now - Duration::hours(2), TaskStatus::Pending);
        let yesterday = task("yesterday", now - Duration::hours(12), TaskStatus::Pending);
        let tomorrow = task("tomorrow", now + Duration::hours(20), TaskStatus::InProgress);
        let next_week = task("later", now + Duration::days(7), TaskStatus::Pending);
        let done = task("done", now - Duration::days(1), TaskStatus::Completed);

        assert_eq!(classify_due(&earlier_today, now, utc()), Some(NotificationKind::Due));
        assert_eq!(classify_due(&yesterday, now, utc()), Some(NotificationKind::Overdue));
        assert_eq!(classify_due(&tomorrow, now, utc()), Some(NotificationKind::Due));
        assert_eq!(classify_due(&next_week, now, utc()), None);
        assert_eq!(classify_due(&done, now, utc()), Some(NotificationKind::Overdue));
    }

    #[test]
    fn completed_task_due_today_stays_in_the_feed() {
        let now = now();
        let tasks = vec![task("filed", now + Duration::hours(2), TaskStatus::Completed)];

        let feed = derive_feed(&tasks, &[], now, utc(), None);
        assert_eq!(feed.due.len(), 1);
        assert_eq!(feed.due[0].id, "filed");
        assert_eq!(feed.latest, Some(now + Duration::hours(2)));
        assert!(feed.has_unseen);
    }

    #[test]
    fn feed_formats_items_and_tracks_unseen_state() {
        let now = now();
        let tasks = vec![
            task("report", now + Duration::hours(3), TaskStatus::Pending),
            task("taxes", now - Duration::days(2), TaskStatus::Pending),
        ];
        let history = vec![
            XpHistoryEntry {
                id: "x1".to_string(),
                xp_added: 5,
                reason: "task_completed".to_string(),
                timestamp: now - Duration::hours(1),
            },
            XpHistoryEntry {
                id: "x2".to_string(),
                xp_added: -100,
                reason: "task_overdue".to_string(),
                timestamp: now - Duration::minutes(5),
            },
        ];

        let feed = derive_feed(&tasks, &history, now, utc(), None);
        assert_eq!(feed.due.len(), 1);
        assert_eq!(feed.due[0].date, "March 10, 2026");
        assert_eq!(feed.due[0].time, "12:30 PM");
        assert_eq!(feed.overdue[0].id, "taxes");
        assert_eq!(feed.xp[0].title, "You lost 100 XP.");
        assert_eq!(feed.xp[1].title, "You earned 5 XP!");
        assert_eq!(feed.latest, Some(now + Duration::hours(3)));
        assert!(feed.has_unseen);

        let seen = derive_feed(&tasks, &history, now, utc(), Some(now + Duration::hours(4)));
        assert!(!seen.has_unseen);

        let empty = derive_feed(&[], &[], now, utc(), None);
        assert!(!empty.has_unseen);
        assert!(empty.latest.is_none());
    }
}
