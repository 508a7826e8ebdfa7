use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use lifeboard_shared::{Priority, Status, Task};

use crate::calendar::{date_key, parse_reminder};

/// Ordering applied to every derived task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Order,
    Priority,
    Date,
    Status,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Order => "order",
            SortKey::Priority => "priority",
            SortKey::Date => "date",
            SortKey::Status => "status",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "order" | "manual" => Some(SortKey::Order),
            "priority" => Some(SortKey::Priority),
            "date" => Some(SortKey::Date),
            "status" => Some(SortKey::Status),
            _ => None,
        }
    }
}

/// Global filter parameters. They apply to every view, never per view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub search: String,
    pub sort_by: SortKey,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status
            && task.status != status
        {
            return false;
        }
        matches_search(task, &self.search)
    }

    /// Filtered and sorted copy of `tasks`; the input is left untouched.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let mut out: Vec<Task> = tasks.iter().filter(|task| self.matches(task)).cloned().collect();
        sort_tasks(&mut out, self.sort_by);
        out
    }

    pub fn for_project(&self, tasks: &[Task], project_id: &str) -> Vec<Task> {
        self.apply(tasks)
            .into_iter()
            .filter(|task| task.project_id == project_id)
            .collect()
    }

    pub fn for_date(&self, tasks: &[Task], day: NaiveDate) -> Vec<Task> {
        let key = date_key(day);
        self.apply(tasks)
            .into_iter()
            .filter(|task| task.matches_day(&key))
            .collect()
    }
}

/// Case-insensitive substring match against title, description or any tag.
pub fn matches_search(task: &Task, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();

    task.title.to_lowercase().contains(&needle)
        || task
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(&needle))
        || task.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
}

pub fn priority_rank(priority: Option<Priority>) -> u8 {
    match priority {
        Some(Priority::Critical) => 0,
        Some(Priority::High) => 1,
        Some(Priority::Medium) => 2,
        Some(Priority::Low) => 3,
        None => 4,
    }
}

pub fn status_rank(status: Status) -> u8 {
    match status {
        Status::InProgress => 0,
        Status::Pending => 1,
        Status::Completed => 2,
        Status::Archived => 3,
    }
}

fn date_sort_key(task: &Task) -> &str {
    [&task.start_date, &task.end_date]
        .into_iter()
        .filter_map(|value| value.as_deref())
        .find(|value| !value.is_empty())
        .unwrap_or("9999")
}

/// Stable sort; ties keep their incoming relative order.
pub fn sort_tasks(tasks: &mut [Task], sort_by: SortKey) {
    match sort_by {
        SortKey::Priority => {
            tasks.sort_by_key(|task| priority_rank(task.priority));
        }
        SortKey::Date => {
            tasks.sort_by(|a, b| date_sort_key(a).cmp(date_sort_key(b)));
        }
        SortKey::Status => {
            tasks.sort_by_key(|task| status_rank(task.status));
        }
        SortKey::Order => {
            tasks.sort_by_key(Task::order_key);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSummary {
    pub active: usize,
    pub completed: usize,
    pub total: usize,
    pub completion_percent: u8,
    pub focus: Vec<Task>,
}

const FOCUS_LIMIT: usize = 6;

/// Open work due today, highest priority first.
pub fn dashboard_summary(tasks: &[Task], today: NaiveDate) -> DashboardSummary {
    let today_key = date_key(today);
    let is_open = |task: &&Task| !matches!(task.status, Status::Completed | Status::Archived);

    let mut focus: Vec<Task> = tasks
        .iter()
        .filter(is_open)
        .filter(|task| {
            task.execution_day
                .as_deref()
                .filter(|day| !day.is_empty())
                .or(task.end_date.as_deref())
                == Some(today_key.as_str())
        })
        .cloned()
        .collect();
    focus.sort_by(|a, b| priority_rank(a.priority).cmp(&priority_rank(b.priority)));
    focus.truncate(FOCUS_LIMIT);

    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.status == Status::Completed).count();
    let completion_percent = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u8
    };

    DashboardSummary {
        active: tasks.iter().filter(is_open).count(),
        completed,
        total,
        completion_percent,
        focus,
    }
}

const REMINDER_WINDOW_MINUTES: i64 = 15;

/// Open tasks whose reminder falls within the next fifteen minutes.
/// Reminders without an offset are read in `tz`.
pub fn due_reminders<'a>(tasks: &'a [Task], now: DateTime<Utc>, tz: &Tz) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| !matches!(task.status, Status::Completed | Status::Archived))
        .filter(|task| {
            let Some(reminder) = task.reminder.as_deref().and_then(|raw| parse_reminder(raw, tz)) else {
                return false;
            };
            let minutes = (reminder - now).num_minutes();
            reminder >= now && minutes <= REMINDER_WINDOW_MINUTES
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use lifeboard_shared::GENERAL_PROJECT_ID;

    use super::*;

    fn task(id: &str, title: &str) -> Task {
        Task {
            task_id: id.to_string(),
            title: title.to_string(),
            description: None,
            notes: None,
            tags: vec![],
            project_id: GENERAL_PROJECT_ID.to_string(),
            priority: None,
            status: Status::Pending,
            start_date: None,
            end_date: None,
            execution_day: None,
            reminder: None,
            order: None,
            is_archived: false,
            user_id: None,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.task_id.as_str()).collect()
    }

    fn sample() -> Vec<Task> {
        let mut a = task("1", "A");
        a.priority = Some(Priority::High);
        a.order = Some(0);
        let mut b = task("2", "B");
        b.priority = Some(Priority::Critical);
        b.order = Some(1);
        vec![a, b]
    }

    #[test]
    fn priority_sort_puts_critical_first() {
        let filter = TaskFilter {
            sort_by: SortKey::Priority,
            ..TaskFilter::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["2", "1"]);
    }

    #[test]
    fn search_matches_title_case_insensitively() {
        let filter = TaskFilter {
            search: "b".to_string(),
            ..TaskFilter::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec!["2"]);
    }

    #[test]
    fn search_covers_description_and_tags() {
        let mut tagged = task("3", "Groceries");
        tagged.tags = vec!["Errand".to_string()];
        let mut described = task("4", "Call");
        described.description = Some("about the ERRAND list".to_string());
        let other = task("5", "Write");

        let filter = TaskFilter {
            search: "errand".to_string(),
            ..TaskFilter::default()
        };
        assert_eq!(ids(&filter.apply(&[tagged, described, other])), vec!["3", "4"]);
    }

    #[test]
    fn status_filter_returns_subset_with_that_status() {
        let mut tasks = sample();
        tasks[0].status = Status::Completed;
        tasks.push(task("9", "C"));

        let filter = TaskFilter {
            status: Some(Status::Completed),
            ..TaskFilter::default()
        };
        let out = filter.apply(&tasks);
        assert_eq!(ids(&out), vec!["1"]);
        assert!(out.iter().all(|t| t.status == Status::Completed));
        assert!(out.iter().all(|t| tasks.contains(t)));
    }

    #[test]
    fn unknown_priority_and_missing_dates_sort_last() {
        let mut low = task("low", "x");
        low.priority = Some(Priority::Low);
        let unknown = task("unknown", "y");
        let filter = TaskFilter {
            sort_by: SortKey::Priority,
            ..TaskFilter::default()
        };
        assert_eq!(ids(&filter.apply(&[unknown.clone(), low])), vec!["low", "unknown"]);

        let mut dated = task("dated", "z");
        dated.end_date = Some("2026-03-01".to_string());
        let mut started = task("started", "w");
        started.start_date = Some("2026-02-01".to_string());
        started.end_date = Some("2026-04-01".to_string());
        let filter = TaskFilter {
            sort_by: SortKey::Date,
            ..TaskFilter::default()
        };
        assert_eq!(
            ids(&filter.apply(&[unknown, dated, started])),
            vec!["started", "dated", "unknown"]
        );
    }

    #[test]
    fn status_sort_ranks_in_progress_first() {
        let mut done = task("done", "a");
        done.status = Status::Completed;
        let mut doing = task("doing", "b");
        doing.status = Status::InProgress;
        let todo = task("todo", "c");

        let filter = TaskFilter {
            sort_by: SortKey::Status,
            ..TaskFilter::default()
        };
        assert_eq!(ids(&filter.apply(&[done, todo, doing])), vec!["doing", "todo", "done"]);
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        let mut tasks = sample();
        let mut tie = task("3", "tie");
        tie.priority = Some(Priority::High);
        tasks.push(tie);

        for key in [SortKey::Order, SortKey::Priority, SortKey::Date, SortKey::Status] {
            let filter = TaskFilter {
                sort_by: key,
                ..TaskFilter::default()
            };
            let once = filter.apply(&tasks);
            let twice = filter.apply(&once);
            assert_eq!(once, twice, "sort by {key:?}");
        }
    }

    #[test]
    fn date_narrowing_uses_exact_day_equality() {
        let mut exec = task("exec", "a");
        exec.execution_day = Some("2026-02-03".to_string());
        let mut ranged = task("ranged", "b");
        ranged.start_date = Some("2026-02-01".to_string());
        ranged.end_date = Some("2026-02-05".to_string());

        let filter = TaskFilter::default();
        let day = NaiveDate::from_ymd_opt(2026, 2, 3).expect("valid date");
        assert_eq!(ids(&filter.for_date(&[exec, ranged], day)), vec!["exec"]);
    }

    #[test]
    fn project_narrowing_keeps_global_filters() {
        let mut tasks = sample();
        tasks[1].project_id = "p1".to_string();
        let mut done = task("3", "B done");
        done.project_id = "p1".to_string();
        done.status = Status::Completed;
        tasks.push(done);

        let filter = TaskFilter {
            status: Some(Status::Pending),
            search: "b".to_string(),
            ..TaskFilter::default()
        };
        assert_eq!(ids(&filter.for_project(&tasks, "p1")), vec!["2"]);
    }

    #[test]
    fn summary_focuses_on_today_by_priority() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 3).expect("valid date");
        let mut low = task("low", "a");
        low.priority = Some(Priority::Low);
        low.execution_day = Some("2026-02-03".to_string());
        let mut high = task("high", "b");
        high.priority = Some(Priority::High);
        high.end_date = Some("2026-02-03".to_string());
        let mut done = task("done", "c");
        done.status = Status::Completed;
        done.execution_day = Some("2026-02-03".to_string());

        let summary = dashboard_summary(&[low, high, done], today);
        assert_eq!(ids(&summary.focus), vec!["high", "low"]);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.completion_percent, 33);
    }

    #[test]
    fn reminders_fire_inside_window_only() {
        let now = Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).single().expect("valid instant");
        let mut soon = task("soon", "a");
        soon.reminder = Some("2026-02-03T09:10:00Z".to_string());
        let mut later = task("later", "b");
        later.reminder = Some("2026-02-03T10:00:00Z".to_string());
        let mut past = task("past", "c");
        past.reminder = Some("2026-02-03T08:59:00Z".to_string());
        let mut done = task("done", "d");
        done.reminder = Some("2026-02-03T09:05:00Z".to_string());
        done.status = Status::Completed;

        let tasks = [soon, later, past, done];
        let due: Vec<&str> = due_reminders(&tasks, now, &chrono_tz::UTC)
            .into_iter()
            .map(|task| task.task_id.as_str())
            .collect();
        assert_eq!(due, vec!["soon"]);
    }
}
