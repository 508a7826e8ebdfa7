//! Single owner of the in-memory view of the remote store plus UI state.
//!
//! Every mutation bumps a revision and publishes it on a watch channel, so
//! observers can re-read whatever slice they render.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use lifeboard_shared::{GENERAL_PROJECT_ID, Project, Status, Task};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::calendar::{CalendarMode, first_day_of_month, shift_cursor};
use crate::filter::{SortKey, TaskFilter};
use crate::notify::UndoStack;
use crate::prefs::{KeyValueStore, Preferences, Theme};
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Initial,
    Loaded,
    Tasks,
    Projects,
    View,
    Filter,
    Calendar,
    Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub revision: u64,
    pub kind: ChangeKind,
}

/// Everything a full refresh brings back from the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub archived_projects: Vec<Project>,
    pub archived_tasks: Vec<Task>,
}

/// Sequence number handed out when a refresh starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

pub struct StateStore {
    projects: Vec<Project>,
    tasks: Vec<Task>,
    archived_projects: Vec<Project>,
    archived_tasks: Vec<Task>,
    current_view: View,
    selected_date: NaiveDate,
    calendar_cursor: NaiveDate,
    calendar_mode: CalendarMode,
    week_offset: i32,
    filter: TaskFilter,
    theme: Theme,
    undo: UndoStack,
    next_load: u64,
    applied_load: u64,
    revision: u64,
    changes: watch::Sender<StoreChange>,
    prefs: Arc<dyn KeyValueStore>,
}

impl StateStore {
    /// Builds an empty store with preferences restored from `prefs`.
    pub fn new(prefs: Arc<dyn KeyValueStore>, today: NaiveDate) -> Self {
        let restored = Preferences::load(prefs.as_ref());
        let (changes, _) = watch::channel(StoreChange {
            revision: 0,
            kind: ChangeKind::Initial,
        });
        debug!(
            theme = restored.theme.as_str(),
            sort = restored.sort_by.as_str(),
            view = restored.current_view.as_str(),
            "restored preferences"
        );

        Self {
            projects: Vec::new(),
            tasks: Vec::new(),
            archived_projects: Vec::new(),
            archived_tasks: Vec::new(),
            current_view: restored.current_view,
            selected_date: today,
            calendar_cursor: first_day_of_month(today.year(), today.month()),
            calendar_mode: restored.calendar_mode,
            week_offset: 0,
            filter: TaskFilter {
                sort_by: restored.sort_by,
                ..TaskFilter::default()
            },
            theme: restored.theme,
            undo: UndoStack::default(),
            next_load: 0,
            applied_load: 0,
            revision: 0,
            changes,
            prefs,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn publish(&mut self, kind: ChangeKind) {
        self.revision += 1;
        self.changes.send_replace(StoreChange {
            revision: self.revision,
            kind,
        });
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            theme: self.theme,
            sort_by: self.filter.sort_by,
            current_view: self.current_view,
            calendar_mode: self.calendar_mode,
        }
    }

    // Preference writes never fail an interaction.
    fn persist_preferences(&self) {
        if let Err(err) = self.preferences().save(self.prefs.as_ref()) {
            warn!(error = %format!("{err:#}"), "failed to persist preferences");
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.next_load += 1;
        LoadTicket(self.next_load)
    }

    /// Installs a refresh result unless a later-started refresh already
    /// landed. Returns whether the snapshot was applied.
    pub fn apply_load(&mut self, ticket: LoadTicket, snapshot: RemoteSnapshot) -> bool {
        if ticket.0 <= self.applied_load {
            warn!(
                sequence = ticket.0,
                applied = self.applied_load,
                "discarding stale refresh"
            );
            return false;
        }

        self.applied_load = ticket.0;
        self.projects = snapshot.projects;
        self.tasks = snapshot.tasks;
        self.archived_projects = snapshot.archived_projects;
        self.archived_tasks = snapshot.archived_tasks;
        self.projects.sort_by_key(Project::order_key);
        self.tasks.sort_by_key(Task::order_key);

        let repaired = self.reassign_orphans();
        info!(
            sequence = ticket.0,
            projects = self.projects.len(),
            tasks = self.tasks.len(),
            archived_tasks = self.archived_tasks.len(),
            repaired,
            "refresh applied"
        );
        self.publish(ChangeKind::Loaded);
        true
    }

    /// Points tasks at `general` when their project is unknown.
    fn reassign_orphans(&mut self) -> usize {
        if self.projects.is_empty() {
            return 0;
        }
        let known: HashSet<&str> = self
            .projects
            .iter()
            .chain(self.archived_projects.iter())
            .map(|project| project.project_id.as_str())
            .collect();

        let mut orphans = Vec::new();
        for task in &self.tasks {
            let project_id = task.project_id.as_str();
            if project_id != GENERAL_PROJECT_ID && !known.contains(project_id) {
                orphans.push(task.task_id.clone());
            }
        }
        for task in self.tasks.iter_mut() {
            if orphans.contains(&task.task_id) {
                debug!(task_id = %task.task_id, from = %task.project_id, "reassigning orphan task");
                task.project_id = GENERAL_PROJECT_ID.to_string();
            }
        }
        orphans.len()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn archived_projects(&self) -> &[Project] {
        &self.archived_projects
    }

    pub fn archived_tasks(&self) -> &[Task] {
        &self.archived_tasks
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.task_id == task_id)
    }

    /// Looks in both the active and the archived lists.
    pub fn any_task(&self, task_id: &str) -> Option<&Task> {
        self.task(task_id)
            .or_else(|| self.archived_tasks.iter().find(|task| task.task_id == task_id))
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|project| project.project_id == project_id)
    }

    pub fn any_project(&self, project_id: &str) -> Option<&Project> {
        self.project(project_id).or_else(|| {
            self.archived_projects
                .iter()
                .find(|project| project.project_id == project_id)
        })
    }

    pub fn project_name(&self, project_id: &str) -> String {
        self.any_project(project_id)
            .map(|project| project.name.clone())
            .unwrap_or_else(|| project_id.to_string())
    }

    /// Task ids of one project in their current manual order.
    pub fn project_task_ids(&self, project_id: &str) -> Vec<String> {
        let mut owned: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| task.project_id == project_id)
            .collect();
        owned.sort_by_key(|task| task.order_key());
        owned.into_iter().map(|task| task.task_id.clone()).collect()
    }

    pub fn project_ids(&self) -> Vec<String> {
        let mut active: Vec<&Project> = self.projects.iter().collect();
        active.sort_by_key(|project| project.order_key());
        active
            .into_iter()
            .map(|project| project.project_id.clone())
            .collect()
    }

    /// Inserts or replaces a task, filing it by its archived flag.
    pub fn upsert_task(&mut self, task: Task) {
        self.tasks.retain(|existing| existing.task_id != task.task_id);
        self.archived_tasks
            .retain(|existing| existing.task_id != task.task_id);
        if task.is_archived {
            self.archived_tasks.push(task);
        } else {
            self.tasks.push(task);
        }
        self.publish(ChangeKind::Tasks);
    }

    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let removed = take_where(&mut self.tasks, |task| task.task_id == task_id)
            .or_else(|| take_where(&mut self.archived_tasks, |task| task.task_id == task_id));
        if removed.is_some() {
            self.publish(ChangeKind::Tasks);
        }
        removed
    }

    pub fn upsert_project(&mut self, project: Project) {
        self.projects
            .retain(|existing| existing.project_id != project.project_id);
        self.archived_projects
            .retain(|existing| existing.project_id != project.project_id);
        if project.archived {
            self.archived_projects.push(project);
        } else {
            self.projects.push(project);
        }
        self.publish(ChangeKind::Projects);
    }

    pub fn remove_project(&mut self, project_id: &str) -> Option<Project> {
        let removed = take_where(&mut self.projects, |project| project.project_id == project_id)
            .or_else(|| {
                take_where(&mut self.archived_projects, |project| {
                    project.project_id == project_id
                })
            });
        if removed.is_some() {
            self.publish(ChangeKind::Projects);
        }
        removed
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        self.filter.apply(&self.tasks)
    }

    pub fn set_sort(&mut self, sort_by: SortKey) {
        self.filter.sort_by = sort_by;
        self.persist_preferences();
        self.publish(ChangeKind::Filter);
    }

    pub fn set_status_filter(&mut self, status: Option<Status>) {
        self.filter.status = status;
        self.publish(ChangeKind::Filter);
    }

    pub fn set_search(&mut self, query: &str) {
        self.filter.search = query.trim().to_string();
        self.publish(ChangeKind::Filter);
    }

    pub fn current_view(&self) -> View {
        self.current_view
    }

    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
        self.persist_preferences();
        self.publish(ChangeKind::View);
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn select_date(&mut self, day: NaiveDate) {
        self.selected_date = day;
        self.publish(ChangeKind::Calendar);
    }

    pub fn calendar_cursor(&self) -> NaiveDate {
        self.calendar_cursor
    }

    pub fn calendar_mode(&self) -> CalendarMode {
        self.calendar_mode
    }

    pub fn set_calendar_mode(&mut self, mode: CalendarMode) {
        self.calendar_mode = mode;
        self.persist_preferences();
        self.publish(ChangeKind::Calendar);
    }

    pub fn shift_calendar(&mut self, step: i32) {
        self.calendar_cursor = shift_cursor(self.calendar_cursor, self.calendar_mode, step);
        self.publish(ChangeKind::Calendar);
    }

    pub fn reset_calendar(&mut self, today: NaiveDate) {
        self.calendar_cursor = match self.calendar_mode {
            CalendarMode::Month => first_day_of_month(today.year(), today.month()),
            CalendarMode::Week => today,
        };
        self.publish(ChangeKind::Calendar);
    }

    pub fn week_offset(&self) -> i32 {
        self.week_offset
    }

    pub fn shift_week(&mut self, delta: i32) {
        self.week_offset = self.week_offset.saturating_add(delta);
        self.publish(ChangeKind::Calendar);
    }

    pub fn reset_week(&mut self) {
        self.week_offset = 0;
        self.publish(ChangeKind::Calendar);
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.persist_preferences();
        self.publish(ChangeKind::Theme);
        self.theme
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn undo_stack_mut(&mut self) -> &mut UndoStack {
        &mut self.undo
    }
}

fn take_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Option<T> {
    let idx = items.iter().position(pred)?;
    Some(items.remove(idx))
}
