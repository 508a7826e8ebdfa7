//! User-facing operations over the store and the remote gateway.
//!
//! Store locks are only ever held between awaits, never across one.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use lifeboard_shared::{
    Project, ProjectCreate, ProjectPatch, ProjectQuery, Status, Task, TaskCreate, TaskPatch,
    TaskQuery, is_reserved_project,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::calendar::{CalendarMode, resolve_timezone, today_in};
use crate::config::EngineSettings;
use crate::debounce::Debouncer;
use crate::filter::{DashboardSummary, SortKey, dashboard_summary, due_reminders};
use crate::gateway::{Gateway, GatewayError};
use crate::notify::{NotificationKind, Notifier, NotifyOptions, Toast, UndoError, UndoInverse};
use crate::prefs::{KeyValueStore, Theme};
use crate::reorder::{
    Container, DragError, DragGesture, DragItem, DropOutcome, ReorderCoordinator, RollbackPolicy,
    Transaction,
};
use crate::store::{RemoteSnapshot, StateStore};
use crate::view::{RenderReport, ViewController, ViewSink, ViewTrigger};

const LOAD_FAILED: &str = "Could not load tasks. Is the server running?";
const REMINDER_DELAY: Duration = Duration::from_secs(10);
const CONVERTED_PROJECT_ICON: &str = "🗂️";
const CONVERTED_PROJECT_COLOR: &str = "#8b5cf6";

/// Blocking yes/no prompt shown before destructive actions.
pub trait Confirm {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str, &str) -> bool,
{
    fn confirm(&self, title: &str, message: &str) -> bool {
        self(title, message)
    }
}

/// Answers yes to every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _title: &str, _message: &str) -> bool {
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("{0}")]
    Invalid(String),
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("project {0} not found")]
    ProjectNotFound(String),
    #[error("project {0} is reserved and cannot be removed or archived")]
    ReservedProject(String),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error(transparent)]
    Undo(#[from] UndoError),
    #[error(transparent)]
    Drag(#[from] DragError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Render(#[from] anyhow::Error),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Requests a renderer can make without knowing how they are carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Complete(String),
    Reopen(String),
    Delete(String),
    Archive(String),
    Unarchive(String),
    ConvertToProject(String),
    MoveTask {
        task_id: String,
        project_id: String,
        position: Option<usize>,
    },
    MoveProject {
        project_id: String,
        position: usize,
    },
    DeleteProject(String),
    ArchiveProject(String),
    UnarchiveProject(String),
    ClearArchive,
    Navigate(ViewTrigger),
    ToggleTheme,
    Undo(Uuid),
}

// Paint requests collected while a command runs.
#[derive(Debug, Default)]
struct PaintHold {
    held: bool,
    pending: bool,
}

pub struct Workspace {
    store: Arc<Mutex<StateStore>>,
    gateway: Arc<dyn Gateway>,
    notifier: Mutex<Notifier>,
    views: Mutex<ViewController>,
    sink: Mutex<Box<dyn ViewSink>>,
    paints: Mutex<PaintHold>,
    debouncer: Debouncer,
    reminded: Mutex<HashSet<(String, String)>>,
    policy: RollbackPolicy,
    timezone: Tz,
}

impl Workspace {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        prefs: Arc<dyn KeyValueStore>,
        sink: Box<dyn ViewSink>,
        settings: &EngineSettings,
    ) -> Self {
        let timezone = resolve_timezone(settings.calendar_timezone.as_deref());
        let today = today_in(&timezone, Utc::now());
        Self {
            store: Arc::new(Mutex::new(StateStore::new(prefs, today))),
            gateway,
            notifier: Mutex::new(Notifier::new(settings.notify_delay, settings.undo_delay)),
            views: Mutex::new(ViewController::new()),
            sink: Mutex::new(sink),
            paints: Mutex::new(PaintHold::default()),
            debouncer: Debouncer::new(settings.search_debounce),
            reminded: Mutex::new(HashSet::new()),
            policy: settings.rollback,
            timezone,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<StateStore>> {
        &self.store
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn today(&self) -> NaiveDate {
        today_in(&self.timezone, Utc::now())
    }

    /// First load and paint.
    pub async fn init(&self) -> WorkspaceResult<RenderReport> {
        self.load_data().await;
        self.check_reminders(Utc::now());
        self.render()
    }

    /// Fetches projects and tasks, active and archived, concurrently.
    /// Returns whether the result was installed.
    pub async fn load_data(&self) -> bool {
        let ticket = self.store.lock().begin_load();
        debug!(sequence = ticket.sequence(), "refresh started");

        let active_tasks = TaskQuery::default();
        let archived_tasks = TaskQuery::archived();
        let (projects, tasks, archived_projects, archived) = tokio::join!(
            self.gateway.list_projects(&ProjectQuery { archived: false }),
            self.gateway.list_tasks(&active_tasks),
            self.gateway.list_projects(&ProjectQuery { archived: true }),
            self.gateway.list_tasks(&archived_tasks),
        );

        let (projects, tasks) = match (projects, tasks) {
            (Ok(projects), Ok(tasks)) => (projects, tasks),
            (Err(err), _) | (_, Err(err)) => {
                error!(error = %err, sequence = ticket.sequence(), "refresh failed");
                self.notify(LOAD_FAILED, NotificationKind::Error, NotifyOptions::default());
                return false;
            }
        };
        let archived_projects = archived_projects.unwrap_or_else(|err| {
            warn!(error = %err, "archived projects unavailable");
            Vec::new()
        });
        let archived_tasks = archived.unwrap_or_else(|err| {
            warn!(error = %err, "archived tasks unavailable");
            Vec::new()
        });

        self.store.lock().apply_load(
            ticket,
            RemoteSnapshot {
                projects,
                tasks,
                archived_projects,
                archived_tasks,
            },
        )
    }

    pub async fn refresh(&self) -> WorkspaceResult<RenderReport> {
        self.load_data().await;
        self.render()
    }

    pub fn render(&self) -> WorkspaceResult<RenderReport> {
        let today = self.today();
        let store = self.store.lock();
        let mut views = self.views.lock();
        let mut sink = self.sink.lock();
        let mut hold = self.paints.lock();
        if hold.held {
            hold.pending = true;
            return Ok(views.sync(&store, today, &mut **sink));
        }
        Ok(views.render(&store, today, &mut **sink)?)
    }

    /// Collects paints until [`release_paints`](Self::release_paints).
    pub fn hold_paints(&self) {
        self.paints.lock().held = true;
    }

    /// Ends a hold and paints once if anything asked to.
    pub fn release_paints(&self) -> WorkspaceResult<Option<RenderReport>> {
        let pending = {
            let mut hold = self.paints.lock();
            hold.held = false;
            std::mem::take(&mut hold.pending)
        };
        if pending { self.render().map(Some) } else { Ok(None) }
    }

    // A failed paint must not strand an optimistic change.
    fn repaint(&self) {
        if let Err(err) = self.render() {
            warn!(error = %err, "paint failed");
        }
    }

    pub fn notify(&self, message: impl Into<String>, kind: NotificationKind, options: NotifyOptions) -> Toast {
        let toast = {
            let mut store = self.store.lock();
            self.notifier
                .lock()
                .notify(message, kind, options, store.undo_stack_mut(), Utc::now())
        };
        self.sink.lock().toast(&toast);
        toast
    }

    pub fn visible_toasts(&self, now: DateTime<Utc>) -> Vec<Toast> {
        self.notifier.lock().visible(now).into_iter().cloned().collect()
    }

    /// Drops expired prompts and the undo commands behind them.
    pub fn expire_toasts(&self, now: DateTime<Utc>) -> Vec<Toast> {
        let pruned = self.store.lock().undo_stack_mut().prune(now);
        let expired = self.notifier.lock().expire(now);
        if pruned > 0 || !expired.is_empty() {
            debug!(pruned, expired = expired.len(), "expired notifications");
        }
        expired
    }

    // Repairs local state after a failed optimistic write.
    async fn recover(&self, tx: Transaction) {
        match self.policy {
            RollbackPolicy::Snapshot => {
                let report = tx.rollback(&mut self.store.lock());
                debug!(restored = report.restored, skipped = report.skipped, "snapshot restored");
            }
            RollbackPolicy::Refetch => {
                self.load_data().await;
            }
        }
    }

    fn require_task(&self, task_id: &str) -> WorkspaceResult<Task> {
        self.store
            .lock()
            .any_task(task_id)
            .cloned()
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))
    }

    fn require_project(&self, project_id: &str) -> WorkspaceResult<Project> {
        self.store
            .lock()
            .any_project(project_id)
            .cloned()
            .ok_or_else(|| WorkspaceError::ProjectNotFound(project_id.to_string()))
    }

    fn fail<T>(&self, message: &str, err: GatewayError) -> WorkspaceResult<T> {
        error!(error = %err, "{message}");
        self.notify(message, NotificationKind::Error, NotifyOptions::default());
        Err(err.into())
    }

    pub async fn create_task(&self, data: TaskCreate) -> WorkspaceResult<Task> {
        if data.title.trim().is_empty() {
            return Err(WorkspaceError::Invalid("Task title is required".to_string()));
        }
        match self.gateway.create_task(&data).await {
            Ok(task) => {
                info!(task_id = %task.task_id, "task created");
                self.notify("Task created", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(task)
            }
            Err(err) => self.fail("Failed to create task", err),
        }
    }

    pub async fn update_task(&self, task_id: &str, patch: TaskPatch) -> WorkspaceResult<Task> {
        if patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(WorkspaceError::Invalid("Task title is required".to_string()));
        }
        if patch.is_empty() {
            return Err(WorkspaceError::Invalid("Nothing to update".to_string()));
        }
        self.require_task(task_id)?;
        match self.gateway.update_task(task_id, &patch).await {
            Ok(task) => {
                self.notify("Task updated", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(task)
            }
            Err(err) => self.fail("Failed to update task", err),
        }
    }

    pub async fn complete(&self, task_id: &str) -> WorkspaceResult<Task> {
        self.set_status(task_id, Status::Completed, "Task completed").await
    }

    pub async fn reopen(&self, task_id: &str) -> WorkspaceResult<Task> {
        self.set_status(task_id, Status::Pending, "Task reopened").await
    }

    async fn set_status(&self, task_id: &str, status: Status, done_message: &str) -> WorkspaceResult<Task> {
        let previous = self
            .store
            .lock()
            .task(task_id)
            .cloned()
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;
        if previous.status == status {
            return Ok(previous);
        }

        let mut tx = Transaction::default();
        tx.stage_task(&mut self.store.lock(), task_id, |task| task.status = status);
        self.repaint();

        match self.gateway.update_task(task_id, &TaskPatch::status(status)).await {
            Ok(updated) => {
                self.notify(
                    done_message,
                    NotificationKind::Success,
                    NotifyOptions::with_undo(UndoInverse::RestoreStatus {
                        task_id: task_id.to_string(),
                        status: previous.status,
                    }),
                );
                self.refresh().await?;
                Ok(updated)
            }
            Err(err) => {
                self.recover(tx).await;
                self.repaint();
                self.fail("Failed to update task", err)
            }
        }
    }

    /// Deletes after confirmation. `Ok(false)` means the user declined.
    pub async fn delete_task(&self, task_id: &str, confirm: &dyn Confirm) -> WorkspaceResult<bool> {
        let task = self.require_task(task_id)?;
        let message = format!("\"{}\" will be permanently deleted.", task.title);
        if !confirm.confirm("Delete Task?", &message) {
            debug!(task_id, "delete declined");
            return Ok(false);
        }

        match self.gateway.delete_task(task_id).await {
            Ok(()) => {
                self.store.lock().remove_task(task_id);
                self.notify(
                    "Task deleted",
                    NotificationKind::Success,
                    NotifyOptions::with_undo(UndoInverse::Recreate {
                        payload: TaskCreate::from(&task),
                    }),
                );
                self.refresh().await?;
                Ok(true)
            }
            Err(err) => self.fail("Failed to delete task", err),
        }
    }

    pub async fn archive_task(&self, task_id: &str) -> WorkspaceResult<Task> {
        self.require_task(task_id)?;
        match self.gateway.update_task(task_id, &TaskPatch::archived(true)).await {
            Ok(task) => {
                self.notify("Task archived", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(task)
            }
            Err(err) => self.fail("Failed to archive task", err),
        }
    }

    pub async fn unarchive_task(&self, task_id: &str) -> WorkspaceResult<Task> {
        self.require_task(task_id)?;
        match self.gateway.update_task(task_id, &TaskPatch::archived(false)).await {
            Ok(task) => {
                self.notify("Task restored", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(task)
            }
            Err(err) => self.fail("Failed to restore task", err),
        }
    }

    /// Creates a project named after the task and files the task under it.
    pub async fn convert_to_project(&self, task_id: &str) -> WorkspaceResult<Project> {
        let task = self.require_task(task_id)?;
        let data = ProjectCreate {
            name: task.title.clone(),
            icon: Some(CONVERTED_PROJECT_ICON.to_string()),
            color: Some(CONVERTED_PROJECT_COLOR.to_string()),
            description: task.description.clone(),
            tags: task.tags.clone(),
        };
        let project = match self.gateway.create_project(&data).await {
            Ok(project) => project,
            Err(err) => return self.fail("Failed to convert task to project", err),
        };

        let patch = TaskPatch::move_to(&project.project_id);
        if let Err(err) = self.gateway.update_task(task_id, &patch).await {
            warn!(task_id, project_id = %project.project_id, error = %err, "project created but task not moved");
            self.notify(
                "Project created, but the task could not be moved into it",
                NotificationKind::Warning,
                NotifyOptions::default(),
            );
        } else {
            self.notify(
                format!("\"{}\" converted to project", task.title),
                NotificationKind::Success,
                NotifyOptions::default(),
            );
        }
        self.refresh().await?;
        Ok(project)
    }

    pub async fn create_project(&self, data: ProjectCreate) -> WorkspaceResult<Project> {
        if data.name.trim().is_empty() {
            return Err(WorkspaceError::Invalid("Project name is required".to_string()));
        }
        match self.gateway.create_project(&data).await {
            Ok(project) => {
                self.notify("Project created", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(project)
            }
            Err(err) => self.fail("Failed to create project", err),
        }
    }

    pub async fn update_project(&self, project_id: &str, patch: ProjectPatch) -> WorkspaceResult<Project> {
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(WorkspaceError::Invalid("Project name is required".to_string()));
        }
        if patch.is_empty() {
            return Err(WorkspaceError::Invalid("Nothing to update".to_string()));
        }
        if patch.archived == Some(true) && is_reserved_project(project_id) {
            return Err(WorkspaceError::ReservedProject(project_id.to_string()));
        }
        self.require_project(project_id)?;
        match self.gateway.update_project(project_id, &patch).await {
            Ok(project) => {
                self.notify("Project updated", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(project)
            }
            Err(err) => self.fail("Failed to update project", err),
        }
    }

    /// Deletes a project; its tasks move to `general` on the remote side.
    pub async fn delete_project(&self, project_id: &str, confirm: &dyn Confirm) -> WorkspaceResult<bool> {
        if is_reserved_project(project_id) {
            return Err(WorkspaceError::ReservedProject(project_id.to_string()));
        }
        let project = self.require_project(project_id)?;
        let count = self.store.lock().project_task_ids(project_id).len();
        let message = format!(
            "\"{}\" will be deleted. Its {} task{} will move to General.",
            project.name,
            count,
            if count == 1 { "" } else { "s" }
        );
        if !confirm.confirm("Delete Project?", &message) {
            return Ok(false);
        }

        match self.gateway.delete_project(project_id).await {
            Ok(()) => {
                self.store.lock().remove_project(project_id);
                self.notify("Project deleted", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(true)
            }
            Err(err) => self.fail("Failed to delete project", err),
        }
    }

    pub async fn archive_project(&self, project_id: &str) -> WorkspaceResult<Project> {
        if is_reserved_project(project_id) {
            return Err(WorkspaceError::ReservedProject(project_id.to_string()));
        }
        self.require_project(project_id)?;
        match self
            .gateway
            .update_project(project_id, &ProjectPatch::archived(true))
            .await
        {
            Ok(project) => {
                self.notify("Project archived", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(project)
            }
            Err(err) => self.fail("Failed to archive project", err),
        }
    }

    pub async fn unarchive_project(&self, project_id: &str) -> WorkspaceResult<Project> {
        self.require_project(project_id)?;
        match self
            .gateway
            .update_project(project_id, &ProjectPatch::archived(false))
            .await
        {
            Ok(project) => {
                self.notify("Project restored", NotificationKind::Success, NotifyOptions::default());
                self.refresh().await?;
                Ok(project)
            }
            Err(err) => self.fail("Failed to restore project", err),
        }
    }

    /// Permanently removes every archived task and non-reserved archived
    /// project. Returns how many entities were deleted.
    pub async fn clear_archive(&self, confirm: &dyn Confirm) -> WorkspaceResult<usize> {
        let (task_ids, project_ids) = {
            let store = self.store.lock();
            let task_ids: Vec<String> = store
                .archived_tasks()
                .iter()
                .map(|task| task.task_id.clone())
                .collect();
            let project_ids: Vec<String> = store
                .archived_projects()
                .iter()
                .filter(|project| !project.is_reserved())
                .map(|project| project.project_id.clone())
                .collect();
            (task_ids, project_ids)
        };

        let total = task_ids.len() + project_ids.len();
        if total == 0 {
            self.notify("Archive is already empty", NotificationKind::Info, NotifyOptions::default());
            return Ok(0);
        }
        let message = format!("{total} archived item(s) will be permanently deleted.");
        if !confirm.confirm("Clear Archive?", &message) {
            return Ok(0);
        }

        let mut deleted = 0;
        let mut failed = 0;
        for task_id in &task_ids {
            match self.gateway.delete_task(task_id).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "could not delete archived task");
                    failed += 1;
                }
            }
        }
        for project_id in &project_ids {
            match self.gateway.delete_project(project_id).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!(project_id = %project_id, error = %err, "could not delete archived project");
                    failed += 1;
                }
            }
        }

        info!(deleted, failed, "archive cleared");
        if failed == 0 {
            self.notify("Archive cleared", NotificationKind::Success, NotifyOptions::default());
        } else {
            self.notify(
                format!("Cleared {deleted} item(s); {failed} could not be deleted"),
                NotificationKind::Warning,
                NotifyOptions::default(),
            );
        }
        self.refresh().await?;
        Ok(deleted)
    }

    /// Reconciles a dropped gesture with the remote store.
    pub async fn handle_drop(&self, gesture: &mut DragGesture) -> WorkspaceResult<DropOutcome> {
        let coordinator = ReorderCoordinator::new(&self.store, self.gateway.as_ref(), self.policy);
        let outcome = coordinator.reconcile(gesture).await?;

        match &outcome {
            DropOutcome::Confirmed { moved_to: Some(project_id) } => {
                let name = self.store.lock().project_name(project_id);
                self.notify(format!("Moved to {name}"), NotificationKind::Success, NotifyOptions::default());
            }
            DropOutcome::Confirmed { moved_to: None } => {}
            DropOutcome::RolledBack { moved_to, refetch, .. } => {
                let message = if moved_to.is_some() {
                    "Task moved, but its position could not be saved"
                } else {
                    "Could not save the new order"
                };
                self.notify(message, NotificationKind::Error, NotifyOptions::default());
                if *refetch {
                    self.load_data().await;
                }
            }
        }
        self.render()?;
        Ok(outcome)
    }

    /// Moves a task into `project_id` at `position` (end when `None`).
    pub async fn move_task(
        &self,
        task_id: &str,
        project_id: &str,
        position: Option<usize>,
    ) -> WorkspaceResult<DropOutcome> {
        let (from, ordered) = {
            let store = self.store.lock();
            let task = store
                .task(task_id)
                .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;
            if store.project(project_id).is_none() {
                return Err(WorkspaceError::ProjectNotFound(project_id.to_string()));
            }
            let mut ordered: Vec<String> = store
                .project_task_ids(project_id)
                .into_iter()
                .filter(|id| id != task_id)
                .collect();
            let at = position.unwrap_or(ordered.len()).min(ordered.len());
            ordered.insert(at, task_id.to_string());
            (task.project_id.clone(), ordered)
        };

        let mut gesture = DragGesture::new();
        gesture.start(DragItem::Task(task_id.to_string()), Container::ProjectTasks(from))?;
        gesture.drop_on(Container::ProjectTasks(project_id.to_string()), ordered)?;
        self.handle_drop(&mut gesture).await
    }

    pub async fn move_project(&self, project_id: &str, position: usize) -> WorkspaceResult<DropOutcome> {
        let ordered = {
            let store = self.store.lock();
            if store.project(project_id).is_none() {
                return Err(WorkspaceError::ProjectNotFound(project_id.to_string()));
            }
            let mut ordered: Vec<String> = store
                .project_ids()
                .into_iter()
                .filter(|id| id != project_id)
                .collect();
            ordered.insert(position.min(ordered.len()), project_id.to_string());
            ordered
        };

        let mut gesture = DragGesture::new();
        gesture.start(DragItem::Project(project_id.to_string()), Container::ProjectList)?;
        gesture.drop_on(Container::ProjectList, ordered)?;
        self.handle_drop(&mut gesture).await
    }

    /// Runs an undo command while its window is open.
    pub async fn undo_at(&self, undo_id: Uuid, now: DateTime<Utc>) -> WorkspaceResult<()> {
        let command = self.store.lock().undo_stack_mut().take(undo_id, now)?;
        self.notifier.lock().dismiss_undo(undo_id);
        debug!(undo_id = %undo_id, label = %command.label, "undoing");

        let result = match &command.inverse {
            UndoInverse::RestoreStatus { task_id, status } => self
                .gateway
                .update_task(task_id, &TaskPatch::status(*status))
                .await
                .map(|_| ()),
            UndoInverse::Recreate { payload } => self.gateway.create_task(payload).await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                self.notify("Undone", NotificationKind::Info, NotifyOptions::default());
                self.refresh().await?;
                Ok(())
            }
            Err(err) => self.fail("Undo failed", err),
        }
    }

    pub async fn undo(&self, undo_id: Uuid) -> WorkspaceResult<()> {
        self.undo_at(undo_id, Utc::now()).await
    }

    /// Undoes the most recent action that can still be undone.
    pub async fn undo_latest(&self) -> WorkspaceResult<()> {
        let now = Utc::now();
        let latest = self.store.lock().undo_stack().latest_live(now).map(|command| command.id);
        match latest {
            Some(undo_id) => self.undo_at(undo_id, now).await,
            None => Err(WorkspaceError::NothingToUndo),
        }
    }

    pub async fn search(&self, query: &str) -> WorkspaceResult<bool> {
        if !self.debouncer.settle().await {
            return Ok(false);
        }
        self.store.lock().set_search(query);
        self.refresh().await?;
        Ok(true)
    }

    pub fn set_sort(&self, sort_by: SortKey) -> WorkspaceResult<RenderReport> {
        self.store.lock().set_sort(sort_by);
        self.render()
    }

    pub fn set_status_filter(&self, status: Option<Status>) -> WorkspaceResult<RenderReport> {
        self.store.lock().set_status_filter(status);
        self.render()
    }

    pub fn navigate(&self, trigger: ViewTrigger) -> WorkspaceResult<RenderReport> {
        {
            let mut store = self.store.lock();
            self.views.lock().transition(&mut store, trigger);
        }
        self.render()
    }

    pub fn shift_calendar(&self, step: i32) -> WorkspaceResult<RenderReport> {
        self.store.lock().shift_calendar(step);
        self.render()
    }

    pub fn calendar_today(&self) -> WorkspaceResult<RenderReport> {
        let today = self.today();
        {
            let mut store = self.store.lock();
            store.reset_calendar(today);
            store.reset_week();
            store.select_date(today);
        }
        self.render()
    }

    pub fn set_calendar_mode(&self, mode: CalendarMode) -> WorkspaceResult<RenderReport> {
        let today = self.today();
        {
            let mut store = self.store.lock();
            store.set_calendar_mode(mode);
            store.reset_calendar(today);
        }
        self.render()
    }

    pub fn shift_week(&self, delta: i32) -> WorkspaceResult<RenderReport> {
        self.store.lock().shift_week(delta);
        self.render()
    }

    pub fn select_date(&self, day: NaiveDate) -> WorkspaceResult<RenderReport> {
        self.store.lock().select_date(day);
        self.render()
    }

    pub fn toggle_theme(&self) -> WorkspaceResult<Theme> {
        let theme = self.store.lock().toggle_theme();
        self.render()?;
        Ok(theme)
    }

    pub fn summary(&self) -> DashboardSummary {
        dashboard_summary(self.store.lock().tasks(), self.today())
    }

    /// Warns once per task and reminder time about reminders due soon.
    pub fn check_reminders(&self, now: DateTime<Utc>) -> Vec<Task> {
        let due: Vec<Task> = {
            let store = self.store.lock();
            due_reminders(store.tasks(), now, &self.timezone).into_iter().cloned().collect()
        };

        let mut fresh = Vec::new();
        for task in due {
            let key = (task.task_id.clone(), task.reminder.clone().unwrap_or_default());
            if !self.reminded.lock().insert(key) {
                continue;
            }
            self.notify(
                format!("⏰ Reminder: {}", task.title),
                NotificationKind::Warning,
                NotifyOptions::with_delay(REMINDER_DELAY),
            );
            fresh.push(task);
        }
        fresh
    }

    /// Single entry point for renderer intents.
    pub async fn dispatch(&self, intent: Intent, confirm: &dyn Confirm) -> WorkspaceResult<()> {
        debug!(intent = ?intent, "dispatch");
        match intent {
            Intent::Complete(id) => self.complete(&id).await.map(drop),
            Intent::Reopen(id) => self.reopen(&id).await.map(drop),
            Intent::Delete(id) => self.delete_task(&id, confirm).await.map(drop),
            Intent::Archive(id) => self.archive_task(&id).await.map(drop),
            Intent::Unarchive(id) => self.unarchive_task(&id).await.map(drop),
            Intent::ConvertToProject(id) => self.convert_to_project(&id).await.map(drop),
            Intent::MoveTask {
                task_id,
                project_id,
                position,
            } => self.move_task(&task_id, &project_id, position).await.map(drop),
            Intent::MoveProject { project_id, position } => {
                self.move_project(&project_id, position).await.map(drop)
            }
            Intent::DeleteProject(id) => self.delete_project(&id, confirm).await.map(drop),
            Intent::ArchiveProject(id) => self.archive_project(&id).await.map(drop),
            Intent::UnarchiveProject(id) => self.unarchive_project(&id).await.map(drop),
            Intent::ClearArchive => self.clear_archive(confirm).await.map(drop),
            Intent::Navigate(trigger) => self.navigate(trigger).map(drop),
            Intent::ToggleTheme => self.toggle_theme().map(drop),
            Intent::Undo(undo_id) => self.undo(undo_id).await,
        }
    }
}
