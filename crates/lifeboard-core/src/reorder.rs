//! Drag gestures and their reconciliation with the remote store.
//!
//! A drop is applied to the store first, then persisted. When persistence
//! fails the configured [`RollbackPolicy`] decides how local state is
//! repaired.

use std::collections::HashSet;
use std::fmt;

use lifeboard_shared::{Project, Task, TaskPatch};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::gateway::{Gateway, GatewayError};
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Drop local guesses and reload everything from the remote store.
    #[default]
    Refetch,
    /// Restore the pre-drop values of entities nobody touched since.
    Snapshot,
}

impl RollbackPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RollbackPolicy::Refetch => "refetch",
            RollbackPolicy::Snapshot => "snapshot",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "refetch" => Some(RollbackPolicy::Refetch),
            "snapshot" => Some(RollbackPolicy::Snapshot),
            _ => None,
        }
    }
}

/// A sortable region of the board.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Container {
    ProjectTasks(String),
    ProjectList,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::ProjectTasks(project_id) => write!(f, "project {project_id}"),
            Container::ProjectList => f.write_str("project list"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem {
    Task(String),
    Project(String),
}

impl DragItem {
    pub fn id(&self) -> &str {
        match self {
            DragItem::Task(id) | DragItem::Project(id) => id,
        }
    }
}

/// What a drop asks the remote store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPlan {
    Reorder {
        project_id: String,
        ordered_ids: Vec<String>,
    },
    Move {
        task_id: String,
        from: String,
        to: String,
        ordered_ids: Vec<String>,
    },
    ReorderProjects {
        ordered_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging { item: DragItem, from: Container },
    Dropped { plan: DropPlan },
    Reconciling { plan: DropPlan },
    Confirmed,
    RolledBack,
}

impl DragPhase {
    fn name(&self) -> &'static str {
        match self {
            DragPhase::Idle => "idle",
            DragPhase::Dragging { .. } => "dragging",
            DragPhase::Dropped { .. } => "dropped",
            DragPhase::Reconciling { .. } => "reconciling",
            DragPhase::Confirmed => "confirmed",
            DragPhase::RolledBack => "rolled back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("cannot {action} while the gesture is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },
    #[error("{0} is missing from the drop target order")]
    MissingItem(String),
    #[error("{item} cannot be dropped on the {target}")]
    IncompatibleTarget { item: String, target: String },
}

/// Single drag gesture, from pick-up to reconciliation.
#[derive(Debug, Clone)]
pub struct DragGesture {
    phase: DragPhase,
}

impl Default for DragGesture {
    fn default() -> Self {
        Self {
            phase: DragPhase::Idle,
        }
    }
}

impl DragGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn start(&mut self, item: DragItem, from: Container) -> Result<(), DragError> {
        match self.phase {
            DragPhase::Idle | DragPhase::Confirmed | DragPhase::RolledBack => {
                debug!(item = item.id(), from = %from, "drag started");
                self.phase = DragPhase::Dragging { item, from };
                Ok(())
            }
            ref other => Err(DragError::InvalidPhase {
                action: "start a drag",
                phase: other.name(),
            }),
        }
    }

    pub fn cancel(&mut self) {
        if matches!(self.phase, DragPhase::Dragging { .. }) {
            self.phase = DragPhase::Idle;
        }
    }

    /// Completes the gesture on `to`, where `ordered_ids` is the final
    /// visual order of that container.
    pub fn drop_on(&mut self, to: Container, ordered_ids: Vec<String>) -> Result<DropPlan, DragError> {
        let DragPhase::Dragging { item, from } = &self.phase else {
            return Err(DragError::InvalidPhase {
                action: "drop",
                phase: self.phase.name(),
            });
        };
        if !ordered_ids.iter().any(|id| id == item.id()) {
            return Err(DragError::MissingItem(item.id().to_string()));
        }

        let plan = match (item, from, &to) {
            (DragItem::Task(task_id), Container::ProjectTasks(source), Container::ProjectTasks(target)) => {
                if source == target {
                    DropPlan::Reorder {
                        project_id: target.clone(),
                        ordered_ids,
                    }
                } else {
                    DropPlan::Move {
                        task_id: task_id.clone(),
                        from: source.clone(),
                        to: target.clone(),
                        ordered_ids,
                    }
                }
            }
            (DragItem::Project(_), Container::ProjectList, Container::ProjectList) => {
                DropPlan::ReorderProjects { ordered_ids }
            }
            (item, _, target) => {
                return Err(DragError::IncompatibleTarget {
                    item: item.id().to_string(),
                    target: target.to_string(),
                });
            }
        };

        self.phase = DragPhase::Dropped { plan: plan.clone() };
        Ok(plan)
    }

    fn begin_reconcile(&mut self) -> Result<DropPlan, DragError> {
        let DragPhase::Dropped { plan } = &self.phase else {
            return Err(DragError::InvalidPhase {
                action: "reconcile",
                phase: self.phase.name(),
            });
        };
        let plan = plan.clone();
        self.phase = DragPhase::Reconciling { plan: plan.clone() };
        Ok(plan)
    }

    fn finish(&mut self, outcome: &DropOutcome) {
        self.phase = match outcome {
            DropOutcome::Confirmed { .. } => DragPhase::Confirmed,
            DropOutcome::RolledBack { .. } => DragPhase::RolledBack,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Persisted. `moved_to` names the destination of a cross-project drop.
    Confirmed { moved_to: Option<String> },
    /// Persisting failed. A successful move step is reported in `moved_to`
    /// even when the order step failed afterwards.
    RolledBack {
        error: GatewayError,
        moved_to: Option<String>,
        refetch: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollbackReport {
    pub restored: usize,
    pub skipped: usize,
}

/// Before and tentative values of everything a drop touched.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    tasks: Vec<(Task, Task)>,
    projects: Vec<(Project, Project)>,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.projects.is_empty()
    }

    /// Applies `edit` to the task in `store`, remembering the old value.
    pub fn stage_task(&mut self, store: &mut StateStore, task_id: &str, edit: impl FnOnce(&mut Task)) -> bool {
        let Some(before) = store.task(task_id).cloned() else {
            return false;
        };
        let mut after = before.clone();
        edit(&mut after);
        if after != before {
            store.upsert_task(after.clone());
            self.tasks.push((before, after));
        }
        true
    }

    pub fn stage_project(
        &mut self,
        store: &mut StateStore,
        project_id: &str,
        edit: impl FnOnce(&mut Project),
    ) -> bool {
        let Some(before) = store.project(project_id).cloned() else {
            return false;
        };
        let mut after = before.clone();
        edit(&mut after);
        if after != before {
            store.upsert_project(after.clone());
            self.projects.push((before, after));
        }
        true
    }

    /// Restores before-images, newest first, for entities whose current
    /// value is still the tentative one. Anything changed since is left
    /// alone.
    pub fn rollback(self, store: &mut StateStore) -> RollbackReport {
        let mut report = RollbackReport::default();
        for (before, after) in self.tasks.into_iter().rev() {
            if store.task(&after.task_id) == Some(&after) {
                store.upsert_task(before);
                report.restored += 1;
            } else {
                debug!(task_id = %after.task_id, "task changed since drop; leaving it");
                report.skipped += 1;
            }
        }
        for (before, after) in self.projects.into_iter().rev() {
            if store.project(&after.project_id) == Some(&after) {
                store.upsert_project(before);
                report.restored += 1;
            } else {
                debug!(project_id = %after.project_id, "project changed since drop; leaving it");
                report.skipped += 1;
            }
        }
        report
    }
}

/// Visible order first, then members of the container that were not shown
/// in their existing order. Ids that do not belong are dropped.
pub fn complete_order(visible: &[String], container: &[String]) -> Vec<String> {
    let members: HashSet<&str> = container.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(container.len());
    for id in visible {
        if members.contains(id.as_str()) && seen.insert(id.as_str()) {
            out.push(id.clone());
        }
    }
    for id in container {
        if seen.insert(id.as_str()) {
            out.push(id.clone());
        }
    }
    out
}

/// Runs drops against a store and gateway pair.
pub struct ReorderCoordinator<'a> {
    store: &'a Mutex<StateStore>,
    gateway: &'a dyn Gateway,
    policy: RollbackPolicy,
}

impl<'a> ReorderCoordinator<'a> {
    pub fn new(store: &'a Mutex<StateStore>, gateway: &'a dyn Gateway, policy: RollbackPolicy) -> Self {
        Self {
            store,
            gateway,
            policy,
        }
    }

    /// Reconciles a dropped gesture and moves it to its final phase.
    pub async fn reconcile(&self, gesture: &mut DragGesture) -> Result<DropOutcome, DragError> {
        let plan = gesture.begin_reconcile()?;
        let outcome = self.execute(&plan).await;
        gesture.finish(&outcome);
        Ok(outcome)
    }

    pub async fn execute(&self, plan: &DropPlan) -> DropOutcome {
        match plan {
            DropPlan::Reorder {
                project_id,
                ordered_ids,
            } => self.reorder_tasks(project_id, ordered_ids).await,
            DropPlan::Move {
                task_id,
                from,
                to,
                ordered_ids,
            } => self.move_task(task_id, from, to, ordered_ids).await,
            DropPlan::ReorderProjects { ordered_ids } => self.reorder_projects(ordered_ids).await,
        }
    }

    fn stage_task_order(&self, project_id: &str, visible: &[String]) -> (Transaction, Vec<String>) {
        let mut store = self.store.lock();
        let ids = complete_order(visible, &store.project_task_ids(project_id));
        let mut tx = Transaction::default();
        for (idx, id) in ids.iter().enumerate() {
            tx.stage_task(&mut store, id, |task| task.order = Some(idx as i64));
        }
        (tx, ids)
    }

    fn fail(&self, error: GatewayError, moved_to: Option<String>, txs: Vec<Transaction>) -> DropOutcome {
        let refetch = self.policy == RollbackPolicy::Refetch;
        if self.policy == RollbackPolicy::Snapshot {
            let mut store = self.store.lock();
            let mut total = RollbackReport::default();
            for tx in txs {
                let report = tx.rollback(&mut store);
                total.restored += report.restored;
                total.skipped += report.skipped;
            }
            info!(restored = total.restored, skipped = total.skipped, "restored drop snapshot");
        }
        warn!(error = %error, policy = self.policy.as_str(), "drop could not be persisted");
        DropOutcome::RolledBack {
            error,
            moved_to,
            refetch,
        }
    }

    async fn reorder_tasks(&self, project_id: &str, visible: &[String]) -> DropOutcome {
        let (tx, ids) = self.stage_task_order(project_id, visible);
        debug!(project_id, count = ids.len(), "persisting task order");
        match self.gateway.reorder_tasks(&ids).await {
            Ok(()) => DropOutcome::Confirmed { moved_to: None },
            Err(err) => self.fail(err, None, vec![tx]),
        }
    }

    async fn move_task(&self, task_id: &str, from: &str, to: &str, visible: &[String]) -> DropOutcome {
        let mut move_tx = Transaction::default();
        {
            let mut store = self.store.lock();
            move_tx.stage_task(&mut store, task_id, |task| task.project_id = to.to_string());
        }
        let (order_tx, ids) = self.stage_task_order(to, visible);

        debug!(task_id, from, to, "persisting cross-project move");
        if let Err(err) = self.gateway.update_task(task_id, &TaskPatch::move_to(to)).await {
            return self.fail(err, None, vec![order_tx, move_tx]);
        }

        // The move stands even if the destination order cannot be saved.
        match self.gateway.reorder_tasks(&ids).await {
            Ok(()) => DropOutcome::Confirmed {
                moved_to: Some(to.to_string()),
            },
            Err(err) => self.fail(err, Some(to.to_string()), vec![order_tx]),
        }
    }

    async fn reorder_projects(&self, visible: &[String]) -> DropOutcome {
        let (tx, ids) = {
            let mut store = self.store.lock();
            let ids = complete_order(visible, &store.project_ids());
            let mut tx = Transaction::default();
            for (idx, id) in ids.iter().enumerate() {
                tx.stage_project(&mut store, id, |project| project.order = Some(idx as i64));
            }
            (tx, ids)
        };

        debug!(count = ids.len(), "persisting project order");
        match self.gateway.reorder_projects(&ids).await {
            Ok(()) => DropOutcome::Confirmed { moved_to: None },
            Err(err) => self.fail(err, None, vec![tx]),
        }
    }
}
