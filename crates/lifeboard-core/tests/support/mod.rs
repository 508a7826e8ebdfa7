#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lifeboard_core::config::EngineSettings;
use lifeboard_core::gateway::{Gateway, GatewayError, GatewayResult, LocalGateway};
use lifeboard_core::prefs::MemoryPreferences;
use lifeboard_core::reorder::RollbackPolicy;
use lifeboard_core::prefs::Theme;
use lifeboard_core::view::{NullSink, ViewModel, ViewSink};
use lifeboard_core::workspace::Workspace;
use lifeboard_shared::{
    Project, ProjectCreate, ProjectPatch, ProjectQuery, Task, TaskCreate, TaskPatch, TaskQuery,
};
use parking_lot::Mutex;
use tempfile::{TempDir, tempdir};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListProjects,
    ListArchivedProjects,
    CreateProject,
    UpdateProject,
    DeleteProject,
    ReorderProjects,
    ListTasks,
    ListArchivedTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    ReorderTasks,
}

/// Local store with scripted failures, a call log and gates that hold a
/// response back until released.
pub struct FakeGateway {
    pub inner: LocalGateway,
    calls: Mutex<Vec<Op>>,
    failures: Mutex<Vec<Op>>,
    gates: Mutex<HashMap<Op, Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new(dir: &Path) -> Self {
        Self {
            inner: LocalGateway::open(dir).expect("open local gateway"),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// The next call of `op` fails with a 500 without touching the store.
    pub fn fail_next(&self, op: Op) {
        self.failures.lock().push(op);
    }

    /// The next call of `op` does its work, then waits for the returned
    /// handle to be notified before answering.
    pub fn gate(&self, op: Op) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(op, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn enter(&self, op: Op) -> Option<GatewayError> {
        self.calls.lock().push(op);
        let mut failures = self.failures.lock();
        let idx = failures.iter().position(|failing| *failing == op)?;
        failures.remove(idx);
        Some(GatewayError::Status {
            status: 500,
            body: format!("injected {op:?} failure"),
        })
    }

    async fn leave<T>(&self, op: Op, result: GatewayResult<T>) -> GatewayResult<T> {
        let gate = self.gates.lock().remove(&op);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }
}

macro_rules! relay {
    ($self:ident, $op:expr, $call:expr) => {{
        let op = $op;
        let result = match $self.enter(op) {
            Some(err) => Err(err),
            None => $call.await,
        };
        $self.leave(op, result).await
    }};
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_projects(&self, query: &ProjectQuery) -> GatewayResult<Vec<Project>> {
        let op = if query.archived { Op::ListArchivedProjects } else { Op::ListProjects };
        relay!(self, op, self.inner.list_projects(query))
    }

    async fn create_project(&self, data: &ProjectCreate) -> GatewayResult<Project> {
        relay!(self, Op::CreateProject, self.inner.create_project(data))
    }

    async fn update_project(&self, project_id: &str, patch: &ProjectPatch) -> GatewayResult<Project> {
        relay!(self, Op::UpdateProject, self.inner.update_project(project_id, patch))
    }

    async fn delete_project(&self, project_id: &str) -> GatewayResult<()> {
        relay!(self, Op::DeleteProject, self.inner.delete_project(project_id))
    }

    async fn reorder_projects(&self, project_ids: &[String]) -> GatewayResult<()> {
        relay!(self, Op::ReorderProjects, self.inner.reorder_projects(project_ids))
    }

    async fn list_tasks(&self, query: &TaskQuery) -> GatewayResult<Vec<Task>> {
        let op = if query.archived { Op::ListArchivedTasks } else { Op::ListTasks };
        relay!(self, op, self.inner.list_tasks(query))
    }

    async fn create_task(&self, data: &TaskCreate) -> GatewayResult<Task> {
        relay!(self, Op::CreateTask, self.inner.create_task(data))
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> GatewayResult<Task> {
        relay!(self, Op::UpdateTask, self.inner.update_task(task_id, patch))
    }

    async fn delete_task(&self, task_id: &str) -> GatewayResult<()> {
        relay!(self, Op::DeleteTask, self.inner.delete_task(task_id))
    }

    async fn reorder_tasks(&self, ordered_ids: &[String]) -> GatewayResult<()> {
        relay!(self, Op::ReorderTasks, self.inner.reorder_tasks(ordered_ids))
    }
}

/// Counts paints and optionally fails every one of them.
#[derive(Clone, Default)]
pub struct CountingSink {
    paints: Arc<AtomicUsize>,
    broken: bool,
}

impl CountingSink {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn paints(&self) -> usize {
        self.paints.load(Ordering::SeqCst)
    }
}

impl ViewSink for CountingSink {
    fn paint(&mut self, _model: &ViewModel, _theme: Theme) -> anyhow::Result<()> {
        self.paints.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            anyhow::bail!("broken pipe");
        }
        Ok(())
    }
}

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub workspace: Workspace,
    _dir: TempDir,
}

impl Harness {
    pub fn new(policy: RollbackPolicy) -> Self {
        Self::with_sink(policy, Box::new(NullSink))
    }

    pub fn with_sink(policy: RollbackPolicy, sink: Box<dyn ViewSink>) -> Self {
        let dir = tempdir().expect("tempdir");
        let gateway = Arc::new(FakeGateway::new(dir.path()));
        let settings = EngineSettings {
            rollback: policy,
            ..EngineSettings::default()
        };
        let workspace = Workspace::new(
            gateway.clone(),
            Arc::new(MemoryPreferences::new()),
            sink,
            &settings,
        );
        Self {
            gateway,
            workspace,
            _dir: dir,
        }
    }

    /// Creates a project straight on the store, bypassing the workspace.
    pub async fn seed_project(&self, name: &str) -> Project {
        self.gateway
            .inner
            .create_project(&ProjectCreate {
                name: name.to_string(),
                ..ProjectCreate::default()
            })
            .await
            .expect("seed project")
    }

    pub async fn seed_task(&self, title: &str, project_id: &str) -> Task {
        self.gateway
            .inner
            .create_task(&TaskCreate {
                title: title.to_string(),
                project_id: Some(project_id.to_string()),
                ..TaskCreate::default()
            })
            .await
            .expect("seed task")
    }

    /// Titles of a project's tasks in the store's persisted order.
    pub async fn server_titles(&self, project_id: &str) -> Vec<String> {
        let query = TaskQuery {
            project_id: Some(project_id.to_string()),
            ..TaskQuery::default()
        };
        let mut tasks = self.gateway.inner.list_tasks(&query).await.expect("list tasks");
        tasks.sort_by_key(Task::order_key);
        tasks.into_iter().map(|task| task.title).collect()
    }

    /// Titles of a project's tasks as the local state orders them.
    pub fn local_titles(&self, project_id: &str) -> Vec<String> {
        let store = self.workspace.store().lock();
        store
            .project_task_ids(project_id)
            .iter()
            .filter_map(|id| store.task(id))
            .map(|task| task.title.clone())
            .collect()
    }

    pub fn task_id(&self, title: &str) -> String {
        let store = self.workspace.store().lock();
        store
            .tasks()
            .iter()
            .chain(store.archived_tasks())
            .find(|task| task.title == title)
            .map(|task| task.task_id.clone())
            .expect("task by title")
    }
}
