use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use lifeboard_shared::{
    GENERAL_PROJECT_ID, Priority, Project, ProjectCreate, ProjectPatch, ProjectQuery, Status, Task,
    TaskCreate, TaskPatch, TaskQuery,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Gateway, GatewayError, GatewayResult};
use crate::filter::matches_search;

/// Directory-backed store with the same semantics as the HTTP service.
///
/// Projects and tasks live in two JSONL files that are rewritten atomically
/// on every mutation.
#[derive(Debug)]
pub struct LocalGateway {
    data_dir: PathBuf,
    projects_path: PathBuf,
    tasks_path: PathBuf,
    io: Mutex<()>,
}

impl LocalGateway {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let projects_path = data_dir.join("projects.data");
        let tasks_path = data_dir.join("tasks.data");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        let gateway = Self {
            data_dir,
            projects_path,
            tasks_path,
            io: Mutex::new(()),
        };

        if !gateway.projects_path.exists() {
            let general = Project {
                project_id: GENERAL_PROJECT_ID.to_string(),
                name: "General".to_string(),
                icon: "📥".to_string(),
                color: "#6366f1".to_string(),
                description: None,
                tags: Vec::new(),
                archived: false,
                order: Some(0),
                user_id: None,
                task_count: None,
                done_count: None,
                progress: None,
            };
            save_jsonl_atomic(&gateway.projects_path, &[general])
                .context("failed to seed projects.data")?;
        }

        info!(
            data_dir = %gateway.data_dir.display(),
            projects = %gateway.projects_path.display(),
            tasks = %gateway.tasks_path.display(),
            "opened local store"
        );
        Ok(gateway)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn load_projects(&self) -> GatewayResult<Vec<Project>> {
        load_jsonl(&self.projects_path)
            .context("failed to load projects.data")
            .map_err(storage)
    }

    fn load_tasks(&self) -> GatewayResult<Vec<Task>> {
        load_jsonl(&self.tasks_path)
            .context("failed to load tasks.data")
            .map_err(storage)
    }

    fn save_projects(&self, projects: &[Project]) -> GatewayResult<()> {
        save_jsonl_atomic(&self.projects_path, projects)
            .context("failed to save projects.data")
            .map_err(storage)
    }

    fn save_tasks(&self, tasks: &[Task]) -> GatewayResult<()> {
        save_jsonl_atomic(&self.tasks_path, tasks)
            .context("failed to save tasks.data")
            .map_err(storage)
    }
}

fn storage(err: anyhow::Error) -> GatewayError {
    GatewayError::Storage(format!("{err:#}"))
}

fn bad_request(message: &str) -> GatewayError {
    GatewayError::Status {
        status: 400,
        body: message.to_string(),
    }
}

fn not_found(entity: &'static str, id: &str) -> GatewayError {
    GatewayError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn with_counters(mut project: Project, tasks: &[Task]) -> Project {
    let owned: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.project_id == project.project_id && !task.is_archived)
        .collect();
    let total = owned.len() as u32;
    let done = owned
        .iter()
        .filter(|task| task.status == Status::Completed)
        .count() as u32;
    project.task_count = Some(total);
    project.done_count = Some(done);
    project.progress = Some(if total == 0 { 0 } else { done * 100 / total });
    project
}

fn task_matches(task: &Task, query: &TaskQuery) -> bool {
    if task.is_archived != query.archived {
        return false;
    }
    if let Some(project_id) = query.project_id.as_deref()
        && !project_id.is_empty()
        && task.project_id != project_id
    {
        return false;
    }
    if let Some(status) = query.status
        && task.status != status
    {
        return false;
    }
    if let Some(priority) = query.priority
        && task.priority != Some(priority)
    {
        return false;
    }
    match query.search.as_deref() {
        Some(search) => matches_search(task, search),
        None => true,
    }
}

fn apply_order(ids: &[String], mut set: impl FnMut(&str, i64) -> bool) -> usize {
    let mut touched = 0;
    for (idx, id) in ids.iter().enumerate() {
        if set(id, idx as i64) {
            touched += 1;
        }
    }
    touched
}

#[async_trait]
impl Gateway for LocalGateway {
    async fn list_projects(&self, query: &ProjectQuery) -> GatewayResult<Vec<Project>> {
        let _guard = self.io.lock();
        let tasks = self.load_tasks()?;
        let mut projects: Vec<Project> = self
            .load_projects()?
            .into_iter()
            .filter(|project| project.archived == query.archived)
            .map(|project| with_counters(project, &tasks))
            .collect();
        projects.sort_by_key(Project::order_key);
        Ok(projects)
    }

    #[tracing::instrument(skip(self, data), fields(name = %data.name))]
    async fn create_project(&self, data: &ProjectCreate) -> GatewayResult<Project> {
        if data.name.trim().is_empty() {
            return Err(bad_request("name is required"));
        }
        let _guard = self.io.lock();
        let mut projects = self.load_projects()?;
        let project = Project {
            project_id: Uuid::new_v4().to_string(),
            name: data.name.trim().to_string(),
            icon: data.icon.clone().unwrap_or_else(|| "📁".to_string()),
            color: data.color.clone().unwrap_or_else(|| "#6366f1".to_string()),
            description: data.description.clone(),
            tags: data.tags.clone(),
            archived: false,
            order: Some(projects.len() as i64),
            user_id: None,
            task_count: None,
            done_count: None,
            progress: None,
        };
        projects.push(project.clone());
        self.save_projects(&projects)?;
        debug!(project_id = %project.project_id, "created project");
        Ok(project)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_project(&self, project_id: &str, patch: &ProjectPatch) -> GatewayResult<Project> {
        if patch.is_empty() {
            return Err(bad_request("No valid fields to update"));
        }
        let _guard = self.io.lock();
        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|project| project.project_id == project_id)
            .ok_or_else(|| not_found("project", project_id))?;
        patch.apply_to(project);
        let updated = project.clone();
        self.save_projects(&projects)?;

        // Archiving a project carries its tasks along.
        if let Some(archived) = patch.archived {
            let mut tasks = self.load_tasks()?;
            for task in tasks.iter_mut().filter(|task| task.project_id == project_id) {
                task.is_archived = archived;
                task.status = if archived { Status::Archived } else { Status::Pending };
            }
            self.save_tasks(&tasks)?;
        }
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_project(&self, project_id: &str) -> GatewayResult<()> {
        let _guard = self.io.lock();
        let mut projects = self.load_projects()?;
        let before = projects.len();
        projects.retain(|project| project.project_id != project_id);
        if projects.len() == before {
            return Err(not_found("project", project_id));
        }

        let mut tasks = self.load_tasks()?;
        let mut moved = 0;
        for task in tasks.iter_mut().filter(|task| task.project_id == project_id) {
            task.project_id = GENERAL_PROJECT_ID.to_string();
            moved += 1;
        }
        self.save_tasks(&tasks)?;
        self.save_projects(&projects)?;
        info!(project_id, moved, "deleted project");
        Ok(())
    }

    async fn reorder_projects(&self, project_ids: &[String]) -> GatewayResult<()> {
        let _guard = self.io.lock();
        let mut projects = self.load_projects()?;
        let touched = apply_order(project_ids, |id, order| {
            match projects.iter_mut().find(|project| project.project_id == id) {
                Some(project) => {
                    project.order = Some(order);
                    true
                }
                None => false,
            }
        });
        self.save_projects(&projects)?;
        debug!(requested = project_ids.len(), touched, "reordered projects");
        Ok(())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> GatewayResult<Vec<Task>> {
        let _guard = self.io.lock();
        let mut tasks: Vec<Task> = self
            .load_tasks()?
            .into_iter()
            .filter(|task| task_matches(task, query))
            .collect();
        tasks.sort_by_key(Task::order_key);
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, data), fields(title = %data.title))]
    async fn create_task(&self, data: &TaskCreate) -> GatewayResult<Task> {
        if data.title.trim().is_empty() {
            return Err(bad_request("title is required"));
        }
        let _guard = self.io.lock();
        let mut tasks = self.load_tasks()?;
        let status = data.status.unwrap_or_default();
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            title: data.title.trim().to_string(),
            description: data.description.clone(),
            notes: data.notes.clone(),
            tags: data.tags.clone(),
            project_id: data
                .project_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| GENERAL_PROJECT_ID.to_string()),
            priority: Some(data.priority.unwrap_or(Priority::Medium)),
            status,
            start_date: data.start_date.clone(),
            end_date: data.end_date.clone(),
            execution_day: data.execution_day.clone(),
            reminder: data.reminder.clone(),
            order: Some(tasks.len() as i64),
            is_archived: status == Status::Archived,
            user_id: None,
        };
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;
        debug!(task_id = %task.task_id, "created task");
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> GatewayResult<Task> {
        if patch.is_empty() {
            return Err(bad_request("No valid fields to update"));
        }
        let _guard = self.io.lock();
        let mut tasks = self.load_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|task| task.task_id == task_id)
            .ok_or_else(|| not_found("task", task_id))?;
        patch.apply_to(task);
        let updated = task.clone();
        self.save_tasks(&tasks)?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, task_id: &str) -> GatewayResult<()> {
        let _guard = self.io.lock();
        let mut tasks = self.load_tasks()?;
        let before = tasks.len();
        tasks.retain(|task| task.task_id != task_id);
        if tasks.len() == before {
            return Err(not_found("task", task_id));
        }
        self.save_tasks(&tasks)
    }

    async fn reorder_tasks(&self, ordered_ids: &[String]) -> GatewayResult<()> {
        let _guard = self.io.lock();
        let mut tasks = self.load_tasks()?;
        let touched = apply_order(ordered_ids, |id, order| {
            match tasks.iter_mut().find(|task| task.task_id == id) {
                Some(task) => {
                    task.order = Some(order);
                    true
                }
                None => false,
            }
        });
        self.save_tasks(&tasks)?;
        debug!(requested = ordered_ids.len(), touched, "reordered tasks");
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
