//! Remote store access.
//!
//! Every persistence call goes through [`Gateway`]. Implementations exist for
//! the HTTP service and for a JSONL-backed directory used offline and in
//! tests.

mod http;
mod local;

use async_trait::async_trait;
use lifeboard_shared::{
    Project, ProjectCreate, ProjectPatch, ProjectQuery, Task, TaskCreate, TaskPatch, TaskQuery,
};

pub use http::HttpGateway;
pub use local::LocalGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The store answered with a non-success status.
    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid endpoint: {0}")]
    Url(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound { .. } | GatewayError::Status { status: 404, .. }
        )
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::Url(err.to_string())
    }
}

/// Typed CRUD and reorder surface of the remote store.
///
/// List calls treat an error status as an empty result; only a transport
/// failure is reported. Mutations report every failure.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list_projects(&self, query: &ProjectQuery) -> GatewayResult<Vec<Project>>;

    async fn create_project(&self, data: &ProjectCreate) -> GatewayResult<Project>;

    async fn update_project(&self, project_id: &str, patch: &ProjectPatch) -> GatewayResult<Project>;

    async fn delete_project(&self, project_id: &str) -> GatewayResult<()>;

    /// Persists a full ordering of projects; position becomes `order`.
    async fn reorder_projects(&self, project_ids: &[String]) -> GatewayResult<()>;

    async fn list_tasks(&self, query: &TaskQuery) -> GatewayResult<Vec<Task>>;

    async fn create_task(&self, data: &TaskCreate) -> GatewayResult<Task>;

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> GatewayResult<Task>;

    async fn delete_task(&self, task_id: &str) -> GatewayResult<()>;

    /// Persists the order of one container; position becomes `order`.
    async fn reorder_tasks(&self, ordered_ids: &[String]) -> GatewayResult<()>;
}
