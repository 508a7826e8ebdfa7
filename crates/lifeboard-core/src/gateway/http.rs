use async_trait::async_trait;
use lifeboard_shared::{
    Project, ProjectCreate, ProjectOrderBody, ProjectPatch, ProjectQuery, Task, TaskCreate,
    TaskOrderBody, TaskPatch, TaskQuery,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use super::{Gateway, GatewayError, GatewayResult};

/// JSON-over-HTTP client for the task service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim())?;
        let client = Client::builder().user_agent(concat!("lifeboard/", env!("CARGO_PKG_VERSION"))).build()?;

        debug!(base_url = %base_url, authenticated = token.is_some(), "http gateway ready");
        Ok(Self {
            client,
            base_url,
            token: token.filter(|value| !value.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Url(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> GatewayResult<Response> {
        request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))
    }

    /// GET a collection. Error statuses degrade to an empty list.
    async fn list<T: DeserializeOwned>(&self, path: &[&str], pairs: &[(&str, String)]) -> GatewayResult<Vec<T>> {
        let mut url = self.endpoint(path)?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }

        debug!(url = %url, "listing");
        let response = Self::send(self.request(Method::GET, url.clone())).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        if !status.is_success() {
            error!(url = %url, status = status.as_u16(), body = %text, "list request failed; treating as empty");
            return Ok(Vec::new());
        }

        serde_json::from_str(&text).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn mutate<B: Serialize + ?Sized>(&self, method: Method, path: &[&str], body: Option<&B>) -> GatewayResult<String> {
        let url = self.endpoint(path)?;
        debug!(method = %method, url = %url, "mutating");

        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = Self::send(request).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn mutate_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &[&str],
        body: &B,
    ) -> GatewayResult<T> {
        let text = self.mutate(method, path, Some(body)).await?;
        serde_json::from_str(&text).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_projects(&self, query: &ProjectQuery) -> GatewayResult<Vec<Project>> {
        let flag = if query.archived { "1" } else { "0" };
        self.list(&["projects"], &[("archived", flag.to_string())]).await
    }

    async fn create_project(&self, data: &ProjectCreate) -> GatewayResult<Project> {
        self.mutate_json(Method::POST, &["projects"], data).await
    }

    async fn update_project(&self, project_id: &str, patch: &ProjectPatch) -> GatewayResult<Project> {
        self.mutate_json(Method::PUT, &["projects", project_id], patch)
            .await
    }

    async fn delete_project(&self, project_id: &str) -> GatewayResult<()> {
        self.mutate::<()>(Method::DELETE, &["projects", project_id], None)
            .await?;
        Ok(())
    }

    async fn reorder_projects(&self, project_ids: &[String]) -> GatewayResult<()> {
        let body = ProjectOrderBody {
            project_ids: project_ids.to_vec(),
        };
        self.mutate(Method::PUT, &["projects", "order"], Some(&body)).await?;
        Ok(())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> GatewayResult<Vec<Task>> {
        self.list(&["tasks"], &query.pairs()).await
    }

    async fn create_task(&self, data: &TaskCreate) -> GatewayResult<Task> {
        self.mutate_json(Method::POST, &["tasks"], data).await
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> GatewayResult<Task> {
        self.mutate_json(Method::PUT, &["tasks", task_id], patch)
            .await
    }

    async fn delete_task(&self, task_id: &str) -> GatewayResult<()> {
        self.mutate::<()>(Method::DELETE, &["tasks", task_id], None)
            .await?;
        Ok(())
    }

    async fn reorder_tasks(&self, ordered_ids: &[String]) -> GatewayResult<()> {
        let body = TaskOrderBody {
            ordered_ids: ordered_ids.to_vec(),
        };
        self.mutate(Method::PUT, &["tasks", "order"], Some(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_stay_under_the_api_prefix() {
        let gateway = HttpGateway::new("http://localhost:5000/api", None).expect("gateway");
        assert_eq!(
            gateway.endpoint(&["tasks", "order"]).expect("url").as_str(),
            "http://localhost:5000/api/tasks/order"
        );

        let slashed = HttpGateway::new("http://localhost:5000/api/", None).expect("gateway");
        assert_eq!(
            slashed.endpoint(&["projects", "a b"]).expect("url").as_str(),
            "http://localhost:5000/api/projects/a%20b"
        );
    }

    #[test]
    fn blank_tokens_are_ignored() {
        let gateway = HttpGateway::new("http://localhost:5000/api/", Some("  ".to_string())).expect("gateway");
        assert!(gateway.token.is_none());
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(HttpGateway::new("not a url", None).is_err());
    }
}
