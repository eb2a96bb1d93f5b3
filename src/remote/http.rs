//! REST adapter for the task backend (feature `http-client`).
//!
//! Every response body is wrapped as `{"data": ...}`. Non-success statuses
//! become [`SyncError::RemoteRejected`] carrying the server's `error`
//! message when one is present. Requests that never complete become
//! [`SyncError::NetworkFailure`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::RemoteEndpoint;
use crate::error::{Result, SyncError};
use crate::types::{
    BulkTaskUpdate, BulkUpdateAck, CreateTaskRequest, DeletedTask, MemberList, ProjectList, Task,
    TaskPatch, ViewSnapshot,
};

use super::{RemoteTaskApi, TaskQuery};

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct BulkBody<'a> {
    tasks: &'a [BulkTaskUpdate],
}

/// [`RemoteTaskApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: Url,
}

impl HttpTaskApi {
    /// Builds a client from endpoint settings.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the base URL or a header is
    /// malformed, or the client cannot be built.
    pub fn new(endpoint: &RemoteEndpoint) -> Result<Self> {
        let base_url = Url::parse(endpoint.base_url.trim_end_matches('/'))
            .map_err(|e| SyncError::Configuration(format!("invalid base_url: {e}")))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SyncError::Configuration(format!("invalid header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SyncError::Configuration(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(endpoint.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| SyncError::Configuration(format!("invalid url {joined}: {e}")))
    }

    /// `tasks/<id>` with the id percent-encoded as one path segment.
    fn task_url(&self, task_id: &str) -> Result<Url> {
        let mut url = self.url("tasks")?;
        url.path_segments_mut()
            .map_err(|()| SyncError::Configuration("base url cannot hold a path".to_string()))?
            .push(task_id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "remote request");
        self.client.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "remote rejected request");
            return Err(SyncError::rejected(status.as_u16(), message));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl RemoteTaskApi for HttpTaskApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task> {
        let url = self.url("tasks")?;
        self.send(self.request(Method::POST, url).json(request)).await
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task> {
        let url = self.task_url(task_id)?;
        self.send(self.request(Method::PATCH, url).json(patch)).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<DeletedTask> {
        let url = self.task_url(task_id)?;
        self.send(self.request(Method::DELETE, url)).await
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<ViewSnapshot> {
        let mut url = self.url("tasks")?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        self.send(self.request(Method::GET, url)).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let url = self.task_url(task_id)?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn bulk_update_tasks(&self, updates: &[BulkTaskUpdate]) -> Result<BulkUpdateAck> {
        let url = self.url("tasks/bulk-update")?;
        self.send(
            self.request(Method::POST, url)
                .json(&BulkBody { tasks: updates }),
        )
        .await
    }

    async fn list_projects(&self, workspace_id: &str) -> Result<ProjectList> {
        let mut url = self.url("projects")?;
        url.query_pairs_mut().append_pair("workspaceId", workspace_id);
        self.send(self.request(Method::GET, url)).await
    }

    async fn list_members(&self, workspace_id: &str) -> Result<MemberList> {
        let mut url = self.url("members")?;
        url.query_pairs_mut().append_pair("workspaceId", workspace_id);
        self.send(self.request(Method::GET, url)).await
    }
}
