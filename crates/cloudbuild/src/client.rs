//! Cloud Build REST client.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{BuildJob, BuildService, DispatchError, OperationName, ProjectId};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{AccessTokenSource, CloudBuildError};

/// Production Cloud Build API root.
pub const DEFAULT_BASE_URL: &str = "https://cloudbuild.googleapis.com/";

/// The parts of a `google.longrunning.Operation` this adapter reads.
#[derive(Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    metadata: Option<Value>,
}

/// [`BuildService`] implementation for Cloud Build.
pub struct CloudBuildClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn AccessTokenSource>,
}

impl CloudBuildClient {
    /// Creates a client rooted at `base_url` (normally [`DEFAULT_BASE_URL`]).
    pub fn new(http: reqwest::Client, base_url: Url, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    /// `projects.builds.create` endpoint for `project_id`.
    fn create_url(&self, project_id: &ProjectId) -> Result<Url, CloudBuildError> {
        let relative = format!("v1/projects/{project_id}/builds");
        self.base_url
            .join(&relative)
            .map_err(|e| CloudBuildError::InvalidResponse {
                url: format!("{}{relative}", self.base_url),
                message: e.to_string(),
            })
    }

    /// Submits `job` and returns the operation name.
    ///
    /// # Errors
    ///
    /// See [`CloudBuildError`].
    pub async fn create_build(
        &self,
        project_id: &ProjectId,
        job: &BuildJob,
    ) -> Result<OperationName, CloudBuildError> {
        let url = self.create_url(project_id)?;
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url.clone())
            .bearer_auth(token.expose())
            .json(job)
            .send()
            .await
            .map_err(|source| CloudBuildError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| CloudBuildError::Transport {
                url: url.to_string(),
                source,
            })?;
        if !status.is_success() {
            return Err(CloudBuildError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let operation: Operation =
            serde_json::from_str(&body).map_err(|e| CloudBuildError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let build_id = operation
            .metadata
            .as_ref()
            .and_then(|m| m.pointer("/build/id"))
            .and_then(Value::as_str);
        debug!(operation = %operation.name, build_id, "Cloud Build accepted job");

        OperationName::new(operation.name).ok_or_else(|| CloudBuildError::InvalidResponse {
            url: url.to_string(),
            message: "operation name is empty".to_owned(),
        })
    }
}

#[async_trait]
impl BuildService for CloudBuildClient {
    async fn submit(
        &self,
        project_id: &ProjectId,
        job: &BuildJob,
    ) -> Result<OperationName, DispatchError> {
        Ok(self.create_build(project_id, job).await?)
    }
}
