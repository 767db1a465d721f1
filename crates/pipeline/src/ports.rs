//! Port traits implemented by the adapter crates.
//!
//! The dispatch orchestrator depends only on these traits; `checkout`,
//! `cloudbuild` and `listener` supply the concrete implementations and the
//! `cli` binary wires them together.

use std::path::Path;

use async_trait::async_trait;

use crate::{BuildJob, DispatchError, FetchLocation, OperationName, ProjectId, PullRequestEvent};

/// Workspace Materializer: populates a directory with one ref's tree.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Shallow-fetches (depth 1) `location.reference()` into `destination`.
    ///
    /// `destination` exists and is empty. On error its contents are
    /// unspecified and must not be used.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Fetch`] on any network, authentication, or
    /// unknown-ref failure.
    async fn fetch(&self, location: &FetchLocation, destination: &Path)
        -> Result<(), DispatchError>;
}

/// Build Dispatcher: hands a finished job to the remote build service.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Submits `job` to the job-creation endpoint scoped to `project_id`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Submission`] for authentication, quota, malformed-job
    /// or transport failures, with the remote detail preserved.
    async fn submit(
        &self,
        project_id: &ProjectId,
        job: &BuildJob,
    ) -> Result<OperationName, DispatchError>;
}

/// Consumer of pull-request events delivered by an event source.
///
/// Implementations never fail outward: every outcome is reported through
/// the observability sink.
#[async_trait]
pub trait PullRequestHandler: Send + Sync {
    /// Processes one event to completion.
    async fn handle(&self, event: PullRequestEvent);
}
