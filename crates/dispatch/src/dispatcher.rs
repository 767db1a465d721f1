//! The Event Handler.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    resolve_fetch_location, BuildService, DispatchError, DispatchId, JobSeed, OperationName,
    ProjectId, PullRequestEvent, PullRequestHandler, SecretString, SourceFetcher, SubstitutionSet,
    DEFAULT_BUILD_SPEC_FILE,
};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{load_build_job, ScratchWorkspace};

/// Process-wide settings the pipeline reads for every event.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// GCP project that receives the build and the `_PROJECT_ID` value.
    pub project_id: ProjectId,
    /// Token for private head repositories.
    pub access_token: Option<SecretString>,
    /// Build spec location relative to the checkout root.
    pub build_spec_path: PathBuf,
    /// Parent directory for per-event scratch directories.
    pub workspace_root: PathBuf,
}

impl DispatchConfig {
    /// Settings with the default build spec path and the OS temp directory
    /// as workspace root.
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            access_token: None,
            build_spec_path: PathBuf::from(DEFAULT_BUILD_SPEC_FILE),
            workspace_root: std::env::temp_dir(),
        }
    }
}

/// Drives one pull-request event through the pipeline.
///
/// Holds no per-event state, so one instance serves concurrent events; each
/// dispatch gets its own [`ScratchWorkspace`].
pub struct Dispatcher {
    config: DispatchConfig,
    fetcher: Arc<dyn SourceFetcher>,
    builds: Arc<dyn BuildService>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given adapters.
    pub fn new(
        config: DispatchConfig,
        fetcher: Arc<dyn SourceFetcher>,
        builds: Arc<dyn BuildService>,
    ) -> Self {
        Self {
            config,
            fetcher,
            builds,
        }
    }

    /// Runs every stage for `event` and returns the build service's operation
    /// handle.
    ///
    /// Stops at the first failing stage; nothing is submitted unless every
    /// earlier stage succeeded. The scratch directory is gone when this
    /// returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// The [`DispatchError`] of the first stage that failed.
    pub async fn dispatch(
        &self,
        event: &PullRequestEvent,
    ) -> Result<OperationName, DispatchError> {
        let head = &event.head;

        let location = resolve_fetch_location(head, self.config.access_token.as_ref())?;

        let scratch = ScratchWorkspace::allocate(&self.config.workspace_root, &head.sha)?;
        debug!(
            url = location.url(),
            reference = %location.reference(),
            authenticated = location.credentials().is_some(),
            workspace = %scratch.path().display(),
            "Fetching head ref"
        );
        self.fetcher.fetch(&location, scratch.path()).await?;

        let repo_name = head.repository.build_repo_name();
        let substitutions =
            SubstitutionSet::compute(&self.config.project_id, &repo_name, &head.sha, event.number);
        let seed = JobSeed::new(substitutions, repo_name, head.sha.clone());
        let spec_path = scratch.path().join(&self.config.build_spec_path);
        let job = load_build_job(&spec_path, &seed).await?;

        // The checkout is not needed once the job is built.
        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch workspace");
        }

        debug!(steps = job.steps.len(), "Submitting build");
        self.builds.submit(&self.config.project_id, &job).await
    }
}

#[async_trait]
impl PullRequestHandler for Dispatcher {
    async fn handle(&self, event: PullRequestEvent) {
        let dispatch_id = DispatchId::new_random();
        let span = info_span!(
            "dispatch",
            %dispatch_id,
            delivery_id = event.delivery_id.as_ref().map(|d| d.as_str()),
            action = %event.action,
            pr_number = %event.number,
            repository = %event.head.repository.full_name,
            head_ref = %event.head.reference,
            head_sha = %event.head.sha
        );

        async {
            match self.dispatch(&event).await {
                Ok(operation) => info!(
                    %operation,
                    elapsed_ms = event.received_at.elapsed_millis(),
                    "Build submitted"
                ),
                Err(e) => error!(
                    stage = %e.stage(),
                    category = %e.category(),
                    error = %e,
                    elapsed_ms = event.received_at.elapsed_millis(),
                    "Dispatch abandoned"
                ),
            }
        }
        .instrument(span)
        .await;
    }
}
