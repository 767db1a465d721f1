//! gcb-pr source checkout adapter.
//!
//! Implements [`pipeline::SourceFetcher`] with `git2`: a single-branch clone
//! of depth 1, so the destination holds exactly the head commit's tree and no
//! history.
//!
//! ## Credentials
//!
//! Private repositories are authenticated through a libgit2 credentials
//! callback fed from [`pipeline::FetchCredentials`]. The token is never
//! spliced into the remote URL, so it cannot leak through libgit2's error
//! messages or the repository's saved `origin` config.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** libgit2 is blocking; every clone runs on the tokio
//! blocking pool.

use std::path::Path;

use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, Progress, RemoteCallbacks};
use pipeline::{BranchName, DispatchError, FetchCredentials, FetchLocation, SourceFetcher};
use tracing::{debug, Span};

/// Number of received objects between progress log records.
const PROGRESS_EVERY: usize = 500;

/// [`SourceFetcher`] backed by a shallow `git2` clone.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher;

impl GitFetcher {
    /// Creates a fetcher.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        location: &FetchLocation,
        destination: &Path,
    ) -> Result<(), DispatchError> {
        let location = location.clone();
        let destination = destination.to_path_buf();
        let span = Span::current();
        let url = location.url().to_owned();
        let reference = location.reference().clone();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            shallow_clone(&location, &destination)
        })
        .await
        // The blocking task panicked or the runtime is shutting down.
        .unwrap_or_else(|join_error| {
            Err(DispatchError::Fetch {
                url,
                reference,
                message: join_error.to_string(),
            })
        })
    }
}

/// Clones `refs/heads/<reference>` at depth 1 into `destination`.
///
/// # Errors
///
/// [`DispatchError::Fetch`] with the plain URL, the ref and libgit2's message.
pub fn shallow_clone(location: &FetchLocation, destination: &Path) -> Result<(), DispatchError> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(creds) = location.credentials().cloned() {
        let mut attempts = 0_u32;
        callbacks.credentials(move |_url, _username, allowed| {
            // libgit2 re-invokes the callback after a rejected attempt.
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::from_str("access token was rejected"));
            }
            token_credentials(&creds, allowed)
        });
    }
    let mut last_reported = 0;
    callbacks.transfer_progress(move |progress| {
        report_progress(&progress, &mut last_reported);
        true
    });

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);
    fetch_options.depth(1);

    let branch = location.reference().clone();
    let mut builder = RepoBuilder::new();
    builder.branch(branch.as_str());
    // Replaces the default `refs/heads/*` refspec so only the head branch is fetched.
    builder.remote_create(move |repo, name, url| {
        repo.remote_with_fetch(name, url, &single_branch_refspec(&branch, name))
    });
    builder.fetch_options(fetch_options);

    let repo = builder
        .clone(location.url(), destination)
        .map_err(|e| fetch_error(location, &e))?;

    if let Some(oid) = repo.head().ok().and_then(|head| head.target()) {
        debug!(
            head = %oid,
            destination = %destination.display(),
            "Checkout complete"
        );
    }
    Ok(())
}

/// Fetch refspec mapping only `branch` onto its remote-tracking ref.
fn single_branch_refspec(branch: &BranchName, remote: &str) -> String {
    format!("+{}:refs/remotes/{remote}/{branch}", branch.to_ref())
}

fn token_credentials(
    creds: &FetchCredentials,
    allowed: CredentialType,
) -> Result<Cred, git2::Error> {
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        Cred::userpass_plaintext(&creds.username, creds.token.expose())
    } else {
        Err(git2::Error::from_str(
            "remote does not accept username/token authentication",
        ))
    }
}

fn report_progress(progress: &Progress<'_>, last_reported: &mut usize) {
    let received = progress.received_objects();
    let total = progress.total_objects();
    if (total > 0 && received == total) || received >= *last_reported + PROGRESS_EVERY {
        *last_reported = received;
        debug!(
            received_objects = received,
            total_objects = total,
            received_bytes = progress.received_bytes(),
            "Fetch progress"
        );
    }
}

fn fetch_error(location: &FetchLocation, err: &git2::Error) -> DispatchError {
    DispatchError::Fetch {
        url: location.url().to_owned(),
        reference: location.reference().clone(),
        message: err.message().to_owned(),
    }
}

#[cfg(test)]
mod tests;
