//! The typed pull-request event the pipeline consumes.
//!
//! The listener builds one [`PullRequestEvent`] per webhook delivery and hands
//! it to a [`crate::PullRequestHandler`]. Only the head side of the pull
//! request matters here: the build runs against the head commit of the head
//! repository.

use serde::{Deserialize, Serialize};

use crate::{BranchName, CommitSha, DeliveryId, PullRequestNumber, RepositoryFullName, Timestamp};

/// One pull-request webhook delivery, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    /// Delivery GUID, when the event source supplied one.
    pub delivery_id: Option<DeliveryId>,
    /// Webhook action (`opened`, `synchronize`, `closed`, ...). Informational.
    pub action: String,
    /// Pull request number.
    pub number: PullRequestNumber,
    /// The proposed change.
    pub head: PullRequestHead,
    /// When the event source accepted the delivery.
    pub received_at: Timestamp,
}

/// Head ref, head commit, and the repository they live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHead {
    /// Branch name without the `refs/heads/` prefix.
    pub reference: BranchName,
    /// Commit the build is for.
    pub sha: CommitSha,
    /// Repository that holds `reference`.
    pub repository: HeadRepository,
}

/// Repository metadata needed to fetch the head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRepository {
    /// Login of the owning user or organisation.
    pub owner_login: String,
    /// Repository name without the owner.
    pub name: String,
    /// `owner/name`.
    pub full_name: RepositoryFullName,
    /// Canonical HTTPS clone URL.
    pub clone_url: String,
    /// `true` when the repository is private.
    pub private: bool,
}

impl HeadRepository {
    /// Repository identity used by the build service: `<owner-login>-<repo-name>`.
    pub fn build_repo_name(&self) -> String {
        format!("{}-{}", self.owner_login, self.name)
    }
}
