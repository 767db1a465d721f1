//! GitHub `pull_request` webhook payload.
//!
//! Only the fields the pipeline needs are modelled; everything else in the
//! delivery is ignored by serde.

use pipeline::{
    BranchName, CommitSha, DeliveryId, HeadRepository, PullRequestEvent, PullRequestHead,
    PullRequestNumber, RepositoryFullName, Timestamp,
};
use serde::Deserialize;
use thiserror::Error;

/// Why a well-formed JSON delivery cannot become a [`PullRequestEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The head repository is gone (typically a deleted fork).
    #[error("pull request #{0} has no head repository")]
    MissingHeadRepository(u64),

    /// A required string field was empty.
    #[error("pull request #{number} has an empty {field}")]
    EmptyField {
        /// Pull request number.
        number: u64,
        /// Payload field name.
        field: &'static str,
    },
}

/// `pull_request` event body.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequestBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestBody {
    pub head: HeadBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadBody {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: String,
    pub repo: Option<RepoBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoBody {
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    #[serde(default)]
    pub private: bool,
    pub owner: OwnerBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerBody {
    pub login: String,
}

impl PullRequestPayload {
    /// Converts the delivery into the pipeline's event type.
    ///
    /// # Errors
    ///
    /// See [`PayloadError`].
    pub fn into_event(
        self,
        delivery_id: Option<DeliveryId>,
    ) -> Result<PullRequestEvent, PayloadError> {
        let number = self.number;
        let head = self.pull_request.head;
        let repo = head.repo.ok_or(PayloadError::MissingHeadRepository(number))?;
        let empty = |field| PayloadError::EmptyField { number, field };

        Ok(PullRequestEvent {
            delivery_id,
            action: self.action,
            number: PullRequestNumber::new(number),
            head: PullRequestHead {
                reference: BranchName::new(head.reference).ok_or_else(|| empty("head.ref"))?,
                sha: CommitSha::new(head.sha).ok_or_else(|| empty("head.sha"))?,
                repository: HeadRepository {
                    owner_login: repo.owner.login,
                    name: repo.name,
                    full_name: RepositoryFullName::new(repo.full_name)
                        .ok_or_else(|| empty("head.repo.full_name"))?,
                    clone_url: repo.clone_url,
                    private: repo.private,
                },
            },
            received_at: Timestamp::now(),
        })
    }
}
