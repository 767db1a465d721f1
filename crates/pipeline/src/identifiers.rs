//! Newtype domain identifiers.
//!
//! Every value that names something (a branch, a commit, a GCP project, a
//! remote operation) is a distinct newtype wrapping a primitive. This prevents
//! accidentally passing a [`CommitSha`] where a [`BranchName`] is expected even
//! though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — GitHub-integer-backed
// ---------------------------------------------------------------------------

/// The number GitHub assigns to a pull request within its base repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a pull request number from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Renders as plain base-10 with no padding, which is the form used for the
/// `_PR_NUMBER` substitution.
impl std::fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single dispatch (one pass of one event through the pipeline).
///
/// Generated fresh for every event; attached to the dispatch span so all log
/// records produced for that event can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Generates a new random dispatch identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (Git names / remote handles)
// ---------------------------------------------------------------------------

string_id! {
    /// A Git branch name without the `refs/heads/` prefix (e.g. `"feature-x"`).
    BranchName
}

impl BranchName {
    /// Returns the fully qualified ref (`refs/heads/<name>`).
    pub fn to_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

string_id! {
    /// A Git commit SHA as delivered by GitHub (40-character lowercase hex).
    CommitSha
}

impl CommitSha {
    /// Returns at most the first seven characters, for directory names and logs.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

string_id! {
    /// Identifies a GitHub repository in `"owner/repo"` format.
    RepositoryFullName
}

string_id! {
    /// A Google Cloud project ID (e.g. `"proj-1"`).
    ProjectId
}

string_id! {
    /// The `X-GitHub-Delivery` GUID identifying one webhook delivery.
    DeliveryId
}

string_id! {
    /// The opaque handle the build service returns for an accepted build
    /// (e.g. `"operations/build/proj-1/NWJh..."`).
    OperationName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_are_rejected() {
        assert!(BranchName::new("").is_none());
        assert!(ProjectId::new("").is_none());
        assert_eq!(BranchName::new("main").unwrap().as_str(), "main");
    }

    #[test]
    fn branch_ref_is_qualified() {
        let branch = BranchName::new("feature-x").unwrap();
        assert_eq!(branch.to_ref(), "refs/heads/feature-x");
    }

    #[test]
    fn short_sha_truncates_only_long_values() {
        let long = CommitSha::new("0123456789abcdef").unwrap();
        assert_eq!(long.short(), "0123456");
        let short = CommitSha::new("abc123").unwrap();
        assert_eq!(short.short(), "abc123");
    }

    #[test]
    fn pr_number_renders_without_padding() {
        assert_eq!(PullRequestNumber::new(42).to_string(), "42");
        assert_eq!(PullRequestNumber::new(7).to_string(), "7");
    }
}
