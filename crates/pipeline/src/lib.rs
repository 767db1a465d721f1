//! Core dispatch domain for gcb-pr.
//!
//! gcb-pr receives a pull-request webhook, fetches the head commit, reads its
//! `cloudbuild.yaml`, adds dispatch-time substitutions, and submits the result
//! to Cloud Build. This crate holds every domain concept of that pipeline and
//! the port traits the adapters implement; it performs no network or
//! filesystem I/O of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`CommitSha`, `ProjectId`, `DispatchId`, ...) |
//! | [`types`] | `SecretString`, `Timestamp` |
//! | [`event`] | `PullRequestEvent` and its head-side records |
//! | [`source`] | Source Resolver and `FetchLocation` |
//! | [`substitutions`] | Substitution Merger and `SubstitutionSet` |
//! | [`build_spec`] | Build-job schema, spec parsing, seed overlay |
//! | [`errors`] | `DispatchError`, `ErrorCategory`, `Stage` |
//! | [`ports`] | `SourceFetcher`, `BuildService`, `PullRequestHandler` |

pub mod build_spec;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod ports;
pub mod source;
pub mod substitutions;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use build_spec::{
    parse_build_spec, BuildJob, BuildSpecDocument, BuildSpecError, BuildStep, JobSeed, RepoSource,
    Source, Volume, DEFAULT_BUILD_SPEC_FILE,
};
pub use errors::{DispatchError, ErrorCategory, Stage};
pub use event::{HeadRepository, PullRequestEvent, PullRequestHead};
pub use identifiers::{
    BranchName, CommitSha, DeliveryId, DispatchId, OperationName, ProjectId, PullRequestNumber,
    RepositoryFullName,
};
pub use ports::{BuildService, PullRequestHandler, SourceFetcher};
pub use source::{resolve_fetch_location, FetchCredentials, FetchLocation, TOKEN_USERNAME};
pub use substitutions::{SubstitutionSet, RESERVED_KEYS};
pub use types::{SecretString, Timestamp};
