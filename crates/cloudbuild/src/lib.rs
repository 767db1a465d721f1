//! gcb-pr Cloud Build adapter.
//!
//! Implements [`pipeline::BuildService`] against the Cloud Build v1 REST API:
//! one `projects.builds.create` call per dispatch, returning the long-running
//! operation name. The build itself is not awaited or polled.
//!
//! ## Authentication
//!
//! Requests carry an OAuth2 bearer token from an [`AccessTokenSource`]:
//!
//! - [`StaticAccessToken`] — a pre-provisioned token (e.g. from
//!   `gcloud auth print-access-token`), for local runs.
//! - [`MetadataServerAccessToken`] — the runtime service account's token from
//!   the GCE/Cloud Run metadata server, cached until shortly before expiry.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, token acquisition and response parsing
//! live here. The [`pipeline`] crate sees only [`pipeline::BuildService`].

mod client;
mod errors;
mod token;

pub use client::{CloudBuildClient, DEFAULT_BASE_URL};
pub use errors::CloudBuildError;
pub use token::{
    AccessTokenSource, MetadataServerAccessToken, StaticAccessToken, DEFAULT_METADATA_TOKEN_URL,
};
