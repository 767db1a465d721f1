//! gcb-pr webhook event source.
//!
//! Binds one HTTP route that accepts GitHub `pull_request` deliveries,
//! verifies the `X-Hub-Signature-256` HMAC of every request against the
//! configured webhook secret, converts the payload into a
//! [`pipeline::PullRequestEvent`], and hands it to a
//! [`pipeline::PullRequestHandler`] on its own task.
//!
//! The HTTP response only reflects whether the delivery was *accepted*
//! (signature, event type, payload shape). What happens to the build later is
//! reported through the observability sink, never through the response.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details, signature checks and payload
//! deserialization all live here. The [`pipeline`] crate sees only
//! [`pipeline::PullRequestEvent`].

mod payload;
mod server;
mod signature;

pub use payload::{PayloadError, PullRequestPayload};
pub use server::{router, serve, WebhookConfig, DEFAULT_LISTEN_ADDR, DEFAULT_WEBHOOK_PATH};
pub use signature::{verify_signature, SignatureError, SIGNATURE_HEADER};
