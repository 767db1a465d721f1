//! gcb-pr dispatch orchestration.
//!
//! [`Dispatcher`] is the Event Handler: it receives one
//! [`pipeline::PullRequestEvent`] and runs the pipeline stages strictly in
//! order, stopping at the first failure:
//!
//! 1. resolve the fetch location ([`pipeline::resolve_fetch_location`]);
//! 2. allocate a fresh scratch directory ([`ScratchWorkspace`]);
//! 3. shallow-fetch the head ref into it ([`pipeline::SourceFetcher`]);
//! 4. load the build spec and overlay the computed substitutions
//!    ([`load_build_job`]);
//! 5. submit the job ([`pipeline::BuildService`]).
//!
//! ## Architectural Layer
//!
//! **Orchestration.** Stages are sequenced here; the rules they apply live in
//! [`pipeline`] and the I/O they need lives behind its port traits. Failures
//! are reported through `tracing` and never escape to the event source.

mod dispatcher;
mod loader;
mod scratch;

pub use dispatcher::{DispatchConfig, Dispatcher};
pub use loader::load_build_job;
pub use scratch::ScratchWorkspace;
