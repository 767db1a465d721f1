//! Error types for the event-to-build dispatch pipeline.
//!
//! [`DispatchError`] covers every condition that abandons the handling of a
//! single event. None of them is fatal to the process; the orchestrator
//! reports the error and moves on to the next delivery.
//!
//! Each variant knows which [`Stage`] produced it and which [`ErrorCategory`]
//! it belongs to, so the orchestrator can emit a structured outcome record
//! without string matching.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::BranchName;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Coarse error class, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A process-wide setting needed for this event is missing or invalid.
    Configuration,
    /// Network, authentication, or remote-service failure (fetch or submit).
    Transport,
    /// The build spec document is absent, unreadable, or schema-incompatible.
    Format,
    /// The local scratch directory could not be prepared.
    Workspace,
}

impl ErrorCategory {
    /// Returns the category as a lowercase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Format => "format",
            Self::Workspace => "workspace",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Source Resolver.
    Resolve,
    /// Scratch workspace allocation.
    Allocate,
    /// Workspace Materializer.
    Fetch,
    /// Build Spec Loader (with the Substitution Merger overlay).
    Load,
    /// Build Dispatcher.
    Submit,
}

impl Stage {
    /// Returns the stage as a lowercase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Allocate => "allocate",
            Self::Fetch => "fetch",
            Self::Load => "load",
            Self::Submit => "submit",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors that abandon the dispatch of one pull-request event.
///
/// Messages never contain credentials: fetch errors carry the plain
/// repository URL, not the credentialed form.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A process-wide setting required for this event is missing.
    ///
    /// Produced by: Source Resolver when a private repository arrives and no
    /// access token is configured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description naming the missing requirement.
        message: String,
    },

    /// The per-event scratch directory could not be created or cleared.
    #[error("Workspace error at {path}: {message}")]
    Workspace {
        /// Directory that could not be prepared.
        path: PathBuf,
        /// Underlying I/O error text.
        message: String,
    },

    /// The shallow fetch of the head ref failed (network, authentication,
    /// unknown ref).
    #[error("Fetch of {reference} from {url} failed: {message}")]
    Fetch {
        /// Repository URL without credentials.
        url: String,
        /// Branch that was requested.
        reference: BranchName,
        /// Transport or protocol error text.
        message: String,
    },

    /// No build spec file exists at the expected location in the workspace.
    #[error("Build spec not found: {}", path.display())]
    BuildSpecNotFound {
        /// Path that was probed.
        path: PathBuf,
    },

    /// The build spec could not be read, converted, or mapped onto the
    /// build-job schema.
    #[error("Build spec {} is invalid: {message}", path.display())]
    BuildSpecFormat {
        /// Path of the offending document.
        path: PathBuf,
        /// Parser or schema error text.
        message: String,
    },

    /// The build service rejected the job or could not be reached.
    #[error("Build submission failed: {message}")]
    Submission {
        /// Remote status and body, or transport error text.
        message: String,
    },
}

impl DispatchError {
    /// Returns the coarse class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Workspace { .. } => ErrorCategory::Workspace,
            Self::Fetch { .. } | Self::Submission { .. } => ErrorCategory::Transport,
            Self::BuildSpecNotFound { .. } | Self::BuildSpecFormat { .. } => ErrorCategory::Format,
        }
    }

    /// Returns the pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Configuration { .. } => Stage::Resolve,
            Self::Workspace { .. } => Stage::Allocate,
            Self::Fetch { .. } => Stage::Fetch,
            Self::BuildSpecNotFound { .. } | Self::BuildSpecFormat { .. } => Stage::Load,
            Self::Submission { .. } => Stage::Submit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_are_transport_class_at_fetch_stage() {
        let err = DispatchError::Fetch {
            url: "https://github.com/octo/widgets".into(),
            reference: BranchName::new("feature-x").unwrap(),
            message: "couldn't find remote ref".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert_eq!(err.stage(), Stage::Fetch);
        assert!(err.to_string().contains("feature-x"));
    }

    #[test]
    fn missing_build_spec_is_format_class() {
        let err = DispatchError::BuildSpecNotFound {
            path: PathBuf::from("/tmp/ws/cloudbuild.yaml"),
        };
        assert_eq!(err.category(), ErrorCategory::Format);
        assert_eq!(err.stage(), Stage::Load);
        assert_eq!(
            err.to_string(),
            "Build spec not found: /tmp/ws/cloudbuild.yaml"
        );
    }

    #[test]
    fn stages_are_ordered_like_the_pipeline() {
        assert!(Stage::Resolve < Stage::Allocate);
        assert!(Stage::Fetch < Stage::Load);
        assert!(Stage::Load < Stage::Submit);
    }
}
