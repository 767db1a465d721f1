//! Build-job schema and the Build Spec Loader's format translation.
//!
//! A build spec is a human-authored YAML (or JSON) document in the Cloud
//! Build `Build` shape. [`parse_build_spec`] converts it to the canonical
//! JSON data model and maps it onto [`BuildJob`]. [`JobSeed::overlay`] then
//! lays the dispatch-time values (substitutions, source locator) over the
//! parsed document; the seeded values always win.
//!
//! Top-level keys the schema does not know are dropped and reported through
//! [`BuildSpecDocument::dropped_fields`]. Free-form key/value sections the
//! schema does know (`options`, `artifacts`, `availableSecrets`, `secrets`)
//! pass through untouched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{CommitSha, DispatchError, SubstitutionSet};

/// Build spec location relative to the workspace root, unless configured
/// otherwise.
pub const DEFAULT_BUILD_SPEC_FILE: &str = "cloudbuild.yaml";

/// Top-level keys [`BuildJob`] maps. Everything else is dropped.
const KNOWN_FIELDS: &[&str] = &[
    "steps",
    "substitutions",
    "source",
    "images",
    "tags",
    "timeout",
    "queueTtl",
    "logsBucket",
    "serviceAccount",
    "options",
    "artifacts",
    "availableSecrets",
    "secrets",
];

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The job description submitted to the build service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildJob {
    /// Steps, run in order unless `waitFor` says otherwise.
    pub steps: Vec<BuildStep>,

    /// Variables interpolated by the build service.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substitutions: BTreeMap<String, String>,

    /// Source locator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// Images to push after the steps complete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Free-form tags for filtering builds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Whole-build timeout as a duration string (e.g. `"1200s"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// How long the build may wait in the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_ttl: Option<String>,

    /// `gs://` bucket for build logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_bucket: Option<String>,

    /// Service account the build runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Build options, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,

    /// Artifact upload configuration, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Value>,

    /// Secret Manager bindings, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_secrets: Option<Value>,

    /// KMS-encrypted secrets, passed through verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Value>,
}

/// One build step. `name` is the container image to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStep {
    /// Container image.
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_env: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_for: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_exit_codes: Vec<i32>,
}

/// A named volume mounted into a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub path: String,
}

/// Source locator for a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_source: Option<RepoSource>,
}

/// Repository-and-revision source locator.
///
/// Exactly one of `commit_sha`, `branch_name`, `tag_name` is meaningful to the
/// build service; after [`JobSeed::overlay`] it is always `commit_sha`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert_regex: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substitutions: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Reasons a build spec cannot be turned into a [`BuildJob`].
#[derive(Debug, Error)]
pub enum BuildSpecError {
    /// The text is not valid YAML (or has no JSON representation).
    #[error("cannot convert document: {0}")]
    Syntax(String),

    /// The document's root is not a mapping.
    #[error("document root must be a mapping, found {0}")]
    NotAMapping(&'static str),

    /// The document does not fit the build-job schema.
    #[error("document does not match the build schema: {0}")]
    Schema(String),
}

impl BuildSpecError {
    /// Attaches the document path, producing the pipeline error.
    pub fn at(self, path: &Path) -> DispatchError {
        DispatchError::BuildSpecFormat {
            path: path.to_path_buf(),
            message: self.to_string(),
        }
    }
}

/// A parsed build spec, before dispatch-time values are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSpecDocument {
    job: BuildJob,
    dropped_fields: Vec<String>,
}

impl BuildSpecDocument {
    /// The document as authored, mapped onto the schema.
    pub fn job(&self) -> &BuildJob {
        &self.job
    }

    /// Unknown top-level keys that were discarded, sorted.
    pub fn dropped_fields(&self) -> &[String] {
        &self.dropped_fields
    }
}

/// Converts raw build spec bytes to a [`BuildSpecDocument`].
///
/// # Errors
///
/// [`BuildSpecError::Syntax`] for unparsable text, [`BuildSpecError::NotAMapping`]
/// when the root is a scalar or list, [`BuildSpecError::Schema`] when the
/// content does not map (missing `steps`, a step that is not a mapping or has
/// no `name`, non-string substitution values, ...).
pub fn parse_build_spec(raw: &[u8]) -> Result<BuildSpecDocument, BuildSpecError> {
    let mut yaml: serde_yaml::Value =
        serde_yaml::from_slice(raw).map_err(|e| BuildSpecError::Syntax(e.to_string()))?;
    // `<<: *anchor` merge keys are resolved before the document is read.
    yaml.apply_merge().map_err(|e| BuildSpecError::Syntax(e.to_string()))?;
    let value = serde_json::to_value(yaml).map_err(|e| BuildSpecError::Schema(e.to_string()))?;

    let mut fields = match value {
        Value::Object(map) => map,
        other => return Err(BuildSpecError::NotAMapping(kind_of(&other))),
    };

    let mut dropped_fields: Vec<String> = fields
        .keys()
        .filter(|key| !KNOWN_FIELDS.contains(&key.as_str()))
        .cloned()
        .collect();
    dropped_fields.sort();
    for key in &dropped_fields {
        fields.remove(key);
    }

    let job: BuildJob = serde_json::from_value(Value::Object(fields))
        .map_err(|e| BuildSpecError::Schema(e.to_string()))?;

    Ok(BuildSpecDocument {
        job,
        dropped_fields,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// Dispatch-time values every submitted job must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSeed {
    substitutions: SubstitutionSet,
    repo_name: String,
    commit_sha: CommitSha,
}

impl JobSeed {
    /// Creates a seed from the computed substitutions and the source locator.
    pub fn new(
        substitutions: SubstitutionSet,
        repo_name: impl Into<String>,
        commit_sha: CommitSha,
    ) -> Self {
        Self {
            substitutions,
            repo_name: repo_name.into(),
            commit_sha,
        }
    }

    /// Lays the seeded values over `document`.
    ///
    /// Substitutions: document entries first, computed entries last, so a
    /// document key that collides with a reserved key is overwritten and any
    /// other document key survives unchanged.
    ///
    /// Source: `repoName` and `commitSha` are the seeded values; `branchName`
    /// and `tagName` are cleared; `projectId`, `dir`, `invertRegex` and
    /// source-level substitutions from the document are kept.
    pub fn overlay(&self, document: BuildSpecDocument) -> BuildJob {
        let mut job = document.job;

        self.substitutions.apply_to(&mut job.substitutions);

        let mut repo_source = job
            .source
            .take()
            .and_then(|source| source.repo_source)
            .unwrap_or_default();
        repo_source.repo_name = Some(self.repo_name.clone());
        repo_source.commit_sha = Some(self.commit_sha.to_string());
        repo_source.branch_name = None;
        repo_source.tag_name = None;
        job.source = Some(Source {
            repo_source: Some(repo_source),
        });

        job
    }
}
