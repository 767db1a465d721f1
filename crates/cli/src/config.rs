//! Process configuration, read once from the environment at startup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Component, PathBuf};

use dispatch::DispatchConfig;
use listener::{WebhookConfig, DEFAULT_LISTEN_ADDR, DEFAULT_WEBHOOK_PATH};
use pipeline::{ProjectId, SecretString, DEFAULT_BUILD_SPEC_FILE};
use thiserror::Error;
use url::Url;

/// Configuration problems that prevent startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    /// A variable is set but unusable.
    #[error("environment variable {name} is invalid: {message}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per record.
    Json,
    /// Multi-line, human-oriented output.
    Pretty,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_secret: SecretString,
    pub project_id: ProjectId,
    pub github_access_token: Option<SecretString>,
    pub listen_addr: SocketAddr,
    pub webhook_path: String,
    pub build_spec_path: PathBuf,
    pub workspace_root: PathBuf,
    pub cloudbuild_api_url: Url,
    pub gcp_access_token: Option<SecretString>,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Builds the configuration from a variable map. Empty values count as
    /// unset.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let secret = |name: &'static str| get(name).and_then(SecretString::new);

        let webhook_secret =
            secret("GITHUB_WEBHOOK_SECRET").ok_or(ConfigError::Missing("GITHUB_WEBHOOK_SECRET"))?;
        let project_id = get("GCP_PROJECT_ID")
            .and_then(ProjectId::new)
            .ok_or(ConfigError::Missing("GCP_PROJECT_ID"))?;

        let listen_addr = get("GCB_PR_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("GCB_PR_LISTEN_ADDR", e))?;

        let webhook_path =
            get("GCB_PR_WEBHOOK_PATH").unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_owned());
        if !webhook_path.starts_with('/') {
            return Err(invalid("GCB_PR_WEBHOOK_PATH", "must start with '/'"));
        }

        let build_spec_path = PathBuf::from(
            get("GCB_PR_BUILD_SPEC").unwrap_or_else(|| DEFAULT_BUILD_SPEC_FILE.to_owned()),
        );
        let escapes_checkout = build_spec_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes_checkout {
            return Err(invalid(
                "GCB_PR_BUILD_SPEC",
                "must be a relative path inside the repository",
            ));
        }

        let workspace_root = get("GCB_PR_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let cloudbuild_api_url = Url::parse(
            &get("CLOUDBUILD_API_URL").unwrap_or_else(|| cloudbuild::DEFAULT_BASE_URL.to_owned()),
        )
        .map_err(|e| invalid("CLOUDBUILD_API_URL", e))?;

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => {
                return Err(invalid(
                    "LOG_FORMAT",
                    format!("expected 'json' or 'pretty', got '{other}'"),
                ))
            }
        };

        Ok(Self {
            webhook_secret,
            project_id,
            github_access_token: secret("GITHUB_ACCESS_TOKEN"),
            listen_addr,
            webhook_path,
            build_spec_path,
            workspace_root,
            cloudbuild_api_url,
            gcp_access_token: secret("GOOGLE_OAUTH_ACCESS_TOKEN"),
            log_format,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// Settings for the dispatch orchestrator.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            project_id: self.project_id.clone(),
            access_token: self.github_access_token.clone(),
            build_spec_path: self.build_spec_path.clone(),
            workspace_root: self.workspace_root.clone(),
        }
    }

    /// Settings for the webhook endpoint.
    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            path: self.webhook_path.clone(),
            secret: self.webhook_secret.clone(),
        }
    }
}

fn invalid(name: &'static str, message: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn minimal() -> HashMap<String, String> {
        vars(&[
            ("GITHUB_WEBHOOK_SECRET", "hook-secret"),
            ("GCP_PROJECT_ID", "proj-1"),
        ])
    }

    #[test]
    fn defaults_match_the_original_deployment() {
        let config = Config::from_vars(&minimal()).unwrap();

        assert_eq!(config.listen_addr.port(), 3016);
        assert_eq!(config.webhook_path, "/webhooks");
        assert_eq!(config.build_spec_path, PathBuf::from("cloudbuild.yaml"));
        assert_eq!(config.project_id.as_str(), "proj-1");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.github_access_token.is_none());
        assert!(config.gcp_access_token.is_none());
        assert_eq!(
            config.cloudbuild_api_url.as_str(),
            "https://cloudbuild.googleapis.com/"
        );
    }

    #[rstest]
    #[case("GITHUB_WEBHOOK_SECRET")]
    #[case("GCP_PROJECT_ID")]
    fn required_variables_must_be_present(#[case] name: &'static str) {
        let mut vars = minimal();
        vars.remove(name);
        assert_eq!(Config::from_vars(&vars).unwrap_err(), ConfigError::Missing(name));

        vars.insert(name.to_owned(), "   ".to_owned());
        assert_eq!(Config::from_vars(&vars).unwrap_err(), ConfigError::Missing(name));
    }

    #[test]
    fn optional_tokens_are_read_as_secrets() {
        let mut vars = minimal();
        vars.insert("GITHUB_ACCESS_TOKEN".into(), "ghs_s3cr3t".into());
        let config = Config::from_vars(&vars).unwrap();

        let token = config.dispatch_config().access_token.unwrap();
        assert_eq!(token.expose(), "ghs_s3cr3t");
        assert!(!format!("{config:?}").contains("ghs_s3cr3t"));
        assert!(!format!("{config:?}").contains("hook-secret"));
    }

    #[rstest]
    #[case("/etc/passwd")]
    #[case("../outside.yaml")]
    #[case("ci/../../outside.yaml")]
    fn build_spec_must_stay_inside_the_checkout(#[case] path: &str) {
        let mut vars = minimal();
        vars.insert("GCB_PR_BUILD_SPEC".into(), path.into());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "GCB_PR_BUILD_SPEC",
                ..
            }
        ));
    }

    #[test]
    fn nested_build_spec_path_is_accepted() {
        let mut vars = minimal();
        vars.insert("GCB_PR_BUILD_SPEC".into(), "ci/cloudbuild.pr.yaml".into());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.dispatch_config().build_spec_path,
            PathBuf::from("ci/cloudbuild.pr.yaml")
        );
    }

    #[rstest]
    #[case("GCB_PR_LISTEN_ADDR", "localhost")]
    #[case("GCB_PR_WEBHOOK_PATH", "webhooks")]
    #[case("CLOUDBUILD_API_URL", "not a url")]
    #[case("LOG_FORMAT", "xml")]
    fn malformed_values_are_rejected(#[case] name: &'static str, #[case] value: &str) {
        let mut vars = minimal();
        vars.insert(name.into(), value.into());
        match Config::from_vars(&vars).unwrap_err() {
            ConfigError::Invalid { name: got, .. } => assert_eq!(got, name),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
