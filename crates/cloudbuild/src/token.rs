//! OAuth2 access token sources for Cloud Build requests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use pipeline::SecretString;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::CloudBuildError;

/// Token endpoint of the instance metadata server for the default service
/// account.
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies bearer tokens for Cloud Build requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Returns a currently valid access token.
    ///
    /// # Errors
    ///
    /// [`CloudBuildError::Token`] when no token can be obtained.
    async fn access_token(&self) -> Result<SecretString, CloudBuildError>;
}

/// A fixed, pre-provisioned token.
#[derive(Debug, Clone)]
pub struct StaticAccessToken(SecretString);

impl StaticAccessToken {
    /// Wraps `token`.
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

#[async_trait]
impl AccessTokenSource for StaticAccessToken {
    async fn access_token(&self) -> Result<SecretString, CloudBuildError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

/// Tokens for the runtime service account, from the metadata server.
pub struct MetadataServerAccessToken {
    http: reqwest::Client,
    endpoint: Url,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerAccessToken {
    /// Creates a source that queries `endpoint`
    /// (normally [`DEFAULT_METADATA_TOKEN_URL`]).
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<CachedToken, CloudBuildError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| CloudBuildError::Token(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudBuildError::Token(format!(
                "metadata server returned {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| CloudBuildError::Token(format!("malformed token response: {e}")))?;
        let token = SecretString::new(parsed.access_token).ok_or_else(|| {
            CloudBuildError::Token("metadata server returned an empty token".into())
        })?;

        let lifetime = Duration::from_secs(parsed.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = parsed.expires_in, "Fetched access token from metadata server");
        Ok(CachedToken {
            token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl AccessTokenSource for MetadataServerAccessToken {
    async fn access_token(&self) -> Result<SecretString, CloudBuildError> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn source_for(server: &MockServer) -> MetadataServerAccessToken {
        let endpoint = Url::parse(&format!("{}/token", server.uri())).unwrap();
        MetadataServerAccessToken::new(reqwest::Client::new(), endpoint)
    }

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let source = StaticAccessToken::new(SecretString::new("ya29.static").unwrap());
        assert_eq!(source.access_token().await.unwrap().expose(), "ya29.static");
    }

    #[tokio::test]
    async fn metadata_token_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.metadata",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert_eq!(source.access_token().await.unwrap().expose(), "ya29.metadata");
        assert_eq!(source.access_token().await.unwrap().expose(), "ya29.metadata");
    }

    #[tokio::test]
    async fn short_lived_metadata_tokens_are_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.short",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let source = source_for(&server);
        source.access_token().await.unwrap();
        source.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn metadata_server_errors_are_token_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no service account"))
            .mount(&server)
            .await;

        let err = source_for(&server).access_token().await.unwrap_err();

        assert!(matches!(err, CloudBuildError::Token(ref m) if m.contains("404")));
    }
}
