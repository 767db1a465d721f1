//! Source Resolver: turns an event's head repository into a fetch location.
//!
//! Public repositories are fetched from their canonical clone URL unchanged.
//! Private repositories need the process-wide access token; it travels beside
//! the URL in [`FetchCredentials`] instead of being spliced into it, so the
//! URL itself is always safe to log.

use url::Url;

use crate::{BranchName, DispatchError, PullRequestHead, SecretString};

/// Username GitHub expects when an installation or personal token is used
/// for HTTPS Git access.
pub const TOKEN_USERNAME: &str = "x-access-token";

const DEFAULT_HOST: &str = "github.com";

/// HTTP basic credentials for an authenticated fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCredentials {
    /// Userinfo name; always [`TOKEN_USERNAME`] for tokens issued by GitHub.
    pub username: String,
    /// The access token.
    pub token: SecretString,
}

/// Where and what to fetch for one event.
///
/// `Debug` is safe: the URL never carries credentials and the token is a
/// [`SecretString`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLocation {
    url: String,
    reference: BranchName,
    credentials: Option<FetchCredentials>,
}

impl FetchLocation {
    /// Creates an unauthenticated location.
    pub fn public(url: impl Into<String>, reference: BranchName) -> Self {
        Self {
            url: url.into(),
            reference,
            credentials: None,
        }
    }

    /// Creates a location that must be fetched with `credentials`.
    pub fn authenticated(
        url: impl Into<String>,
        reference: BranchName,
        credentials: FetchCredentials,
    ) -> Self {
        Self {
            url: url.into(),
            reference,
            credentials: Some(credentials),
        }
    }

    /// Repository URL without credentials.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Branch to fetch.
    pub fn reference(&self) -> &BranchName {
        &self.reference
    }

    /// Credentials to present, if the repository is private.
    pub fn credentials(&self) -> Option<&FetchCredentials> {
        self.credentials.as_ref()
    }

    /// The URL with credentials embedded in its userinfo component
    /// (`https://x-access-token:<token>@<host>/<owner>/<repo>`), or the plain
    /// URL when the location is public.
    ///
    /// Returned as a [`SecretString`] because it is credential-bearing; only
    /// hand it to transports that cannot take a separate credential.
    pub fn credentialed_url(&self) -> Option<SecretString> {
        let Some(creds) = &self.credentials else {
            return SecretString::new(self.url.clone());
        };
        let rest = self
            .url
            .strip_prefix("https://")
            .unwrap_or(self.url.as_str());
        SecretString::new(format!(
            "https://{}:{}@{}",
            creds.username,
            creds.token.expose(),
            rest
        ))
    }
}

/// Resolves the fetch location for a pull request head.
///
/// `access_token` is the configured private-repository token, if any.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] when the head repository is
/// private and no token is configured. No fetch should be attempted then.
pub fn resolve_fetch_location(
    head: &PullRequestHead,
    access_token: Option<&SecretString>,
) -> Result<FetchLocation, DispatchError> {
    let repo = &head.repository;
    if !repo.private {
        return Ok(FetchLocation::public(
            repo.clone_url.clone(),
            head.reference.clone(),
        ));
    }

    let token = access_token.ok_or_else(|| DispatchError::Configuration {
        message: format!(
            "GITHUB_ACCESS_TOKEN is required to fetch private repository {}",
            repo.full_name
        ),
    })?;

    let url = format!("https://{}/{}", clone_host(&repo.clone_url), repo.full_name);
    Ok(FetchLocation::authenticated(
        url,
        head.reference.clone(),
        FetchCredentials {
            username: TOKEN_USERNAME.to_owned(),
            token: token.clone(),
        },
    ))
}

/// Host (and port, if any) of the clone URL; `github.com` when it cannot be
/// parsed. Keeps GitHub Enterprise hosts working.
fn clone_host(clone_url: &str) -> String {
    let Ok(url) = Url::parse(clone_url) else {
        return DEFAULT_HOST.to_owned();
    };
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_owned(),
        (None, _) => DEFAULT_HOST.to_owned(),
    }
}
