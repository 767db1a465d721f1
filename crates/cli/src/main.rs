//! gcb-pr entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Read configuration** — environment variables (optionally preloaded from
//!    a `.env` file), validated into [`config::Config`].
//! 2. **Wire observability** — configure `tracing-subscriber` with a JSON or
//!    pretty layer and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an
//!    OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure** — `GitFetcher`, `CloudBuildClient` with its
//!    token source, and the `Dispatcher` that drives them.
//! 4. **Serve** — bind the webhook listener and run until interrupted.
//!
//! Startup failures (bad configuration, bind errors) exit non-zero. Per-event
//! failures never do.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use checkout::GitFetcher;
use cloudbuild::{
    AccessTokenSource, CloudBuildClient, MetadataServerAccessToken, StaticAccessToken,
    DEFAULT_METADATA_TOKEN_URL,
};
use dispatch::Dispatcher;
use tokio::net::TcpListener;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;
    let telemetry = telemetry::init(config.log_format, config.otlp_endpoint.as_deref())?;

    let result = run(config).await;
    if let Err(e) = &result {
        tracing::error!(error = format!("{e:#}"), "gcb-pr stopped");
    }
    telemetry.shutdown();
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("gcb-pr/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let tokens: Arc<dyn AccessTokenSource> = match config.gcp_access_token.clone() {
        Some(token) => Arc::new(StaticAccessToken::new(token)),
        None => Arc::new(MetadataServerAccessToken::new(
            http.clone(),
            Url::parse(DEFAULT_METADATA_TOKEN_URL)?,
        )),
    };
    let builds = Arc::new(CloudBuildClient::new(
        http,
        config.cloudbuild_api_url.clone(),
        tokens,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        config.dispatch_config(),
        Arc::new(GitFetcher::new()),
        builds,
    ));

    if config.github_access_token.is_none() {
        warn!("GITHUB_ACCESS_TOKEN is not set; events for private repositories will be dropped");
    }
    info!(
        project_id = %config.project_id,
        webhook_path = %config.webhook_path,
        build_spec = %config.build_spec_path.display(),
        workspace_root = %config.workspace_root.display(),
        static_gcp_token = config.gcp_access_token.is_some(),
        "Starting gcb-pr"
    );

    let router = listener::router(config.webhook_config(), dispatcher);
    let tcp = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    listener::serve(tcp, router, shutdown_signal())
        .await
        .context("webhook server failed")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupt received, shutting down");
    }
}
