use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod deploy;
pub mod manifest;
pub mod service;

use api::AppState;
use api::socket::ConnectionKeys;
use config::{Args, Config};
use deploy::{ComposeCli, DockerCli, GitCli};
use service::{
    BuildPipeline, PipelineSettings, ProjectRegistry, SessionHub, Sessions, WebhookIngress,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wharf_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Wharf Controller...");

    let config = Config::from_args(Args::parse()).context("Invalid configuration")?;

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let apps_dir = config.resolve_apps_dir(&cwd);
    let projects = manifest::discover_projects(&apps_dir, config.manifest_file())
        .with_context(|| format!("Failed to load projects from {}", apps_dir.display()))?;

    tracing::info!(
        "Loaded {} project(s) from {}",
        projects.len(),
        apps_dir.display()
    );

    let Config {
        bind_addr,
        image_namespace,
        pull_timeout,
        ping_interval,
        worker_max_message_size,
        secrets,
        ..
    } = config;

    let sessions = Arc::new(Sessions::new());
    let registry = Arc::new(ProjectRegistry::new(Arc::clone(&sessions), projects));
    let pipeline = BuildPipeline::new(
        PipelineSettings {
            apps_dir,
            image_namespace,
            pull_timeout,
        },
        Arc::new(DockerCli::default()),
        Arc::new(GitCli::default()),
        Arc::new(ComposeCli::default()),
        Arc::clone(&registry),
    );
    let hub = Arc::new(SessionHub::new(Arc::clone(&sessions), registry, pipeline));

    if let Some(interval) = ping_interval {
        service::spawn_liveness_probe(Arc::clone(&hub), interval);
        tracing::info!("Pinging attached worker every {}s", interval.as_secs());
    }

    let state = AppState {
        hub,
        ingress: Arc::new(WebhookIngress::new(secrets.github, sessions)),
        keys: Arc::new(ConnectionKeys::new(secrets.worker, secrets.router)),
        worker_max_message_size,
    };

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
