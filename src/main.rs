use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_mirror::config::MirrorConfig;
use pr_mirror::github::OctocrabClient;
use pr_mirror::mirror::{Mirrorer, ScriptTool};
use pr_mirror::poller::Poller;
use pr_mirror::server::{AppState, build_router};
use pr_mirror::store::FileEventStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_mirror=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MirrorConfig::from_env().context("loading configuration")?;
    info!(?config, "Starting PR mirror");

    let platform = OctocrabClient::from_token(
        config.github_token.clone(),
        config.upstream.clone(),
        config.downstream.clone(),
    )
    .context("building GitHub client")?;
    let store = FileEventStore::open(&config.state_dir)
        .with_context(|| format!("opening event store in {}", config.state_dir.display()))?;
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;
    let tool = ScriptTool::new(&config.tool_path, &config.repo_path, config.tool_timeout);

    let mirrorer = Arc::new(Mirrorer::new(
        platform,
        tool,
        store,
        config.target_branch.clone(),
        config.log_dir.clone(),
    ));

    let shutdown = CancellationToken::new();

    let poller_task = config.enable_poller.then(|| {
        let poller = Poller::new(Arc::clone(&mirrorer), config.poll.clone());
        tokio::spawn(poller.run(shutdown.clone()))
    });

    match (config.enable_webhook, config.webhook_secret.as_deref()) {
        (true, Some(secret)) => {
            let app = build_router(AppState::new(Arc::clone(&mirrorer), secret.as_bytes()));
            let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(%addr, "Listening for webhooks");

            let server_shutdown = shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    server_shutdown.cancel();
                })
                .await
                .context("serving HTTP")?;
        }
        _ => {
            tokio::signal::ctrl_c()
                .await
                .context("waiting for ctrl-c")?;
        }
    }

    info!("Shutting down");
    shutdown.cancel();
    if let Some(task) = poller_task {
        task.await.context("poller task panicked")?;
    }

    Ok(())
}
