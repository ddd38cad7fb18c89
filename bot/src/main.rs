//! Tally bot HTTP server.

use anyhow::Context;
use std::sync::Arc;
use tally_bot::discord::{BackupChannel, CachedRoleDirectory, DiscordClient, SignatureVerifier};
use tally_bot::{AppState, BotEnvironment, BotState, BotStore, Config, InteractionReducer, router};
use tally_core::access::RoleGate;
use tally_core::environment::SystemClock;
use tally_runtime::metrics::MetricsRecorder;
use tally_sqlite::SqliteCounterStore;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tally_bot=debug,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tally bot");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        database = %config.database.url,
        staff_role = %config.staff_role,
        leaderboard_size = config.leaderboard_size,
        "Configuration loaded"
    );

    let metrics = match MetricsRecorder::install() {
        Ok(recorder) => Some(recorder),
        Err(error) => {
            warn!(error = %error, "Metrics disabled");
            None
        },
    };

    // Storage
    let counters = SqliteCounterStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    counters.migrate().await.context("Failed to run migrations")?;
    info!("Database ready");

    // Discord
    let client = DiscordClient::new(config.discord.token.clone(), config.discord.request_timeout)
        .context("Failed to build Discord client")?;
    if config.discord.register_commands {
        client
            .register_commands(&config.discord.application_id)
            .await
            .context("Failed to register commands")?;
        info!("Commands registered");
    }
    let verifier = SignatureVerifier::from_hex(&config.discord.public_key).context("Invalid public key")?;

    // Store
    let storage: Arc<SqliteCounterStore> = Arc::new(counters.clone());
    let env = BotEnvironment::new(
        storage.clone(),
        Arc::new(BackupChannel::new(client.clone(), config.discord.backup_channel_id.clone())),
        Arc::new(SystemClock),
        RoleGate::new(config.staff_role.clone()),
    )
    .with_leaderboard_size(config.leaderboard_size)
    .with_backup_timeout(config.discord.backup_timeout);
    let store: BotStore = BotStore::new(BotState::default(), InteractionReducer::new(), env);

    let app = router(AppState {
        store: store.clone(),
        verifier,
        roles: Arc::new(CachedRoleDirectory::new(client)),
        response_timeout: config.server.response_timeout,
        storage,
        metrics,
    });

    let addr = config.server.addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Listening for interactions");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server stopped, draining effects");
    if let Err(error) = store.shutdown(config.server.shutdown_timeout).await {
        warn!(error = %error, "Effects still running at shutdown");
    }

    let tallies = store.state(Clone::clone).await;
    info!(?tallies, "Final tallies");

    counters.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(error = %error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(error = %error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
