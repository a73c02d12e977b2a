use aegis_sim::api::{self, AppState, auth::AuthConfig};
use aegis_sim::config::ServerConfig;
use aegis_sim::store::{SimulationStore, SledStore};
use aegis_sim::{SimulationEngine, metrics, mock, telemetry};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    telemetry::init(&config.log_filter, config.log_format);
    metrics::init();

    info!(
        version = api::VERSION,
        environment = ?config.environment,
        "starting aegis simulation server"
    );

    let mut engine = SimulationEngine::new(config.engine());
    if let Some(dir) = &config.data_dir {
        let store = SledStore::open(dir)
            .with_context(|| format!("failed to open data directory {}", dir.display()))?;
        info!(path = %dir.display(), "write-through store enabled");
        engine = engine.with_store(Arc::new(store) as Arc<dyn SimulationStore>);
    }
    let engine = Arc::new(engine);

    if config.seeds_demo_data() {
        mock::seed_demo_simulation(&engine).context("failed to seed demo simulation")?;
    }

    let state = AppState::new(
        engine.clone(),
        AuthConfig {
            username: config.admin_user.clone(),
            password: config.admin_password.clone(),
        },
    );
    let app = api::router(state, &config.cors_origins);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down, stopping phase drivers");
        })
        .await
        .context("server error")?;

    engine.shutdown().await;
    info!("goodbye");
    Ok(())
}
