use std::sync::Arc;

use anyhow::Context;
use showbuff_metadata::provider::TitleSearchProvider;
use showbuff_metadata::remote::RemoteMetadataClient;
use showbuff_metadata::tmdb::TmdbClient;
use showbuff_server::config::ImporterConfig;
use showbuff_server::queue::{self, ImportQueue};
use showbuff_server::state::{AppState, ServerEvent};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ImporterConfig::from_env();
    info!(db_path = %config.db_path, env = %config.env, "connecting to database");

    let pool = showbuff_db::connect(&config.db_path)
        .await
        .context("failed to connect to database")?;

    showbuff_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    std::fs::create_dir_all(&config.upload_dir).context("failed to create upload dir")?;

    let provider: Option<Arc<dyn TitleSearchProvider>> = match &config.tmdb_api_key {
        Some(key) => {
            let client: Arc<dyn TitleSearchProvider> =
                Arc::new(TmdbClient::new(key.clone()).context("failed to build TMDB client")?);
            Some(client)
        }
        None => {
            warn!("TMDB_API_KEY not set, remote title search disabled");
            None
        }
    };
    let remote = Arc::new(RemoteMetadataClient::new(provider));

    let (events_tx, _) = tokio::sync::broadcast::channel::<ServerEvent>(256);

    // Heartbeat keeps idle SSE subscribers informed the server is alive.
    {
        let tx = events_tx.clone();
        tokio::spawn(async move {
            let mut seq = 0u64;
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                let _ = tx.send(ServerEvent::Heartbeat { seq });
                seq += 1;
            }
        });
    }

    let (import_queue, receiver) = ImportQueue::new();
    let bind_addr = config.bind_addr.clone();

    let app_state = AppState {
        db: pool,
        config: Arc::new(config),
        remote,
        events: events_tx,
        queue: import_queue,
    };
    let worker = queue::spawn_worker(app_state.job_context(), receiver);

    let app = showbuff_server::routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    // The router (and with it every queue sender) is gone; let the worker drain.
    worker.await.context("import worker panicked")?;
    Ok(())
}
