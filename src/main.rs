use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use tinta::auth::SessionStore;
use tinta::config::{Cli, Config};
use tinta::db;
use tinta::db::documents::{DocumentStore, SqliteDocumentStore};
use tinta::routes;
use tinta::state::AppState;
use tinta::store::{CoverImageStore, PostStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.auth.password.is_none() && config.auth.password_hash.is_none() {
        tracing::warn!("No admin password configured; mutating endpoints will reject all requests");
    }

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Build the stores once; every collaborator goes through these handles
    let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));
    let images = Arc::new(CoverImageStore::open(documents.clone()).await?);
    let posts = Arc::new(PostStore::open(documents, images.clone()).await?);

    // Optional daily sweep of stale cover images
    if let Some(days) = config.images.evict_after_days {
        let images = images.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
            loop {
                interval.tick().await;
                if let Err(err) = images.evict_older_than(days as i64).await {
                    tracing::warn!("Cover image sweep failed: {}", err);
                }
            }
        });
    }

    let state = AppState {
        config: config.clone(),
        posts,
        images,
        sessions: Arc::new(Mutex::new(SessionStore::new())),
    };

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
