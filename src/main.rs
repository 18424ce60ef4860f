use std::net::SocketAddr;
use std::sync::Arc;

use ats_pipeline::{
    app,
    config::{get_config, init_config},
    database::{pool::create_pool, PgStore},
    storage::LocalBlobStorage,
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    tokio::fs::create_dir_all(&config.storage_dir).await?;
    info!("Storing uploads under: {}", config.storage_dir);

    let app_state = AppState::from_config(
        Arc::new(PgStore::new(pool)),
        Arc::new(LocalBlobStorage::new(&config.storage_dir)),
    )?;
    let app = app(app_state, config.max_upload_bytes);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
