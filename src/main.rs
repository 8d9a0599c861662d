use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quiz_engine::{
    config::{get_config, init_config, StoreBackend},
    database::pool::{create_pool, run_migrations},
    routes::create_router,
    store::{MemoryStore, PgStore},
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    init_config()?;
    let config = get_config().clone();

    let app_state = match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config).await?;
            run_migrations(&pool).await?;
            let store = Arc::new(PgStore::new(pool));
            AppState::new(config.clone(), store.clone(), store)
        }
        StoreBackend::Memory => {
            tracing::warn!("running on the in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            AppState::new(config.clone(), store.clone(), store)
        }
    };

    {
        let state = app_state.clone();
        let interval = Duration::from_secs(config.reaper_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                if let Err(e) = state.session_service.expire_overdue(Utc::now()).await {
                    tracing::error!(error = ?e, "session reaper error");
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    let app = create_router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
