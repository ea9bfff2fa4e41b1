use std::{net::SocketAddr, sync::Arc};

use gateway_api::{ApiContext, HttpGameEngine};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod routes;

use app_state::AppState;
use config::{engine_base_url, load_settings, prepare_database_url};
use routes::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let engine = HttpGameEngine::new(
        engine_base_url(&settings.engine_url)?,
        settings.engine_timeout(),
    )?;

    let state = AppState {
        api: ApiContext {
            sessions: Arc::new(storage),
            engine: Arc::new(engine),
            session_ttl: settings.session_ttl(),
        },
        cookie_name: settings.cookie_name.clone(),
        static_dir: settings.static_dir.clone(),
        max_body_bytes: settings.max_body_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, engine = %settings.engine_url, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
