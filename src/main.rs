use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use helpdesk_backend::core::config::AppPaths;
use helpdesk_backend::core::logging;
use helpdesk_backend::server;
use helpdesk_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths);

    // Configuration errors are fatal: abort before serving any traffic.
    let state = AppState::initialize(paths)
        .await
        .context("startup failed")?;

    let bind_addr = format!("127.0.0.1:{}", state.config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
