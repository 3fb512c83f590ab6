//! HTTP transport: an axum router that streams pipeline events as SSE.

pub mod api;
pub mod sse;
pub mod state;

pub use api::create_router;
pub use state::{AppState, Service};

use std::sync::Arc;

use crate::config::ServerConfig;

/// Bind `config` and serve until the process is stopped.
pub async fn serve(config: ServerConfig, state: AppState) -> std::io::Result<()> {
    let address = config.address();
    log::info!("Initializing podcast HTTP server");
    log::debug!("Server configuration: {:?}", config);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    log::info!("Listening on http://{address}");
    axum::serve(listener, create_router(Arc::new(state))).await
}
