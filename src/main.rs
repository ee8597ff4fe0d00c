//! graphql-ws-gateway server entry point.
//!
//! Starts the Axum server with the `graphql-transport-ws` WebSocket
//! endpoint.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use graphql_ws_gateway::app_state::AppState;
use graphql_ws_gateway::config::GatewayConfig;
use graphql_ws_gateway::service::{DocumentResolver, SubscriptionServer};
use graphql_ws_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting graphql-ws-gateway");

    // Build the protocol server
    let server = SubscriptionServer::new(
        Arc::new(DocumentResolver::new()),
        config.connection_init_timeout(),
    );

    // Build application state
    let app_state = AppState {
        server,
        outbound_buffer: config.outbound_buffer,
    };

    // Build router
    let app = Router::new()
        .route("/graphql", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
