//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::service::SUB_PROTOCOL;

/// `GET /graphql` — Upgrade to a WebSocket speaking `graphql-transport-ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let server = state.server.clone();
    let outbound_buffer = state.outbound_buffer;

    ws.protocols([SUB_PROTOCOL])
        .on_upgrade(move |socket| run_connection(socket, server, outbound_buffer))
}
