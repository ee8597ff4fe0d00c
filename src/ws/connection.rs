//! Per-socket read/write loop.
//!
//! Bridges one WebSocket to the protocol server: a writer task drains the
//! connection's outbound queue (emitting the close frame when the server
//! terminates the connection), while the read loop forwards text frames to
//! [`SubscriptionServer::on_message`] strictly in arrival order.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::domain::{ClientHandle, Outbound};
use crate::service::SubscriptionServer;

/// Runs the protocol over a single WebSocket until either side closes it.
pub async fn run_connection(
    socket: WebSocket,
    server: SubscriptionServer,
    outbound_buffer: usize,
) {
    let (ws_tx, ws_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_buffer);
    let client = ClientHandle::new(outbound_tx);

    tokio::spawn(write_outbound(ws_tx, outbound_rx));

    server.on_open(client.clone()).await;
    read_frames(ws_rx, &server, &client).await;
    server.on_close(&client).await;

    tracing::debug!(client = %client.id(), "ws connection finished");
}

/// Forwards inbound frames to the server until the socket ends.
async fn read_frames(
    mut ws_rx: SplitStream<WebSocket>,
    server: &SubscriptionServer,
    client: &ClientHandle,
) {
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => server.on_message(client, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            // Ping/pong are answered by the transport; binary frames are not
            // part of this protocol.
            Ok(_) => {}
            Err(error) => {
                server.on_error(client, &error).await;
                break;
            }
        }
    }
}

/// Drains the outbound queue into the socket.
///
/// Stops after emitting a close frame, when the socket rejects a send, or
/// when every [`ClientHandle`] for this connection is gone.
async fn write_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
) {
    while let Some(outbound) = outbound_rx.recv().await {
        match outbound {
            Outbound::Frame(frame) => {
                if ws_tx.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
            Outbound::Close(code, reason) => {
                let _ = ws_tx
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        }
    }
}
