//! axum WebSocket route for the status channel.
//!
//! Each socket is split: a writer task drains the connection's hub queue
//! into the socket, while the reader forwards client text to the hub. A
//! connection over the ceiling is closed with code 1008 right after the
//! upgrade, and one whose snapshot cannot be built with 1011.

use crate::status::{
    domain::HubFrame,
    ports::StatusSnapshotSource,
    services::ConnectionHub,
};
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

/// Builds a router serving the status channel at `/ws`.
pub fn status_routes<S>(hub: ConnectionHub<S>) -> Router
where
    S: StatusSnapshotSource + 'static,
{
    Router::new()
        .route("/ws", get(status_socket::<S>))
        .with_state(hub)
}

async fn status_socket<S>(
    State(hub): State<ConnectionHub<S>>,
    upgrade: WebSocketUpgrade,
) -> Response
where
    S: StatusSnapshotSource + 'static,
{
    upgrade.on_upgrade(move |socket| serve_socket(socket, hub))
}

fn to_message(frame: HubFrame) -> Message {
    match frame {
        HubFrame::Text(text) => Message::Text(text.into()),
        HubFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

async fn serve_socket<S>(mut socket: WebSocket, hub: ConnectionHub<S>)
where
    S: StatusSnapshotSource + 'static,
{
    let subscription = match hub.connect().await {
        Ok(subscription) => subscription,
        Err(err) => {
            let frame = HubFrame::close(err.close_code(), err.to_string());
            if let Err(send_err) = socket.send(to_message(frame)).await {
                debug!(error = %send_err, "rejected client went away before close");
            }
            return;
        }
    };
    let (id, mut frames) = subscription.into_parts();
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let closing = matches!(frame, HubFrame::Close { .. });
            if sink.send(to_message(frame)).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if let Err(err) = hub.handle_text(id, text.as_str()).await {
                    debug!(connection_id = %id, error = %err, "ending session");
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    hub.disconnect(id);
    if let Err(err) = writer.await {
        debug!(connection_id = %id, error = %err, "socket writer ended abnormally");
    }
}
