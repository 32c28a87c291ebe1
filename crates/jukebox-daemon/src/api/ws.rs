use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use jukebox_proto::Event;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;

pub async fn handler(ws: WebSocketUpgrade, State(service): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, service))
}

/// Push every broadcast event to one client, starting with the current snapshot
async fn stream_events(socket: WebSocket, service: AppState) {
    let mut events = service.subscribe();
    let (mut sender, mut receiver) = socket.split();
    info!("WebSocket client connected");

    if let Some(snapshot) = service.current_playback().await {
        if send_event(&mut sender, &Event::PlaybackChanged { snapshot }).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("WebSocket client lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("WebSocket client disconnected");
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &Event,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}
