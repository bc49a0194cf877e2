use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;

use crate::state::{AppState, StreamEvent};

pub async fn events_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(mut socket: WebSocket, state: AppState) {
    // Subscribe before greeting so nothing emitted in between is lost.
    let mut events = state.events().subscribe();

    let connected = StreamEvent::Connected {
        status: state.controller().status(),
    };
    if send_event(&mut socket, &connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, &StreamEvent::Activity { event }).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &StreamEvent) -> Result<(), ()> {
    let payload = event_json(event)?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

fn event_json(event: &StreamEvent) -> Result<String, ()> {
    serde_json::to_string(event).map_err(|_| ())
}
