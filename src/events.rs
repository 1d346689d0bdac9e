use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use warp::ws::Message;
use warp::Filter;

use crate::form::RequestState;

const EVENT_CAPACITY: usize = 64;

/// Everything a connected page hears about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    StateChanged { state: RequestState, thumbnails: usize },
    ArchiveProgress { index: usize, total: usize, ok: bool },
    Notice { message: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: UiEvent) {
        // No subscribers is the normal case for the CLI.
        if let Err(e) = self.tx.send(event) {
            debug!("Dropped event with no listeners: {:?}", e.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }
}

/// `current` produces the state a newly connected page is told about first, so a
/// page rendered mid-request still learns that the request has settled.
pub fn ws_route<F>(
    bus: EventBus,
    current: F,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone
where
    F: Fn() -> UiEvent + Clone + Send + Sync + 'static,
{
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let bus = bus.clone();
            let current = current.clone();
            ws.on_upgrade(move |socket| websocket_handler(socket, bus, current))
        })
}

fn encode(event: &UiEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::text(text)),
        Err(e) => {
            warn!("Failed to encode event: {e}");
            None
        }
    }
}

async fn websocket_handler<F>(ws: warp::ws::WebSocket, bus: EventBus, current: F)
where
    F: Fn() -> UiEvent,
{
    info!("New WebSocket connection established");
    let (mut ws_tx, mut ws_rx) = ws.split();
    // Subscribe before reading the current state so no transition falls in between.
    let mut rx = bus.subscribe();
    if let Some(message) = encode(&current()) {
        if let Err(e) = ws_tx.send(message).await {
            warn!("WebSocket send error: {e}");
            return;
        }
    }

    let mut receive_task = tokio::spawn(async move {
        while let Some(result) = ws_rx.next().await {
            match result {
                Ok(msg) if msg.is_close() => {
                    debug!("WebSocket connection closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {e}");
                    break;
                }
            }
        }
    });

    let mut forward_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("WebSocket listener lagged by {skipped} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(message) = encode(&event) else {
                continue;
            };
            if let Err(e) = ws_tx.send(message).await {
                warn!("WebSocket send error: {e}");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut receive_task => forward_task.abort(),
        _ = &mut forward_task => receive_task.abort(),
    }
}
