use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::registry::Hub;
use crate::types::OutboundMessage;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
}

/// Drives one upgraded connection end to end: registers it with the hub,
/// splits the socket into reader/writer halves running as independent
/// tasks, and deregisters on exit however that exit happens (client close,
/// write error, or heartbeat timeout).
pub async fn run(socket: WebSocket, hub: Arc<Hub>, tenant_id: Uuid, identity_id: Uuid) {
    let (connection_id, outbound_rx) = hub.register(tenant_id, identity_id);
    let (sink, stream) = socket.split();

    let last_pong_at = Arc::new(Mutex::new(Instant::now()));
    let closed = Arc::new(AtomicBool::new(false));

    let writer = tokio::spawn(writer_loop(
        sink,
        outbound_rx,
        hub.config().heartbeat_interval,
        hub.config().pong_timeout(),
        last_pong_at.clone(),
        closed.clone(),
    ));
    let reader = reader_loop(
        stream,
        hub.clone(),
        tenant_id,
        connection_id,
        hub.config().max_frame_bytes,
        last_pong_at,
        closed.clone(),
    );

    reader.await;
    closed.store(true, Ordering::SeqCst);
    writer.abort();
    hub.deregister(tenant_id, connection_id);
}

async fn reader_loop(
    mut stream: futures::stream::SplitStream<WebSocket>,
    hub: Arc<Hub>,
    tenant_id: Uuid,
    connection_id: Uuid,
    max_frame_bytes: usize,
    last_pong_at: Arc<Mutex<Instant>>,
    closed: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        if closed.load(Ordering::SeqCst) {
            return;
        }
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(%connection_id, %err, "websocket read error");
                return;
            }
        };

        match message {
            Message::Pong(_) => {
                *last_pong_at.lock().expect("last_pong_at poisoned") = Instant::now();
            }
            Message::Close(_) => return,
            Message::Text(text) => {
                if text.len() > max_frame_bytes {
                    tracing::warn!(%connection_id, len = text.len(), "oversized websocket frame rejected");
                    return;
                }
                handle_control_message(&hub, tenant_id, connection_id, &text);
            }
            Message::Binary(data) => {
                if data.len() > max_frame_bytes {
                    tracing::warn!(%connection_id, len = data.len(), "oversized websocket frame rejected");
                    return;
                }
            }
            Message::Ping(_) => {}
        }
    }
}

fn handle_control_message(hub: &Hub, tenant_id: Uuid, connection_id: Uuid, text: &str) {
    match serde_json::from_str::<ControlMessage>(text) {
        Ok(ControlMessage::Subscribe { channel }) => hub.subscribe(tenant_id, connection_id, channel),
        Ok(ControlMessage::Unsubscribe { channel }) => hub.unsubscribe(tenant_id, connection_id, &channel),
        Err(err) => tracing::debug!(%connection_id, %err, "ignoring unrecognized control message"),
    }
}

async fn writer_loop(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: tokio::sync::mpsc::Receiver<OutboundMessage>,
    heartbeat_interval: std::time::Duration,
    pong_timeout: std::time::Duration,
    last_pong_at: Arc<Mutex<Instant>>,
    closed: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(heartbeat_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(OutboundMessage(payload)) => {
                        if sink.send(Message::Text(payload)).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
            _ = ticker.tick() => {
                let elapsed = last_pong_at.lock().expect("last_pong_at poisoned").elapsed();
                if elapsed > pong_timeout {
                    tracing::debug!(?elapsed, "websocket heartbeat timed out, closing");
                    closed.store(true, Ordering::SeqCst);
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }
}
