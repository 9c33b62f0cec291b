//! Event hub connection
//!
//! The peer exposes chaincode events on a WebSocket endpoint separate from
//! the transaction interface. Registrations are per-connection: the hub
//! re-registers the configured event names after every (re)connect, keeps
//! the registration ids the peer hands back, and releases them all before
//! disconnecting on shutdown.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

use crate::ledger::connection::{connect_ws, WsSink, WsStream};
use crate::ledger::protocol::{self, LedgerEvent, PeerStatus};
use crate::types::{AdjusterError, Result};

enum HubCommand {
    Shutdown(oneshot::Sender<()>),
}

/// Event hub connection manager
pub struct EventHub {
    command_tx: mpsc::Sender<HubCommand>,
    connected: Arc<RwLock<bool>>,
}

impl EventHub {
    /// Connect to the event hub and register the given chaincode events.
    ///
    /// Decoded events are pushed onto `events_tx`; when the channel is full
    /// the event is dropped with a warning and at-least-once ledger
    /// redelivery covers the loss.
    pub async fn connect(
        events_url: &str,
        chaincode_id: &str,
        event_names: Vec<String>,
        events_tx: mpsc::Sender<LedgerEvent>,
    ) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel(8);
        let connected = Arc::new(RwLock::new(false));

        let url = events_url.to_string();
        let chaincode = chaincode_id.to_string();
        let connected_flag = Arc::clone(&connected);
        tokio::spawn(async move {
            hub_loop(
                url,
                chaincode,
                event_names,
                events_tx,
                command_rx,
                connected_flag,
            )
            .await;
        });

        let hub = Self {
            command_tx,
            connected: Arc::clone(&connected),
        };

        // Wait for initial connection
        for _ in 0..50 {
            if *hub.connected.read().await {
                return Ok(hub);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(AdjusterError::Ledger(
            "Timeout waiting for event hub connection".into(),
        ))
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Release all event registrations and close the connection
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.command_tx.send(HubCommand::Shutdown(ack_tx)).await.is_ok() {
            let _ = tokio::time::timeout(Duration::from_secs(2), ack_rx).await;
        }
    }
}

/// Main hub loop with reconnection logic
async fn hub_loop(
    events_url: String,
    chaincode_id: String,
    event_names: Vec<String>,
    events_tx: mpsc::Sender<LedgerEvent>,
    mut command_rx: mpsc::Receiver<HubCommand>,
    connected: Arc<RwLock<bool>>,
) {
    let mut reconnect_delay = Duration::from_millis(100);
    let max_reconnect_delay = Duration::from_secs(30);
    let mut envelope_id = 0u64;

    loop {
        info!("Connecting to event hub at {}", events_url);

        match connect_ws(&events_url).await {
            Ok((mut ws_sink, ws_stream)) => {
                // Registrations died with any previous connection
                let mut registrations: Vec<String> = Vec::new();

                match send_registrations(&mut ws_sink, &chaincode_id, &event_names, &mut envelope_id)
                    .await
                {
                    Ok(()) => {
                        *connected.write().await = true;
                        reconnect_delay = Duration::from_millis(100);
                        info!(events = ?event_names, "Event hub connected");

                        let shutdown = run_hub(
                            ws_sink,
                            ws_stream,
                            &events_tx,
                            &mut command_rx,
                            &mut registrations,
                            &mut envelope_id,
                        )
                        .await;

                        *connected.write().await = false;
                        if shutdown {
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Failed to register events: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Failed to connect to event hub: {}", e);
            }
        }

        warn!("Reconnecting to event hub in {:?}...", reconnect_delay);
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            maybe_cmd = command_rx.recv() => {
                // Disconnected, nothing to unregister
                if let Some(HubCommand::Shutdown(ack)) = maybe_cmd {
                    let _ = ack.send(());
                }
                return;
            }
        }
        reconnect_delay = (reconnect_delay * 2).min(max_reconnect_delay);
    }
}

/// Register every configured event name on a fresh connection
async fn send_registrations(
    ws_sink: &mut WsSink,
    chaincode_id: &str,
    event_names: &[String],
    envelope_id: &mut u64,
) -> Result<()> {
    for name in event_names {
        let payload = protocol::build_register_event_payload(chaincode_id, name);
        *envelope_id += 1;
        let envelope = protocol::build_request_envelope(*envelope_id, &payload);

        ws_sink
            .send(Message::Binary(envelope))
            .await
            .map_err(|e| {
                AdjusterError::Ledger(format!("Failed to register event {}: {}", name, e))
            })?;
    }
    Ok(())
}

/// Release the held registration ids before disconnecting
async fn release_registrations(
    ws_sink: &mut WsSink,
    registrations: &[String],
    envelope_id: &mut u64,
) {
    for registration_id in registrations {
        let payload = protocol::build_unregister_event_payload(registration_id);
        *envelope_id += 1;
        let envelope = protocol::build_request_envelope(*envelope_id, &payload);

        if let Err(e) = ws_sink.send(Message::Binary(envelope)).await {
            warn!(
                registration_id = %registration_id,
                "Failed to unregister event: {}", e
            );
        }
    }
    info!(count = registrations.len(), "Released event registrations");
}

/// Process frames on a live hub connection. Returns true when shutdown was
/// requested, false when the connection dropped and a reconnect is due.
async fn run_hub(
    mut ws_sink: WsSink,
    mut ws_stream: WsStream,
    events_tx: &mpsc::Sender<LedgerEvent>,
    command_rx: &mut mpsc::Receiver<HubCommand>,
    registrations: &mut Vec<String>,
    envelope_id: &mut u64,
) -> bool {
    loop {
        tokio::select! {
            maybe_cmd = command_rx.recv() => {
                match maybe_cmd {
                    Some(HubCommand::Shutdown(ack)) => {
                        release_registrations(&mut ws_sink, registrations, envelope_id).await;
                        let _ = ws_sink.send(Message::Close(None)).await;
                        let _ = ack.send(());
                        return true;
                    }
                    None => return true,
                }
            }
            maybe_msg = ws_stream.next() => {
                let Some(msg) = maybe_msg else {
                    info!("Event hub stream ended");
                    return false;
                };

                match msg {
                    Ok(Message::Binary(data)) => {
                        handle_frame(&data, events_tx, registrations);
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = ws_sink.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Close(frame)) => {
                        info!("Event hub closed connection: {:?}", frame);
                        return false;
                    }
                    Err(e) => {
                        error!("Event hub WebSocket error: {}", e);
                        return false;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Route one inbound frame: a pushed chaincode event or a registration reply
fn handle_frame(
    data: &[u8],
    events_tx: &mpsc::Sender<LedgerEvent>,
    registrations: &mut Vec<String>,
) {
    if let Some(event) = protocol::parse_event_frame(data) {
        debug!(event = %event.name, "Ledger event received");
        match events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    event = %event.name,
                    "Settlement channel full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(
                    event = %event.name,
                    "Settlement channel closed, dropping event"
                );
            }
        }
        return;
    }

    match protocol::parse_peer_response(data) {
        Ok(response) if response.status == PeerStatus::Complete => {
            if let Some(registration_id) = response.result {
                debug!(registration_id = %registration_id, "Event registration confirmed");
                registrations.push(registration_id);
            }
        }
        Ok(response) => {
            error!(
                "Event registration failed: {}",
                response.message.unwrap_or_else(|| "unknown".to_string())
            );
        }
        Err(e) => {
            warn!("Unrecognized event hub frame: {}", e);
        }
    }
}
