//! Peer connection manager
//!
//! Maintains a persistent WebSocket connection to the ledger peer. Handles
//! reconnection and provides a thread-safe interface for sending transaction
//! requests. Responses are matched to callers FIFO; `submitted` frames are
//! informational and leave the pending entry in place until the terminal
//! `complete`/`error` frame arrives.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{http::Request, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::ledger::protocol;
use crate::types::{AdjusterError, Result};

pub(crate) type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub(crate) type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Peer connection manager
pub struct PeerConnection {
    /// Channel for sending transaction envelopes to the peer
    tx: mpsc::Sender<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
    /// Whether the connection is alive
    connected: Arc<RwLock<bool>>,
}

impl PeerConnection {
    /// Create a new peer connection and wait for it to come up
    pub async fn connect(peer_url: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<(Vec<u8>, oneshot::Sender<Vec<u8>>)>(1000);
        let connected = Arc::new(RwLock::new(false));

        let conn = Self {
            tx,
            connected: Arc::clone(&connected),
        };

        // Start the connection manager task
        let url = peer_url.to_string();
        let connected_flag = Arc::clone(&connected);
        tokio::spawn(async move {
            connection_loop(url, rx, connected_flag).await;
        });

        // Wait for initial connection
        for _ in 0..50 {
            if *conn.connected.read().await {
                return Ok(conn);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(AdjusterError::Ledger(
            "Timeout waiting for peer connection".into(),
        ))
    }

    /// Send a transaction envelope and wait for its terminal response
    pub async fn request(&self, data: Vec<u8>, timeout_ms: u64) -> Result<Vec<u8>> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send((data, response_tx))
            .await
            .map_err(|_| AdjusterError::Ledger("Peer connection closed".into()))?;

        match timeout(Duration::from_millis(timeout_ms), response_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(AdjusterError::Ledger("Response channel closed".into())),
            Err(_) => Err(AdjusterError::Ledger("Request timeout".into())),
        }
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop(
    peer_url: String,
    mut rx: mpsc::Receiver<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
    connected: Arc<RwLock<bool>>,
) {
    let mut reconnect_delay = Duration::from_millis(100);
    let max_reconnect_delay = Duration::from_secs(30);

    loop {
        info!("Connecting to peer at {}", peer_url);

        match connect_ws(&peer_url).await {
            Ok((ws_sink, ws_stream)) => {
                *connected.write().await = true;
                reconnect_delay = Duration::from_millis(100);
                info!("Connected to peer");

                // Run the message handling loop
                if let Err(e) = handle_messages(ws_sink, ws_stream, &mut rx).await {
                    error!("Peer connection error: {}", e);
                }

                *connected.write().await = false;
            }
            Err(e) => {
                error!("Failed to connect to peer: {}", e);
            }
        }

        // Wait before reconnecting
        warn!("Reconnecting to peer in {:?}...", reconnect_delay);
        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = (reconnect_delay * 2).min(max_reconnect_delay);
    }
}

/// Connect a WebSocket to a peer endpoint with proper headers
pub(crate) async fn connect_ws(url: &str) -> Result<(WsSink, WsStream)> {
    let request = Request::builder()
        .uri(url)
        .header("Host", url.split("//").last().unwrap_or("localhost"))
        .header("Origin", "http://localhost")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tokio_tungstenite::tungstenite::handshake::client::generate_key(),
        )
        .body(())
        .map_err(|e| AdjusterError::Ledger(format!("Failed to build request: {}", e)))?;

    let (ws, _) = connect_async_with_config(request, None, false)
        .await
        .map_err(|e| AdjusterError::Ledger(format!("WebSocket connect failed: {}", e)))?;

    Ok(ws.split())
}

/// Handle messages between the request channel and the peer WebSocket
async fn handle_messages(
    ws_sink: WsSink,
    mut ws_stream: WsStream,
    rx: &mut mpsc::Receiver<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
) -> Result<()> {
    // Pending responses in send order. The peer answers transactions FIFO,
    // with zero or more `submitted` frames ahead of each terminal frame.
    let pending: Arc<Mutex<Vec<oneshot::Sender<Vec<u8>>>>> = Arc::new(Mutex::new(Vec::new()));
    let pending_for_send = Arc::clone(&pending);

    let ws_sink = Arc::new(Mutex::new(ws_sink));
    let ws_sink_for_rx = Arc::clone(&ws_sink);

    // Task to forward outbound transaction envelopes
    let request_handler = async {
        while let Some((data, response_tx)) = rx.recv().await {
            {
                let mut pending = pending_for_send.lock().await;
                pending.push(response_tx);
            }

            let mut sink = ws_sink_for_rx.lock().await;
            if let Err(e) = sink.send(Message::Binary(data)).await {
                error!("Failed to send to peer: {}", e);
                let mut pending = pending_for_send.lock().await;
                pending.pop();
                break;
            }
        }
    };

    // Task to route inbound frames to waiting callers
    let response_handler = async {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    if protocol::is_submitted_frame(&data) {
                        debug!("Transaction submitted, awaiting completion");
                        continue;
                    }

                    let maybe_sender = {
                        let mut pending = pending.lock().await;
                        if !pending.is_empty() {
                            Some(pending.remove(0))
                        } else {
                            None
                        }
                    };

                    if let Some(sender) = maybe_sender {
                        let _ = sender.send(data.to_vec());
                    } else {
                        warn!("Received response with no pending transaction");
                    }
                }
                Ok(Message::Ping(data)) => {
                    let mut sink = ws_sink.lock().await;
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(frame)) => {
                    info!("Peer closed connection: {:?}", frame);
                    break;
                }
                Err(e) => {
                    error!("Peer WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    // Run both handlers concurrently
    tokio::select! {
        _ = request_handler => {
            debug!("Request handler ended");
        }
        _ = response_handler => {
            debug!("Response handler ended");
        }
    }

    Ok(())
}
