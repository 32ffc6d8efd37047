//! WebSocket subscriber server.
//!
//! Each connected client receives every broadcast hub message as JSON, plus
//! direct messages addressed only to it (command rejections and the initial
//! snapshot). Inbound text frames are decoded into [`OperatorCommand`]s and
//! forwarded to the single processing loop over a request channel, so
//! command handling is never concurrent with telegram processing.

use std::net::SocketAddr;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use spraygate_state::BroadcastHub;
use spraygate_types::{GatewayError, ServerMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Default TCP port for the subscriber WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// A request forwarded from a connection task to the processing loop.
#[derive(Debug)]
pub enum ServerRequest {
    /// A client connected; the loop replies with the initial snapshot and
    /// configuration messages on `reply`.
    Subscribe {
        reply: mpsc::UnboundedSender<ServerMessage>,
    },
    /// A decoded operator command. A rejection goes back on `reply` only.
    Command {
        command: crate::command::OperatorCommand,
        reply: mpsc::UnboundedSender<ServerMessage>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// SubscriberServer
// ────────────────────────────────────────────────────────────────────────────

/// Accepts WebSocket subscribers and bridges them to the broadcast hub and
/// the processing loop's request channel.
pub struct SubscriberServer {
    hub: BroadcastHub,
    requests: mpsc::UnboundedSender<ServerRequest>,
    port: u16,
}

impl SubscriberServer {
    pub fn new(hub: BroadcastHub, requests: mpsc::UnboundedSender<ServerRequest>) -> Self {
        Self {
            hub,
            requests,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept connections forever. Each connection runs in its own task; a
    /// failed connection never affects the others.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Channel(format!("bind error on {addr}: {e}")))?;

        info!(port = self.port, "subscriber server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let hub = self.hub.clone();
                    let requests = self.requests.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, hub, requests).await {
                            warn!(%peer, error = %e, "subscriber connection ended");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-connection handler
// ────────────────────────────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: BroadcastHub,
    requests: mpsc::UnboundedSender<ServerRequest>,
) -> Result<(), GatewayError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| GatewayError::Channel(format!("WS handshake from {peer}: {e}")))?;
    info!(%peer, "subscriber connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut hub_rx = hub.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel();

    // Announce the new subscriber; the processing loop answers with the
    // initial state and configuration on the direct channel.
    let _ = requests.send(ServerRequest::Subscribe {
        reply: direct_tx.clone(),
    });

    loop {
        tokio::select! {
            // ── Broadcast: hub → client ─────────────────────────────────────
            result = hub_rx.recv() => {
                match result {
                    Ok(message) => {
                        if send_json(&mut ws_tx, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%peer, missed = n, "slow subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            // ── Direct: processing loop → this client only ──────────────────
            message = direct_rx.recv() => {
                match message {
                    Some(message) => {
                        if send_json(&mut ws_tx, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // ── Upstream: client → processing loop ──────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        route_text(text.as_str(), &requests, &direct_tx);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    info!(%peer, "subscriber disconnected");
    Ok(())
}

async fn send_json<S>(ws_tx: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = serde_json::to_string(message).map_err(|_| ())?;
    ws_tx.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Decode one inbound text frame. A well-formed command is forwarded to the
/// processing loop; a malformed one is rejected straight back to this client
/// without ever reaching the loop.
fn route_text(
    text: &str,
    requests: &mpsc::UnboundedSender<ServerRequest>,
    direct: &mpsc::UnboundedSender<ServerMessage>,
) {
    match serde_json::from_str::<crate::command::OperatorCommand>(text) {
        Ok(command) => {
            debug!(?command, "forwarding operator command");
            let _ = requests.send(ServerRequest::Command {
                command,
                reply: direct.clone(),
            });
        }
        Err(e) => {
            let _ = direct.send(ServerMessage::Error {
                message: format!("malformed command: {e}"),
                timestamp: Utc::now(),
            });
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OperatorCommand;

    fn channels() -> (
        mpsc::UnboundedSender<ServerRequest>,
        mpsc::UnboundedReceiver<ServerRequest>,
        mpsc::UnboundedSender<ServerMessage>,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (direct_tx, direct_rx) = mpsc::unbounded_channel();
        (req_tx, req_rx, direct_tx, direct_rx)
    }

    #[test]
    fn valid_command_is_forwarded_to_the_loop() {
        let (req_tx, mut req_rx, direct_tx, mut direct_rx) = channels();

        route_text(
            r#"{"type":"PAINT_PIECE","payload":{"row":2,"col":3}}"#,
            &req_tx,
            &direct_tx,
        );

        match req_rx.try_recv().unwrap() {
            ServerRequest::Command { command, .. } => {
                assert_eq!(command, OperatorCommand::PaintPiece { row: 2, col: 3 });
            }
            other => panic!("expected Command, got {other:?}"),
        }
        assert!(direct_rx.try_recv().is_err());
    }

    #[test]
    fn malformed_command_is_rejected_to_sender_only() {
        let (req_tx, mut req_rx, direct_tx, mut direct_rx) = channels();

        route_text("not json at all", &req_tx, &direct_tx);

        assert!(req_rx.try_recv().is_err());
        match direct_rx.try_recv().unwrap() {
            ServerMessage::Error { message, .. } => {
                assert!(message.starts_with("malformed command"));
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_command_type_is_rejected() {
        let (req_tx, mut req_rx, direct_tx, mut direct_rx) = channels();

        route_text(r#"{"type":"WARP_DRIVE"}"#, &req_tx, &direct_tx);

        assert!(req_rx.try_recv().is_err());
        assert!(matches!(
            direct_rx.try_recv().unwrap(),
            ServerMessage::Error { .. }
        ));
    }

    #[test]
    fn default_port_can_be_overridden() {
        let (req_tx, _req_rx) = mpsc::unbounded_channel();
        let server = SubscriberServer::new(BroadcastHub::default(), req_tx).with_port(9001);
        assert_eq!(server.port(), 9001);
    }
}
