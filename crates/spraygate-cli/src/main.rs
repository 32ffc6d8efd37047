//! `spraygate` – serial/WebSocket gateway daemon.
//!
//! Wires the pieces together and runs the single processing loop:
//!
//! 1. Opens the configuration store (`SPRAYGATE_CONFIG_DIR`, default
//!    `~/.spraygate`).
//! 2. Resolves the controller device (`SPRAYGATE_DEVICE` override, else USB
//!    vendor-ID scan with fallback paths) and opens the serial link.
//! 3. Starts the WebSocket subscriber server (`SPRAYGATE_PORT`).
//! 4. Processes inbound telegrams and operator commands strictly in arrival
//!    order; on link loss, hands control to the reconnect supervisor.
//! 5. Intercepts Ctrl-C for a clean shutdown.

use chrono::Utc;
use spraygate_config::ConfigStore;
use spraygate_gateway::{CommandGateway, ServerRequest, SubscriberServer};
use spraygate_link::{
    DeviceLocator, LinkEvent, LinkHandle, ReconnectPolicy, ReconnectSupervisor, SerialLink,
    SupervisorAction,
};
use spraygate_protocol::parse_line;
use spraygate_state::{BroadcastHub, StateStore};
use spraygate_types::{GatewayError, ServerMessage};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const DEFAULT_BAUD: u32 = 115_200;

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set SPRAYGATE_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("SPRAYGATE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    if let Err(e) = run().await {
        error!(error = %e, "gateway terminated");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), GatewayError> {
    let config = ConfigStore::open(config_dir())?;
    let hub = BroadcastHub::default();
    let link = LinkHandle::new();
    let mut gateway = CommandGateway::new(config, link.clone(), hub.clone());
    let mut store = StateStore::new(hub.clone());
    let mut supervisor = ReconnectSupervisor::new(reconnect_policy());
    let locator = DeviceLocator::default();

    // ── Subscriber server ─────────────────────────────────────────────────
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let server = SubscriberServer::new(hub.clone(), request_tx).with_port(server_port());
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "subscriber server failed");
        }
    });

    // ── Serial link ───────────────────────────────────────────────────────
    let (link_tx, mut link_rx) = mpsc::unbounded_channel();
    let baud = baud_rate();
    let mut serial = match open_link(&locator, baud, &link, link_tx.clone()).await {
        Ok(serial) => {
            supervisor.on_connected();
            if let Err(e) = gateway.push_configuration().await {
                warn!(error = %e, "initial configuration push failed");
            }
            Some(serial)
        }
        Err(e) => {
            warn!(error = %e, "initial connection failed");
            store.mark_link_failure(&e.to_string());
            reconnect(
                &mut supervisor,
                &locator,
                baud,
                &link,
                &link_tx,
                &mut store,
                &gateway,
            )
            .await
        }
    };

    store.set_maintenance_date(gateway.config().maintenance().last_maintenance_date);
    info!("gateway running");

    // ── Processing loop ───────────────────────────────────────────────────
    // One request or telegram is fully applied (mutate + broadcast) before
    // the next is read.
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            Some(event) = link_rx.recv() => match event {
                LinkEvent::Line(line) => {
                    store.apply(parse_line(&line));
                }
                LinkEvent::Closed { reason } => {
                    link.detach().await;
                    drop(serial.take());
                    store.mark_link_failure(&reason);
                    serial = reconnect(
                        &mut supervisor,
                        &locator,
                        baud,
                        &link,
                        &link_tx,
                        &mut store,
                        &gateway,
                    )
                    .await;
                }
            },
            Some(request) = request_rx.recv() => match request {
                ServerRequest::Subscribe { reply } => {
                    let _ = reply.send(ServerMessage::StateUpdate(store.snapshot()));
                    let _ = reply.send(ServerMessage::SettingsUpdate(
                        gateway.config().settings().clone(),
                    ));
                    let _ = reply.send(ServerMessage::PatternConfig(
                        gateway.config().pattern().clone(),
                    ));
                }
                ServerRequest::Command { command, reply } => {
                    match gateway.handle(command).await {
                        Ok(()) => {
                            store.set_maintenance_date(
                                gateway.config().maintenance().last_maintenance_date,
                            );
                        }
                        Err(e) => {
                            let link_lost = matches!(e, GatewayError::Link(_));
                            let _ = reply.send(ServerMessage::Error {
                                message: e.to_string(),
                                timestamp: Utc::now(),
                            });
                            // A write failure is a link failure: tear the
                            // port down and hand control to the supervisor,
                            // same as a reader-side close.
                            if link_lost {
                                link.detach().await;
                                drop(serial.take());
                                store.mark_link_failure(&e.to_string());
                                serial = reconnect(
                                    &mut supervisor,
                                    &locator,
                                    baud,
                                    &link,
                                    &link_tx,
                                    &mut store,
                                    &gateway,
                                )
                                .await;
                            }
                        }
                    }
                }
            },
        }
    }

    if let Some(serial) = serial {
        serial.close();
    }
    info!("gateway stopped");
    Ok(())
}

/// Drive the supervisor until the link is back or the policy gives up.
/// Returns the new serial connection, or `None` on terminal failure (the
/// process keeps serving subscribers with the link marked down).
async fn reconnect(
    supervisor: &mut ReconnectSupervisor,
    locator: &DeviceLocator,
    baud: u32,
    link: &LinkHandle,
    link_tx: &mpsc::UnboundedSender<LinkEvent>,
    store: &mut StateStore,
    gateway: &CommandGateway,
) -> Option<SerialLink> {
    loop {
        match supervisor.on_link_lost() {
            SupervisorAction::ManualRestart => {
                store.mark_link_failure("serial link lost; manual restart required");
                return None;
            }
            SupervisorAction::GiveUp => {
                store.mark_link_failure("serial link lost; reconnect attempts exhausted");
                return None;
            }
            SupervisorAction::RetryAfter(delay) => {
                tokio::time::sleep(delay).await;
                match open_link(locator, baud, link, link_tx.clone()).await {
                    Ok(serial) => {
                        supervisor.on_connected();
                        if let Err(e) = gateway.push_configuration().await {
                            warn!(error = %e, "configuration push after reconnect failed");
                        }
                        return Some(serial);
                    }
                    Err(e) => {
                        warn!(error = %e, "reconnection attempt failed");
                    }
                }
            }
        }
    }
}

async fn open_link(
    locator: &DeviceLocator,
    baud: u32,
    link: &LinkHandle,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) -> Result<SerialLink, GatewayError> {
    let path = match std::env::var("SPRAYGATE_DEVICE") {
        Ok(path) => path,
        Err(_) => locator.resolve()?,
    };
    SerialLink::open(&path, baud, link, link_tx).await
}

// ────────────────────────────────────────────────────────────────────────────
// Environment
// ────────────────────────────────────────────────────────────────────────────

fn config_dir() -> String {
    std::env::var("SPRAYGATE_CONFIG_DIR").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/.spraygate")
    })
}

fn server_port() -> u16 {
    std::env::var("SPRAYGATE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(spraygate_gateway::server::DEFAULT_PORT)
}

fn baud_rate() -> u32 {
    std::env::var("SPRAYGATE_BAUD")
        .ok()
        .and_then(|b| b.parse().ok())
        .unwrap_or(DEFAULT_BAUD)
}

fn reconnect_policy() -> ReconnectPolicy {
    match std::env::var("SPRAYGATE_RECONNECT").as_deref() {
        Ok("manual") => ReconnectPolicy::Manual,
        _ => ReconnectPolicy::default(),
    }
}
