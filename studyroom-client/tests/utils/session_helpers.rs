use anyhow::{Context, Result, bail};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use studyroom_client::{
    ClientConfig, MediaDevices, Session, SessionEvent, SessionEvents, SessionHandle,
    SessionSnapshot, TransportFactory,
};
use studyroom_server::{ServerConfig, serve_with_shutdown};

/// Timeout for a single expected event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 3000;

/// Starts a relay on an ephemeral local port.
pub async fn spawn_relay(config: ServerConfig) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = serve_with_shutdown(listener, config, std::future::pending()).await {
            tracing::error!("[spawn_relay] relay stopped: {}", e);
        }
    });

    Ok(addr)
}

pub fn client_config(addr: SocketAddr, name: &str) -> ClientConfig {
    ClientConfig::new(format!("ws://{}/ws", addr))
        .with_identity(name.to_lowercase())
        .with_display_name(name)
}

pub async fn start_session(
    addr: SocketAddr,
    name: &str,
    devices: Arc<dyn MediaDevices>,
    factory: Arc<dyn TransportFactory>,
) -> Result<(SessionHandle, SessionEvents)> {
    Session::connect_with_transport(client_config(addr, name), devices, factory)
        .await
        .context("Failed to start session")
}

/// Waits for the first event matching `pred`, skipping the others.
pub async fn wait_for_event(
    events: &mut SessionEvents,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Result<SessionEvent> {
    let timeout = Duration::from_millis(EVENT_TIMEOUT_MS);

    tokio::time::timeout(timeout, async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return Ok(event);
            }
        }
        bail!("Session stopped")
    })
    .await
    .context("Timeout waiting for session event")?
}

/// Polls snapshots until `pred` holds.
pub async fn wait_until(
    handle: &SessionHandle,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> Result<SessionSnapshot> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);

    loop {
        let snapshot = handle.snapshot().await?;
        if pred(&snapshot) {
            return Ok(snapshot);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("Condition never held, last snapshot: {:?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn join_and_wait(
    handle: &SessionHandle,
    events: &mut SessionEvents,
    room: &str,
) -> Result<SessionEvent> {
    handle.join(room).await?;
    wait_for_event(events, |e| matches!(e, SessionEvent::Joined { .. })).await
}
