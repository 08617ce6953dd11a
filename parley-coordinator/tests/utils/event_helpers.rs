use anyhow::{Result, bail};
use parley_coordinator::CoordinatorEvent;
use parley_core::{Envelope, SignalKind};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Timeout for events that should follow promptly (ms).
pub const EVENT_TIMEOUT_MS: u64 = 5000;

/// How long to watch for something that must not happen (ms).
pub const QUIET_PERIOD_MS: u64 = 300;

/// Wait until `pick` accepts an event, skipping everything else.
pub async fn wait_for_event<T>(
    events: &mut broadcast::Receiver<CoordinatorEvent>,
    timeout_ms: u64,
    mut pick: impl FnMut(&CoordinatorEvent) -> Option<T>,
) -> Result<T> {
    let found = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(found) = pick(&event) {
                        return Ok(found);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("[EventHelper] lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => bail!("Event stream closed"),
            }
        }
    })
    .await;

    match found {
        Ok(result) => result,
        Err(_) => bail!("Timeout waiting for event"),
    }
}

/// Every event matching `pick` within `window_ms`.
pub async fn collect_events<T>(
    events: &mut broadcast::Receiver<CoordinatorEvent>,
    window_ms: u64,
    mut pick: impl FnMut(&CoordinatorEvent) -> Option<T>,
) -> Vec<T> {
    let mut collected = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(window_ms);
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        if let Some(found) = pick(&event) {
            collected.push(found);
        }
    }
    collected
}

/// Wait for the next sent envelope of `kind`.
pub async fn wait_for_sent(
    sent: &mut mpsc::UnboundedReceiver<Envelope>,
    kind: SignalKind,
    timeout_ms: u64,
) -> Result<Envelope> {
    let found = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(envelope) = sent.recv().await {
            if envelope.message.kind() == kind {
                return Some(envelope);
            }
        }
        None
    })
    .await;

    match found {
        Ok(Some(envelope)) => Ok(envelope),
        Ok(None) => bail!("Transport dropped"),
        Err(_) => bail!("Timeout waiting for {kind:?}"),
    }
}

/// Poll `condition` until it holds or `timeout_ms` passes.
pub async fn eventually(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
