// crates/zipgw-nms-monitor/src/lib.rs

// This crate requires std for the web server and tokio.
pub mod config;
pub mod model;
mod server;

pub use config::{ConfigError, MonitorConfig};
pub use model::{NmsSnapshot, PeerInfo};

#[cfg(feature = "in-process")]
use crossbeam_channel::{Receiver, Sender, TrySendError};
#[cfg(feature = "in-process")]
use log::{debug, info, trace};
#[cfg(feature = "in-process")]
use std::net::SocketAddr;
#[cfg(feature = "in-process")]
use zipgw_nms::NetworkManagement;

/// Snapshots buffered for WebSocket clients that are slow to read.
#[cfg(feature = "in-process")]
const BROADCAST_CAPACITY: usize = 64;

/// Takes snapshots on the gateway thread and hands them to the monitor
/// without ever blocking.
#[cfg(feature = "in-process")]
pub struct SnapshotPublisher {
    sender: Sender<NmsSnapshot>,
    interval_ms: u64,
    last_sent_ms: Option<u64>,
    last_state: Option<String>,
    dropped: u64,
}

#[cfg(feature = "in-process")]
impl SnapshotPublisher {
    /// Creates a publisher and the bounded channel feeding the monitor.
    pub fn channel(capacity: usize, interval_ms: u64) -> (Self, Receiver<NmsSnapshot>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let publisher = Self {
            sender,
            interval_ms,
            last_sent_ms: None,
            last_state: None,
            dropped: 0,
        };
        (publisher, receiver)
    }

    /// Snapshots that could not be queued because the monitor fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Sends a snapshot of `nms` if the interval has elapsed or the state
    /// changed since the last one. Returns true when a snapshot was queued.
    pub fn publish(&mut self, nms: &NetworkManagement, now_ms: u64) -> bool {
        let snapshot = NmsSnapshot::from_view(&nms.snapshot(), now_ms);
        let state_changed = self.last_state.as_deref() != Some(snapshot.state.as_str());
        let due = self
            .last_sent_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms);
        if !due && !state_changed {
            return false;
        }

        let state = snapshot.state.clone();
        match self.sender.try_send(snapshot) {
            Ok(()) => {
                self.last_sent_ms = Some(now_ms);
                self.last_state = Some(state);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!("[Monitor] Snapshot channel full, {} dropped so far", self.dropped);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("[Monitor] Monitor is gone, snapshot not sent");
                false
            }
        }
    }
}

/// Starts the web monitor in "in-process" mode.
///
/// Intended to run in a dedicated, non-real-time thread. Snapshots read from
/// `receiver` are served on `bind_addr` at `/` (HTML page), `/ws` (WebSocket
/// JSON stream) and `/snapshot` (latest snapshot as JSON).
#[cfg(feature = "in-process")]
pub async fn start_in_process_monitor(
    receiver: Receiver<NmsSnapshot>,
    bind_addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = server::AppState::new(BROADCAST_CAPACITY);

    let bridge_state = state.clone();
    tokio::task::spawn_blocking(move || server::forward_snapshots(receiver, bridge_state));

    info!("[Monitor] Starting in-process monitor on {}", bind_addr);
    server::start_web_server(bind_addr, state).await?;
    Ok(())
}
