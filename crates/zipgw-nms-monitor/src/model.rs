// crates/zipgw-nms-monitor/src/model.rs
//! Defines the data structures sent from the gateway thread to the monitor.
//!
//! A snapshot is a flattened, JSON-friendly copy of a
//! [`SessionView`](zipgw_nms::SessionView).

use serde::{Deserialize, Serialize};
use zipgw_nms::{SessionView, SubFlags};

/// Sub-flags in the order they are listed in a snapshot.
const SUB_FLAG_NAMES: [(SubFlags, &str); 9] = [
    (SubFlags::S2_ADD, "S2_ADD"),
    (SubFlags::PROXY_INCLUSION, "PROXY_INCLUSION"),
    (SubFlags::LEARNMODE_NEW, "LEARNMODE_NEW"),
    (SubFlags::LEARNMODE_NWI, "LEARNMODE_NWI"),
    (SubFlags::LEARNMODE_NWE, "LEARNMODE_NWE"),
    (SubFlags::CONTROLLER_REPLICATION, "CONTROLLER_REPLICATION"),
    (SubFlags::SMART_START, "SMART_START"),
    (SubFlags::REPORT_DSK, "REPORT_DSK"),
    (SubFlags::CSA_INCLUSION, "CSA_INCLUSION"),
];

/// The client that owns the running operation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: String,
    pub secure: bool,
}

/// A serializable snapshot of the network management session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NmsSnapshot {
    /// Gateway clock at the time of the snapshot.
    pub timestamp_ms: u64,
    pub state: String,
    pub idle: bool,
    pub flags: Vec<String>,
    pub seq: u8,
    pub pending_node: u16,
    pub peer: Option<PeerInfo>,
    /// The DSK of the node being included, as lowercase hex.
    pub dsk: Option<String>,
    pub granted_keys: u8,
    pub queue_len: usize,
    pub next_deadline_ms: Option<u64>,
}

impl NmsSnapshot {
    pub fn from_view(view: &SessionView, timestamp_ms: u64) -> Self {
        let flags = SUB_FLAG_NAMES
            .iter()
            .filter(|(flag, _)| view.flags.contains(*flag))
            .map(|(_, name)| (*name).to_string())
            .collect();
        Self {
            timestamp_ms,
            state: format!("{:?}", view.state),
            idle: view.idle,
            flags,
            seq: view.seq,
            pending_node: view.pending_node.0,
            peer: view.peer.map(|peer| PeerInfo {
                address: peer.remote.to_string(),
                secure: peer.secure,
            }),
            dsk: view.dsk.map(hex::encode),
            granted_keys: view.granted_keys.0,
            queue_len: view.queue_len,
            next_deadline_ms: view.next_deadline_ms,
        }
    }
}
