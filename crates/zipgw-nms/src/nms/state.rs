// crates/zipgw-nms/src/nms/state.rs
use super::flags::{KeyClasses, SecurityFlags, SubFlags};
use super::states::NmState;
use crate::frame::PendingReply;
use crate::frame::constants::NETWORK_UPDATE_FLAG_DISABLED;
use crate::types::{DSK_LEN, Dsk, NodeId, Peer};

/// The single timer of the current state.
///
/// The timer remembers which state armed it so a transition can tell whether
/// the deadline still belongs to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OneShotTimer {
    deadline_ms: Option<u64>,
    owner: NmState,
}

impl OneShotTimer {
    pub fn arm(&mut self, now_ms: u64, duration_ms: u64, owner: NmState) {
        self.deadline_ms = Some(now_ms.saturating_add(duration_ms));
        self.owner = owner;
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn owner(&self) -> NmState {
        self.owner
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// Consumes the deadline if it has passed.
    pub fn take_expired(&mut self, now_ms: u64) -> bool {
        if self.deadline_ms.is_some_and(|d| now_ms >= d) {
            self.deadline_ms = None;
            true
        } else {
            false
        }
    }
}

/// The network management request that owns the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    #[default]
    None,
    NodeAdd,
    FailedNodeReplace,
}

/// Asynchronous primitives whose completion the state machine waits for.
///
/// A radio or collaborator callback is only acted upon while the matching
/// operation is pending, so a late callback cannot leak into a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    AddNode,
    RemoveNode,
    RemoveFailedNode,
    ReplaceFailedNode,
    SelfDestructNop,
    SelfDestructRemoval,
    NeighborUpdate,
    NeighborUpdateAfterSecureAdd,
    ReturnRouteAssign,
    ReturnRouteDelete,
    NetworkUpdate,
    NodeInformation,
    SetDefault,
    LearnMode,
}

/// Session state of the network management state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmsState {
    pub state: NmState,
    pub flags: SubFlags,
    pub command: CommandKind,
    pub peer: Option<Peer>,
    pub seq: u8,
    pub pending_node: NodeId,
    pub reply: PendingReply,
    pub dsk_valid: bool,
    pub just_included_dsk: Dsk,
    pub granted_keys: KeyClasses,
    pub inclusion_flags: SecurityFlags,
    pub tx_options: u8,
    pub explore_count: u8,
    pub delay_neighbor_update: bool,
    pub network_update_flags: u8,
    pub timer: OneShotTimer,
    pub pending: Option<PendingOp>,
}

impl Default for NmsState {
    fn default() -> Self {
        Self {
            state: NmState::Idle,
            flags: SubFlags::empty(),
            command: CommandKind::None,
            peer: None,
            seq: 0,
            pending_node: NodeId::NONE,
            reply: PendingReply::Empty,
            dsk_valid: false,
            just_included_dsk: [0; DSK_LEN],
            granted_keys: KeyClasses::empty(),
            inclusion_flags: SecurityFlags::empty(),
            tx_options: 0,
            explore_count: 0,
            delay_neighbor_update: false,
            network_update_flags: NETWORK_UPDATE_FLAG_DISABLED,
            timer: OneShotTimer::default(),
            pending: None,
        }
    }
}

impl NmsState {
    /// Returns the session to idle. The peer and seq are kept so that late
    /// unsolicited frames can still be attributed.
    pub fn reset(&mut self) {
        let peer = self.peer;
        let seq = self.seq;
        *self = Self::default();
        self.peer = peer;
        self.seq = seq;
    }

    /// Consumes the pending operation if it matches `op`.
    pub fn complete(&mut self, op: PendingOp) -> bool {
        if self.pending == Some(op) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn expects(&self, op: PendingOp) -> bool {
        self.pending == Some(op)
    }
}
