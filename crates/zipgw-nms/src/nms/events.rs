// crates/zipgw-nms/src/nms/events.rs
use super::flags::{KeyClasses, SecurityFlags};
use crate::hal::FailedNodeStatus;
use crate::types::{Dsk, HomeId, NodeId};
use alloc::vec::Vec;

/// Node information delivered with a radio add or learn callback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LearnInfo {
    pub source: NodeId,
    /// Node information frame: basic, generic, specific, then command classes.
    pub nif: Vec<u8>,
}

impl LearnInfo {
    pub fn new(source: NodeId, nif: &[u8]) -> Self {
        Self {
            source,
            nif: nif.to_vec(),
        }
    }

    /// Command classes announced in the NIF.
    pub fn command_classes(&self) -> &[u8] {
        self.nif.get(3..).unwrap_or(&[])
    }

    pub fn supports(&self, class: u8) -> bool {
        self.command_classes().contains(&class)
    }
}

/// Defines every input the network management state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmEvent {
    // --- Client requests ---
    NodeAdd { mode: u8, s2: bool },
    NodeAddStop,
    NodeAddSmartStart { home_id: HomeId, options: u8 },
    NodeRemove { mode: u8 },
    NodeRemoveStop,
    FailedNodeRemove(NodeId),
    ReplaceFailedStart { node: NodeId, normal_power: bool, s2: bool },
    ReplaceFailedStop(NodeId),
    NeighborUpdateRequest(NodeId),
    ReturnRouteAssign { source: NodeId, destination: NodeId },
    ReturnRouteDelete(NodeId),
    NetworkUpdateRequest,
    NodeInformationSend { destination: NodeId, tx_options: u8 },
    DefaultSet,
    LearnSet { mode: u8, return_interview_status: bool },
    NodeInfoCachedGet { node: NodeId, max_age: u8 },
    RequestNodeList,
    RequestFailedNodeList,
    KeysSet { accept: bool, csa: bool, keys: KeyClasses },
    DskSet { accept: bool, input_len: u8, dsk: Dsk },
    StartProxyInclusion(NodeId),
    StartProxyReplace(NodeId),

    // --- Radio callbacks ---
    AddNodeLearnReady,
    AddNodeFound,
    AddEndNode(LearnInfo),
    AddController(LearnInfo),
    AddProtocolDone,
    AddNodeDone,
    AddFailed,
    AddNotPrimary,
    AddSflndDone,
    RemoveNodeStatus { status: u8, source: NodeId },
    RemoveFailedStatus(FailedNodeStatus),
    /// The failed node was replaced. Proxy replacements carry the NIF.
    ReplaceFailedDone(Option<LearnInfo>),
    ReplaceFailedFail,
    LearnModeStarted(NodeId),
    LearnModeDone(NodeId),
    LearnModeFailed,
    NeighborUpdateStatus(u8),
    ReturnRouteStatus(u8),
    NetworkUpdateStatus(u8),
    SetDefaultDone,
    NodeInformationSent,
    SelfDestructTxDone,
    /// A NIF requested during proxy inclusion arrived.
    NodeInfo(LearnInfo),

    // --- Security engine ---
    SecurityDone(SecurityFlags),
    KeyRequest { keys: KeyClasses, csa: bool },
    DskChallenge { granted_keys: KeyClasses, public_key: Dsk },
    S0Started,

    // --- Other collaborators ---
    NodeProbeDone(NodeId),
    AllProbed,
    DhcpDone(NodeId),
    MdnsExit,
    FrameReceived,
    ProxyComplete,
    VirtualNodesRemoved,
    NetworkUpdateFlags(u8),

    /// The state timer expired.
    Timeout,
}

impl NmEvent {
    /// Maps a raw radio add-node callback status to its event.
    pub fn from_add_node_status(status: u8, info: LearnInfo) -> Option<Self> {
        use crate::frame::constants::*;
        match status {
            ADD_NODE_STATUS_LEARN_READY => Some(Self::AddNodeLearnReady),
            ADD_NODE_STATUS_NODE_FOUND => Some(Self::AddNodeFound),
            ADD_NODE_STATUS_ADDING_END_NODE => Some(Self::AddEndNode(info)),
            ADD_NODE_STATUS_ADDING_CONTROLLER => Some(Self::AddController(info)),
            ADD_NODE_STATUS_PROTOCOL_DONE => Some(Self::AddProtocolDone),
            ADD_NODE_STATUS_DONE => Some(Self::AddNodeDone),
            ADD_NODE_STATUS_FAILED => Some(Self::AddFailed),
            ADD_NODE_STATUS_SFLND_DONE => Some(Self::AddSflndDone),
            ADD_NODE_STATUS_NOT_PRIMARY => Some(Self::AddNotPrimary),
            _ => None,
        }
    }
}
