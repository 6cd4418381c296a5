// crates/zipgw-nms/src/frame/reply.rs
use super::command::RequestHeader;
use super::constants::*;
use crate::nms::flags::KeyClasses;
use crate::types::{DSK_LEN, Dsk, NodeId};
use alloc::vec;
use alloc::vec::Vec;

/// Selects between the classic and the Long Range SmartStart add status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeAddVariant {
    #[default]
    Classic,
    /// `EXTENDED_NODE_ADD_STATUS`: 16-bit node id and no DSK section.
    Extended,
}

/// Security outcome appended to add and replace statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecuritySection {
    pub granted_keys: KeyClasses,
    pub kex_fail_type: u8,
}

/// The `NODE_ADD_STATUS` reply, grown section by section as the inclusion
/// progresses.
///
/// Layout: `[class, cmd, seq, status, reserved|msb, node|lsb, node_info_length,
/// capability, security, basic, generic, specific, cc..., granted_keys,
/// kex_fail_type, dsk_len, dsk...]`. Sections after `node_info_length` are only
/// emitted once they have been filled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeAddStatus {
    pub variant: NodeAddVariant,
    pub seq: u8,
    pub status: u8,
    pub node: NodeId,
    pub capability: u8,
    pub security: u8,
    /// Basic, generic and specific device class.
    pub device_class: [u8; 3],
    /// Device class bytes actually present. Below 3 only for a truncated NIF.
    pub device_class_len: usize,
    pub command_classes: Vec<u8>,
    /// Whether the node info section (capability up to the CC list) is present.
    pub has_node_info: bool,
    pub security_section: Option<SecuritySection>,
    /// `Some(None)` appends an empty DSK section (length 0).
    pub dsk: Option<Option<Dsk>>,
}

impl NodeAddStatus {
    pub fn new(seq: u8, variant: NodeAddVariant) -> Self {
        Self {
            variant,
            seq,
            status: NODE_ADD_STATUS_FAILED,
            ..Default::default()
        }
    }

    /// `node_info_length` as carried on the wire.
    pub fn node_info_length(&self) -> u8 {
        if self.has_node_info {
            let len = 3 + self.device_class_len.min(3) + self.command_classes.len();
            len.min(u8::MAX as usize) as u8
        } else {
            1
        }
    }

    /// Records the node information frame `[basic, generic, specific, cc...]`
    /// received when the node was found.
    pub fn set_node_info_frame(&mut self, nif: &[u8]) {
        self.capability = 0;
        self.security = 0;
        self.device_class = [0; 3];
        for (slot, byte) in self.device_class.iter_mut().zip(nif.iter()) {
            *slot = *byte;
        }
        self.device_class_len = nif.len().min(3);
        self.command_classes = nif.get(3..).map(<[u8]>::to_vec).unwrap_or_default();
        self.has_node_info = true;
    }

    /// Drops everything after the header, as done on failure paths.
    pub fn clear_node_info(&mut self) {
        self.has_node_info = false;
        self.command_classes.clear();
        self.security_section = None;
        self.dsk = None;
    }

    pub fn encode(&self) -> Vec<u8> {
        let command = match self.variant {
            NodeAddVariant::Classic => NODE_ADD_STATUS,
            NodeAddVariant::Extended => EXTENDED_NODE_ADD_STATUS,
        };
        let mut frame = vec![
            COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
            command,
            self.seq,
            self.status,
        ];
        match self.variant {
            NodeAddVariant::Classic => {
                frame.push(0);
                frame.push(self.node.legacy_byte());
            }
            NodeAddVariant::Extended => frame.extend_from_slice(&self.node.0.to_be_bytes()),
        }
        frame.push(self.node_info_length());
        if self.has_node_info {
            frame.push(self.capability);
            frame.push(self.security);
            frame.extend_from_slice(&self.device_class[..self.device_class_len.min(3)]);
            frame.extend_from_slice(&self.command_classes);
        }
        if let Some(section) = self.security_section {
            frame.push(section.granted_keys.0);
            frame.push(section.kex_fail_type);
            if self.variant == NodeAddVariant::Classic {
                match &self.dsk {
                    Some(Some(dsk)) => {
                        frame.push(DSK_LEN as u8);
                        frame.extend_from_slice(dsk);
                    }
                    Some(None) => frame.push(0),
                    None => {}
                }
            }
        }
        frame
    }
}

/// The `FAILED_NODE_REPLACE_STATUS` reply. Never carries a DSK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailedNodeReplaceStatus {
    pub seq: u8,
    pub status: u8,
    pub node: NodeId,
    pub granted_keys: KeyClasses,
    pub kex_fail_type: u8,
}

impl FailedNodeReplaceStatus {
    pub fn new(seq: u8, node: NodeId) -> Self {
        Self {
            seq,
            status: FAILED_NODE_REPLACE_FAILED,
            node,
            ..Default::default()
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
            FAILED_NODE_REPLACE_STATUS,
            self.seq,
            self.status,
            self.node.legacy_byte(),
            self.granted_keys.0,
            self.kex_fail_type,
        ]
    }
}

/// Security outcome of a learn mode join, sent in the extended status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LearnSecurityResult {
    pub granted_keys: KeyClasses,
    pub kex_fail_type: u8,
    pub dsk: Dsk,
}

/// The `LEARN_MODE_SET_STATUS` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LearnModeSetStatus {
    pub seq: u8,
    pub status: u8,
    pub new_node_id: NodeId,
    /// Present once the security bootstrap of a join completed.
    pub security: Option<LearnSecurityResult>,
    /// DSK presented by the including controller, kept until the join ends.
    pub challenge_dsk: Dsk,
}

impl LearnModeSetStatus {
    pub fn new(seq: u8, status: u8) -> Self {
        Self {
            seq,
            status,
            ..Default::default()
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![
            COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC,
            LEARN_MODE_SET_STATUS,
            self.seq,
            self.status,
            0,
            self.new_node_id.legacy_byte(),
        ];
        if let Some(security) = self.security {
            frame.push(security.granted_keys.0);
            frame.push(security.kex_fail_type);
            frame.extend_from_slice(&security.dsk);
        }
        frame
    }
}

/// The reply accumulated for the operation in progress.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingReply {
    #[default]
    Empty,
    NodeAdd(NodeAddStatus),
    FailedNodeReplace(FailedNodeReplaceStatus),
    LearnMode(LearnModeSetStatus),
    Frame(Vec<u8>),
}

impl PendingReply {
    pub fn is_empty(&self) -> bool {
        matches!(self, PendingReply::Empty)
    }

    /// The status byte of the reply (byte 3 of every status frame).
    pub fn status(&self) -> Option<u8> {
        match self {
            PendingReply::Empty => None,
            PendingReply::NodeAdd(r) => Some(r.status),
            PendingReply::FailedNodeReplace(r) => Some(r.status),
            PendingReply::LearnMode(r) => Some(r.status),
            PendingReply::Frame(f) => f.get(3).copied(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            PendingReply::Empty => Vec::new(),
            PendingReply::NodeAdd(r) => r.encode(),
            PendingReply::FailedNodeReplace(r) => r.encode(),
            PendingReply::LearnMode(r) => r.encode(),
            PendingReply::Frame(f) => f.clone(),
        }
    }
}

// --- Fixed-layout replies ---

/// Short `NODE_ADD_STATUS{Failed}` used when there is no add in progress.
pub fn node_add_status_rejected(seq: u8) -> Vec<u8> {
    let mut frame = vec![0u8; 12];
    frame[0] = COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION;
    frame[1] = NODE_ADD_STATUS;
    frame[2] = seq;
    frame[3] = NODE_ADD_STATUS_FAILED;
    frame
}

pub fn node_remove_status(seq: u8, status: u8, node: NodeId) -> Vec<u8> {
    let node = if status == NODE_REMOVE_STATUS_FAILED || !node.is_valid() {
        [0, 0, 0]
    } else {
        node.to_frame()
    };
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        NODE_REMOVE_STATUS,
        seq,
        status,
    ];
    frame.extend_from_slice(&node);
    frame
}

pub fn failed_node_remove_status(seq: u8, status: u8, node: NodeId) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        FAILED_NODE_REMOVE_STATUS,
        seq,
        status,
    ];
    frame.extend_from_slice(&node.to_frame());
    frame
}

/// Busy variant of the replace status: no key fields.
pub fn failed_node_replace_busy(seq: u8, node: u8) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        FAILED_NODE_REPLACE_STATUS,
        seq,
        FAILED_NODE_REPLACE_FAILED,
        node,
    ]
}

pub fn neighbor_update_status(seq: u8, status: u8) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        NODE_NEIGHBOR_UPDATE_STATUS,
        seq,
        status,
    ]
}

pub fn return_route_assign_complete(seq: u8, status: u8) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        RETURN_ROUTE_ASSIGN_COMPLETE,
        seq,
        status,
    ]
}

pub fn return_route_delete_complete(seq: u8, status: u8) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        RETURN_ROUTE_DELETE_COMPLETE,
        seq,
        status,
    ]
}

pub fn network_update_request_status(seq: u8, status: u8) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC,
        NETWORK_UPDATE_REQUEST_STATUS,
        seq,
        status,
    ]
}

pub fn default_set_complete(seq: u8, status: u8) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC,
        DEFAULT_SET_COMPLETE,
        seq,
        status,
    ]
}

pub fn application_busy() -> Vec<u8> {
    vec![
        COMMAND_CLASS_APPLICATION_STATUS,
        APPLICATION_BUSY,
        APPLICATION_BUSY_TRY_AGAIN_LATER,
        0,
    ]
}

pub fn node_add_keys_report(seq: u8, request_csa: bool, requested_keys: KeyClasses) -> Vec<u8> {
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        NODE_ADD_KEYS_REPORT,
        seq,
        request_csa as u8,
        requested_keys.0,
    ]
}

pub fn node_add_dsk_report(seq: u8, input_len: u8, dsk: &Dsk) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        NODE_ADD_DSK_REPORT,
        seq,
        input_len,
    ];
    frame.extend_from_slice(dsk);
    frame
}

pub fn smart_start_join_started(seq: u8, dsk: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        SMART_START_JOIN_STARTED_REPORT,
        seq,
        (dsk.len() as u8) & DSK_LENGTH_MASK,
    ];
    frame.extend_from_slice(dsk);
    frame
}

pub fn included_nif_report(seq: u8, dsk: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION,
        INCLUDED_NIF_REPORT,
        seq,
        (dsk.len() as u8) & DSK_LENGTH_MASK,
    ];
    frame.extend_from_slice(dsk);
    frame
}

pub fn dsk_report(seq: u8, add_mode: bool, dsk: &Dsk) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC,
        DSK_REPORT,
        seq,
        add_mode as u8,
    ];
    frame.extend_from_slice(dsk);
    frame
}

/// The failure answer to a request that cannot run because another session
/// owns the state machine. Requests without a dedicated failure status get
/// `APPLICATION_BUSY`.
pub fn busy_reply(header: &RequestHeader) -> Vec<u8> {
    let seq = header.seq;
    match (header.class, header.command) {
        (COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC, DEFAULT_SET) => {
            default_set_complete(seq, DEFAULT_SET_BUSY)
        }
        (COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC, LEARN_MODE_SET) => {
            LearnModeSetStatus::new(seq, LEARN_MODE_FAILED).encode()
        }
        (COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC, NETWORK_UPDATE_REQUEST) => {
            network_update_request_status(seq, SUC_UPDATE_ABORT)
        }
        (COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION, NODE_ADD) => node_add_status_rejected(seq),
        (COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION, NODE_REMOVE) => {
            node_remove_status(seq, NODE_REMOVE_STATUS_FAILED, NodeId::NONE)
        }
        (COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION, FAILED_NODE_REMOVE) => {
            failed_node_remove_status(seq, FAILED_NODE_REMOVE_FAIL, NodeId::NONE)
        }
        (COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION, FAILED_NODE_REPLACE) => {
            failed_node_replace_busy(seq, 0)
        }
        (COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION, NODE_NEIGHBOR_UPDATE_REQUEST) => {
            neighbor_update_status(seq, REQUEST_NEIGHBOR_UPDATE_FAILED)
        }
        _ => application_busy(),
    }
}

/// Copies a command class list, inserting `IP_ASSOCIATION` after every
/// `ASSOCIATION` so IP clients learn that associations can target them.
pub fn with_ip_association(command_classes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(command_classes.len() + 1);
    for cc in command_classes {
        out.push(*cc);
        if *cc == COMMAND_CLASS_ASSOCIATION {
            out.push(COMMAND_CLASS_IP_ASSOCIATION);
        }
    }
    out
}
