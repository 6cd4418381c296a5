// crates/zipgw-nms/src/hal.rs
use crate::nms::flags::{KeyClasses, SecurityFlags};
use crate::types::{Dsk, HomeId, NodeId, NodeIdError, NodeMask, Peer};
use alloc::vec::Vec;
use core::fmt;

/// Defines a portable, descriptive Error type for the network management stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmsError {
    /// A request frame is shorter than its command requires.
    FrameTooShort { expected: usize, actual: usize },
    /// The first byte of a request is not a network management command class.
    UnknownCommandClass(u8),
    /// The command byte is not known for the given command class.
    UnknownCommand { class: u8, command: u8 },
    /// A node id in a request is outside the addressable ranges.
    InvalidNodeId(u16),
    /// A mode byte in a request has no meaning for its command.
    InvalidMode(u8),
    /// Another client owns the network management session.
    Busy,
    /// The mailbox queue has no room for another postponed command.
    QueueFull,
    /// The operation requires an idle state machine.
    NotIdle,
    /// A collaborator refused or failed an operation.
    CollaboratorFailure(&'static str),
    /// A configuration value is out of range.
    InvalidConfig(&'static str),
}

impl fmt::Display for NmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooShort { expected, actual } => {
                write!(f, "Frame too short: expected {expected} bytes, got {actual}")
            }
            Self::UnknownCommandClass(c) => write!(f, "Unknown command class: {c:#04x}"),
            Self::UnknownCommand { class, command } => {
                write!(f, "Unknown command {command:#04x} for class {class:#04x}")
            }
            Self::InvalidNodeId(v) => write!(f, "Invalid NodeId value: {v}"),
            Self::InvalidMode(v) => write!(f, "Invalid mode value: {v:#04x}"),
            Self::Busy => write!(f, "Network management is busy with another client"),
            Self::QueueFull => write!(f, "Network management mailbox queue is full"),
            Self::NotIdle => write!(f, "Network management is not idle"),
            Self::CollaboratorFailure(s) => write!(f, "Collaborator failure: {}", s),
            Self::InvalidConfig(s) => write!(f, "Invalid configuration: {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NmsError {}

// --- From Implementations for Error Conversion ---

impl From<NodeIdError> for NmsError {
    fn from(err: NodeIdError) -> Self {
        match err {
            NodeIdError::InvalidRange(val) => NmsError::InvalidNodeId(val),
        }
    }
}

impl From<&'static str> for NmsError {
    fn from(s: &'static str) -> Self {
        NmsError::CollaboratorFailure(s)
    }
}

// --- Collaborator data ---

/// Outcome of asking the radio to start a failed-node operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedNodeStart {
    /// The radio accepted the request; a completion callback will follow.
    Started,
    /// The node is not in the failed-node list.
    NotFound,
    /// The radio refused the request for any other reason.
    Refused,
}

/// Completion statuses of the radio's remove-failed and replace-failed calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedNodeStatus {
    NodeOk,
    Removed,
    NotRemoved,
    ReplaceReady,
    ReplaceDone,
    ReplaceFailed,
}

impl FailedNodeStatus {
    /// Maps the radio's raw callback code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NodeOk),
            1 => Some(Self::Removed),
            2 => Some(Self::NotRemoved),
            3 => Some(Self::ReplaceReady),
            4 => Some(Self::ReplaceDone),
            5 => Some(Self::ReplaceFailed),
            _ => None,
        }
    }
}

/// Learn mode settings understood by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioLearnMode {
    Disable,
    Classic,
    NetworkWideInclusion,
    NetworkWideExclusion,
}

/// Why a NOP frame is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NopPurpose {
    /// Last-chance contact before a self-destruct removal.
    SelfDestruct,
    /// Probing whether a mailbox node is currently awake.
    AwakeCheck,
}

/// Protocol-level node information as kept by the radio module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeProtocolInfo {
    pub capability: u8,
    pub security: u8,
    pub basic: u8,
    pub generic: u8,
    pub specific: u8,
}

impl NodeProtocolInfo {
    const BASIC_TYPE_CONTROLLER: u8 = 0x01;
    const BASIC_TYPE_STATIC_CONTROLLER: u8 = 0x02;

    pub fn is_controller(&self) -> bool {
        matches!(
            self.basic,
            Self::BASIC_TYPE_CONTROLLER | Self::BASIC_TYPE_STATIC_CONTROLLER
        )
    }
}

/// How a node can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeMode {
    #[default]
    AlwaysListening,
    FrequentlyListening,
    Mailbox,
    Unknown,
}

/// What the resource directory knows about a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeRecord {
    pub node: NodeId,
    /// Basic device class.
    pub node_type: u8,
    pub security_flags: SecurityFlags,
    /// The last interview completed successfully.
    pub probe_done: bool,
    /// The last interview failed.
    pub probe_failed: bool,
    /// The node is marked as failing by the mailbox or transport.
    pub failing: bool,
    pub mode: NodeMode,
    /// Time of the last successful interview, in seconds on the gateway clock.
    pub last_update_s: u64,
    pub endpoint_count: u8,
    pub aggregated_endpoint_count: u8,
}

/// What the resource directory knows about one endpoint of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointRecord {
    pub endpoint: u8,
    /// Endpoint info: generic class, specific class, then command classes.
    pub info: Vec<u8>,
    pub probe_done: bool,
    /// Members of an aggregated endpoint. Empty for ordinary endpoints.
    pub aggregated_members: Vec<u8>,
}

/// Flags passed when registering a node for interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterFlags(pub u8);

impl RegisterFlags {
    pub const JUST_ADDED: Self = Self(0x01);
    pub const ADDED_BY_ME: Self = Self(0x02);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for RegisterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Status of a provisioning list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisioningStatus {
    #[default]
    Pending,
    Passive,
    Ignored,
}

/// Bootstrapping mode of a provisioning list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMode {
    S2,
    #[default]
    SmartStart,
    LongRange,
}

/// One entry of the SmartStart provisioning list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProvisioningEntry {
    pub dsk: Vec<u8>,
    pub status: ProvisioningStatus,
    pub boot_mode: BootMode,
    /// Keys the entry allows to be granted, if restricted.
    pub advertised_join_keys: Option<KeyClasses>,
}

/// Reply to a raw Z/IP frame at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipAck {
    Ack,
    Nak,
    /// Tells the client the request is queued and still being worked on.
    Waiting,
}

/// Inclusion controller steps reported back during proxy inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionStep {
    Ok,
    Failed,
}

/// Security schemes advertised in the gateway NIF while it learns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreInclusionNif {
    NoScheme,
    S0,
    S2Access,
}

// --- Collaborator traits ---

/// The Z-Wave radio module (serial API). Every asynchronous primitive reports
/// its completion back through the matching `NetworkManagement::notify_*` method.
pub trait RadioTransport {
    fn add_node(&mut self, mode: u8);
    /// Starts a SmartStart inclusion of the node announcing `dsk_home_id`.
    fn add_node_smart_start(&mut self, mode: u8, dsk_home_id: &[u8]);
    fn remove_node(&mut self, mode: u8);
    fn remove_failed_node(&mut self, node: NodeId) -> FailedNodeStart;
    fn replace_failed_node(&mut self, node: NodeId, normal_power: bool) -> FailedNodeStart;
    fn request_neighbor_update(&mut self, node: NodeId);
    /// Returns false if the radio refused to start the assignment.
    fn assign_return_route(&mut self, source: NodeId, destination: NodeId) -> bool;
    fn assign_suc_return_route(&mut self, source: NodeId) -> bool;
    fn delete_return_route(&mut self, node: NodeId) -> bool;
    fn set_learn_mode(&mut self, mode: RadioLearnMode);
    fn explore_request_inclusion(&mut self);
    fn explore_request_exclusion(&mut self);
    fn request_node_info(&mut self, node: NodeId);
    fn send_nop(&mut self, node: NodeId, purpose: NopPurpose) -> bool;
    fn send_node_information(&mut self, destination: NodeId, tx_options: u8) -> bool;
    fn request_network_update(&mut self) -> bool;
    fn set_default(&mut self);
    fn soft_reset(&mut self);

    fn node_protocol_info(&self, node: NodeId) -> NodeProtocolInfo;
    fn own_node_id(&self) -> NodeId;
    fn suc_node_id(&self) -> NodeId;
    fn home_id(&self) -> HomeId;
    fn controller_capabilities(&self) -> u8;
    fn is_primary_controller(&self) -> bool;
    /// Protocol version as (major, minor).
    fn protocol_version(&self) -> (u8, u8);
    fn node_list(&self) -> NodeMask;
}

/// The S0/S2 security layer.
pub trait SecurityEngine {
    fn start_s2_add(&mut self, node: NodeId);
    fn start_s0_add(&mut self, node: NodeId, tx_options: u8, is_controller: bool);
    fn start_learn(&mut self, node: NodeId);
    fn key_grant(&mut self, accept: bool, keys: KeyClasses, csa: bool);
    fn dsk_accept(&mut self, accept: bool, dsk: &[u8], input_len: u8);
    fn abort_join(&mut self);
    fn new_dynamic_ecdh_key(&mut self);
    /// Reloads keys after the network membership changed.
    fn reinitialize(&mut self);
    fn clear_network_keys(&mut self, keys: KeyClasses);
    /// Security flags held by the gateway itself.
    fn gateway_flags(&self) -> SecurityFlags;
    /// The gateway's DSK, for add mode (true) or learn mode (false).
    fn public_dsk(&self, add_mode: bool) -> Dsk;
}

/// The node/endpoint database and its interview engine.
pub trait ResourceDirectory {
    fn node_exists(&self, node: NodeId) -> bool;
    fn node(&self, node: NodeId) -> Option<NodeRecord>;
    fn endpoint(&self, node: NodeId, endpoint: u8) -> Option<EndpointRecord>;
    /// Ids of every node known to the directory.
    fn node_ids(&self) -> Vec<NodeId>;
    fn security_flags(&self, node: NodeId) -> SecurityFlags;
    fn set_security_flags(&mut self, node: NodeId, flags: SecurityFlags);
    fn register_new_node(&mut self, node: NodeId, flags: RegisterFlags);
    fn add_dsk(&mut self, node: NodeId, dsk: &[u8]);
    fn set_failing(&mut self, node: NodeId, failing: bool);
    fn probe_lock(&mut self, locked: bool);
    fn probe_cancel(&mut self);
    /// Starts interviews of unknown nodes. Returns how many were started.
    fn probe_new_nodes(&mut self) -> usize;
    fn supports_command_class(&self, node: NodeId, class: u8) -> bool;
    /// Inclusion timeout for a node of the given kind, as computed by the protocol.
    fn inclusion_timeout_ms(&self, is_controller: bool) -> u64;
    /// Estimated duration of an S2 bootstrap.
    fn s2_inclusion_estimate_ms(&self) -> u64;
    /// Tears down the directory. Completion arrives as `NmEvent::MdnsExit`.
    fn exit(&mut self);
}

/// The SmartStart provisioning list.
pub trait ProvisioningList {
    fn by_home_id(&self, home_id: &HomeId) -> Option<ProvisioningEntry>;
    fn by_dsk(&self, dsk: &[u8]) -> Option<ProvisioningEntry>;
    /// Finds an entry whose DSK matches a challenge key with its first two
    /// bytes obfuscated.
    fn match_challenge(&self, public_key: &[u8]) -> Option<ProvisioningEntry>;
    fn pending_count(&self) -> usize;
    /// Builds a provisioning list report for `entry`.
    fn build_report(&self, entry: &ProvisioningEntry, seq: u8) -> Vec<u8>;
}

/// Sends frames to IP clients.
pub trait ReplyTransport {
    fn send(&mut self, to: &Peer, frame: &[u8]);
    fn send_ack(&mut self, to: &Peer, ack: ZipAck);
}

/// Gateway-wide services the state machine notifies or queries.
pub trait GatewayHost {
    fn is_virtual_node(&self, node: NodeId) -> bool;
    fn virtual_node_mask(&self) -> NodeMask;
    fn ipv4_address_assigned(&self, node: NodeId) -> bool;
    fn all_nodes_have_ipv4(&self) -> bool;
    /// The virtual node bridge finished booting.
    fn bridge_ready(&self) -> bool;
    /// Home id the gateway last operated in.
    fn home_id(&self) -> HomeId;

    fn node_added(&mut self, node: NodeId);
    fn node_deleted(&mut self, node: NodeId);
    fn put_node_to_sleep_later(&mut self, node: NodeId);

    fn mailbox_active_node(&self) -> NodeId;
    /// Tells the mailbox that queued network management for `node` is done.
    fn mailbox_wakeup(&mut self, node: NodeId);
    fn mailbox_abort_sending(&mut self);

    fn request_inclusion_handover(&mut self, node: NodeId, replace: bool);
    fn inclusion_controller_you_do_it(&mut self, node: NodeId);
    fn inclusion_controller_report(&mut self, step: InclusionStep);

    fn set_pre_inclusion_nif(&mut self, nif: PreInclusionNif);
    fn restore_nif(&mut self);
    /// The gateway left its network. Reset ids and addressing.
    fn network_left(&mut self);
    /// The gateway joined a new network as `node`.
    fn network_joined(&mut self, node: NodeId, includer: Option<NodeId>);
    /// The gateway received a controller replication.
    fn network_replicated(&mut self);
    fn default_set(&mut self);
    fn bridge_reset(&mut self);
    /// Requests the gateway-wide reset that follows a network change.
    fn request_reset(&mut self);
    fn network_management_done(&mut self);
    fn component_done(&mut self);

    fn random_u8(&mut self) -> u8;
}

/// Bundles the collaborators and the current time for one call into the
/// state machine.
pub struct NmsEnv<'a> {
    pub now_ms: u64,
    pub radio: &'a mut dyn RadioTransport,
    pub security: &'a mut dyn SecurityEngine,
    pub directory: &'a mut dyn ResourceDirectory,
    pub provisioning: &'a dyn ProvisioningList,
    pub transport: &'a mut dyn ReplyTransport,
    pub host: &'a mut dyn GatewayHost,
}
