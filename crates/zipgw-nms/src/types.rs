// crates/zipgw-nms/src/types.rs
use alloc::vec;
use alloc::vec::Vec;
use core::convert::TryFrom;
use core::fmt;
use core::net::SocketAddr;

// --- Protocol Constants ---

/// Highest node id of the classic Z-Wave range (1-232).
pub const MAX_CLASSIC_NODE_ID: u16 = 232;

/// First node id of the Z-Wave Long Range range.
pub const LR_MIN_NODE_ID: u16 = 256;

/// Last node id of the Z-Wave Long Range range.
pub const LR_MAX_NODE_ID: u16 = 4000;

/// Length in bytes of a classic node bitmask (232 / 8).
pub const CLASSIC_NODEMASK_LEN: usize = (MAX_CLASSIC_NODE_ID as usize) / 8;

/// Length in bytes of a Long Range node bitmask.
pub const LR_NODEMASK_LEN: usize = ((LR_MAX_NODE_ID - LR_MIN_NODE_ID + 1) as usize).div_ceil(8);

/// Legacy node byte announcing that an extended (16-bit) node id follows.
pub const EXTENDED_NODE_ID_MARKER: u8 = 0xFF;

/// Length of a Device Specific Key.
pub const DSK_LEN: usize = 16;

/// Plain Z/IP UDP port. Every other port is assumed to be DTLS.
pub const ZIP_PORT: u16 = 4123;

/// A Device Specific Key (public key fragment used during S2 bootstrap).
pub type Dsk = [u8; DSK_LEN];

/// Represents a Z-Wave node id, wrapping a `u16` to cover both the classic and
/// the Long Range ranges.
///
/// Valid ids are 1-232 (classic) and 256-4000 (Long Range). `NodeId::NONE` (0)
/// is used for "no node" in replies and session bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u16);

impl NodeId {
    /// The "no node" value.
    pub const NONE: NodeId = NodeId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn is_classic(&self) -> bool {
        (1..=MAX_CLASSIC_NODE_ID).contains(&self.0)
    }

    pub fn is_long_range(&self) -> bool {
        (LR_MIN_NODE_ID..=LR_MAX_NODE_ID).contains(&self.0)
    }

    /// Returns true if the id is inside one of the two addressable ranges.
    pub fn is_valid(&self) -> bool {
        self.is_classic() || self.is_long_range()
    }

    /// Decodes the `nodeId [, extMSB, extLSB]` triple used by the V4 network
    /// management frames.
    pub fn from_frame(legacy: u8, msb: u8, lsb: u8) -> Self {
        if legacy == EXTENDED_NODE_ID_MARKER {
            NodeId(u16::from_be_bytes([msb, lsb]))
        } else {
            NodeId(legacy as u16)
        }
    }

    /// Encodes the node as `[nodeId, extMSB, extLSB]`.
    ///
    /// Long Range nodes are written as `0xFF` followed by the 16-bit id; classic
    /// nodes leave the extended bytes zeroed.
    pub fn to_frame(&self) -> [u8; 3] {
        if self.is_long_range() {
            let [msb, lsb] = self.0.to_be_bytes();
            [EXTENDED_NODE_ID_MARKER, msb, lsb]
        } else {
            [self.0 as u8, 0, 0]
        }
    }

    /// The node as a single legacy byte (frames without extended fields).
    pub fn legacy_byte(&self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for invalid Node ID creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdError {
    /// Node ID is outside the valid ranges (1-232, 256-4000).
    InvalidRange(u16),
}

impl fmt::Display for NodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeIdError::InvalidRange(value) => write!(
                f,
                "Invalid NodeId value: {}. Valid ranges are 1-232 and 256-4000.",
                value
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NodeIdError {}

impl TryFrom<u16> for NodeId {
    type Error = NodeIdError;

    /// Creates a `NodeId` from a `u16`, returning an error if the value is not
    /// an addressable Z-Wave node.
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let node = NodeId(value);
        if node.is_valid() {
            Ok(node)
        } else {
            Err(NodeIdError::InvalidRange(value))
        }
    }
}

impl From<NodeId> for u16 {
    fn from(node_id: NodeId) -> Self {
        node_id.0
    }
}

/// The 4-byte home id of a Z-Wave network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HomeId(pub [u8; 4]);

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02X}{b:02X}{c:02X}{d:02X}")
    }
}

/// The IP-side client that owns (or wants to own) a network management session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    /// Remote address and port of the client.
    pub remote: SocketAddr,
    /// Whether the session runs over DTLS.
    pub secure: bool,
}

impl Peer {
    pub fn new(remote: SocketAddr, secure: bool) -> Self {
        Self { remote, secure }
    }

    /// Builds the peer for a configured unsolicited destination. The transport
    /// is inferred from the port.
    pub fn unsolicited(remote: SocketAddr) -> Self {
        Self {
            remote,
            secure: remote.port() != ZIP_PORT,
        }
    }

    /// Two peers are the same session owner when address and port match.
    pub fn same_endpoint(&self, other: &Peer) -> bool {
        self.remote.ip() == other.remote.ip() && self.remote.port() == other.remote.port()
    }
}

/// Node bitmasks as reported by the radio module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMask {
    pub classic: [u8; CLASSIC_NODEMASK_LEN],
    pub long_range: Vec<u8>,
}

impl Default for NodeMask {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeMask {
    pub fn new() -> Self {
        Self {
            classic: [0; CLASSIC_NODEMASK_LEN],
            long_range: vec![0; LR_NODEMASK_LEN],
        }
    }

    pub fn add(&mut self, node: NodeId) {
        if node.is_classic() {
            let bit = (node.0 - 1) as usize;
            self.classic[bit / 8] |= 1 << (bit % 8);
        } else if node.is_long_range() {
            let bit = (node.0 - LR_MIN_NODE_ID) as usize;
            if self.long_range.len() <= bit / 8 {
                self.long_range.resize(bit / 8 + 1, 0);
            }
            self.long_range[bit / 8] |= 1 << (bit % 8);
        }
    }

    pub fn remove(&mut self, node: NodeId) {
        if node.is_classic() {
            let bit = (node.0 - 1) as usize;
            self.classic[bit / 8] &= !(1 << (bit % 8));
        } else if node.is_long_range() {
            let bit = (node.0 - LR_MIN_NODE_ID) as usize;
            if let Some(byte) = self.long_range.get_mut(bit / 8) {
                *byte &= !(1 << (bit % 8));
            }
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        if node.is_classic() {
            let bit = (node.0 - 1) as usize;
            self.classic[bit / 8] & (1 << (bit % 8)) != 0
        } else if node.is_long_range() {
            let bit = (node.0 - LR_MIN_NODE_ID) as usize;
            self.long_range
                .get(bit / 8)
                .is_some_and(|byte| byte & (1 << (bit % 8)) != 0)
        } else {
            false
        }
    }

    /// True if no node is set in either range.
    pub fn is_empty(&self) -> bool {
        self.classic.iter().all(|b| *b == 0) && self.long_range.iter().all(|b| *b == 0)
    }

    /// Clears every node that is set in `other`.
    pub fn subtract(&mut self, other: &NodeMask) {
        for (byte, mask) in self.classic.iter_mut().zip(other.classic.iter()) {
            *byte &= !mask;
        }
        for (byte, mask) in self.long_range.iter_mut().zip(other.long_range.iter()) {
            *byte &= !mask;
        }
    }

    /// Number of leading Long Range bytes that must be sent to advertise the
    /// mask. Counting stops at the first all-zero byte.
    pub fn long_range_report_len(&self) -> usize {
        self.long_range.iter().take_while(|b| **b != 0).count()
    }
}
