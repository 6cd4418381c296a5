// crates/zipgw-nms/src/frame/command.rs
use super::constants::*;
use super::{FrameError, ensure_len};
use crate::nms::flags::KeyClasses;
use crate::types::{DSK_LEN, Dsk, NodeId};

/// The three bytes every request starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub class: u8,
    pub command: u8,
    pub seq: u8,
}

impl RequestHeader {
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        ensure_len(frame, 3)?;
        Ok(Self {
            class: frame[0],
            command: frame[1],
            seq: frame[2],
        })
    }
}

/// A decoded network management request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmCommand {
    // --- Inclusion ---
    NodeAdd { mode: u8, tx_options: u8 },
    NodeRemove { mode: u8 },
    FailedNodeRemove { node: NodeId },
    FailedNodeReplace { node: NodeId, tx_options: u8, mode: u8 },
    NodeNeighborUpdateRequest { node: NodeId },
    ReturnRouteAssign { source: NodeId, destination: NodeId },
    ReturnRouteDelete { node: NodeId },
    NodeAddKeysSet { accept: bool, csa: bool, granted_keys: KeyClasses },
    NodeAddDskSet { accept: bool, input_len: u8, dsk: Dsk },

    // --- Basic ---
    LearnModeSet { return_interview_status: bool, mode: u8 },
    NetworkUpdateRequest,
    NodeInformationSend { destination: NodeId, tx_options: u8 },
    DefaultSet,
    DskGet { add_mode: bool },

    // --- Proxy ---
    NodeListGet,
    FailedNodeListGet,
    /// `node` is the raw request value; 0 addresses the gateway itself.
    NodeInfoCachedGet { max_age: u8, node: NodeId },
    MultiChannelEndPointGet { node: NodeId },
    MultiChannelCapabilityGet { node: NodeId, endpoint: u8 },
    MultiChannelAggregatedMembersGet { node: NodeId, aggregated_endpoint: u8 },
}

/// Reads the node id at `index`, following it with the extended MSB/LSB at
/// `ext_index` when the legacy byte is the extended marker.
fn node_at(frame: &[u8], index: usize, ext_index: usize) -> Result<NodeId, FrameError> {
    ensure_len(frame, index + 1)?;
    if frame[index] == crate::types::EXTENDED_NODE_ID_MARKER {
        ensure_len(frame, ext_index + 2)?;
        Ok(NodeId::from_frame(
            frame[index],
            frame[ext_index],
            frame[ext_index + 1],
        ))
    } else {
        Ok(NodeId(frame[index] as u16))
    }
}

impl NmCommand {
    /// Decodes a request frame.
    pub fn decode(frame: &[u8]) -> Result<(RequestHeader, NmCommand), FrameError> {
        let header = RequestHeader::decode(frame)?;
        let unknown = FrameError::UnknownCommand {
            class: header.class,
            command: header.command,
        };
        let command = match header.class {
            COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION => Self::decode_inclusion(frame, unknown)?,
            COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC => Self::decode_basic(frame, unknown)?,
            COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY => Self::decode_proxy(frame, unknown)?,
            other => return Err(FrameError::UnknownClass(other)),
        };
        Ok((header, command))
    }

    fn decode_inclusion(frame: &[u8], unknown: FrameError) -> Result<Self, FrameError> {
        match frame[1] {
            NODE_ADD => {
                ensure_len(frame, 6)?;
                Ok(Self::NodeAdd {
                    mode: frame[4],
                    tx_options: frame[5],
                })
            }
            NODE_REMOVE => {
                ensure_len(frame, 5)?;
                Ok(Self::NodeRemove { mode: frame[4] })
            }
            FAILED_NODE_REMOVE => Ok(Self::FailedNodeRemove {
                node: node_at(frame, 3, 4)?,
            }),
            FAILED_NODE_REPLACE => {
                ensure_len(frame, 6)?;
                Ok(Self::FailedNodeReplace {
                    node: NodeId(frame[3] as u16),
                    tx_options: frame[4],
                    mode: frame[5],
                })
            }
            NODE_NEIGHBOR_UPDATE_REQUEST => {
                ensure_len(frame, 4)?;
                Ok(Self::NodeNeighborUpdateRequest {
                    node: NodeId(frame[3] as u16),
                })
            }
            RETURN_ROUTE_ASSIGN => {
                ensure_len(frame, 5)?;
                Ok(Self::ReturnRouteAssign {
                    source: NodeId(frame[3] as u16),
                    destination: NodeId(frame[4] as u16),
                })
            }
            RETURN_ROUTE_DELETE => {
                ensure_len(frame, 4)?;
                Ok(Self::ReturnRouteDelete {
                    node: NodeId(frame[3] as u16),
                })
            }
            NODE_ADD_KEYS_SET => {
                ensure_len(frame, 5)?;
                Ok(Self::NodeAddKeysSet {
                    accept: frame[3] & NODE_ADD_KEYS_SET_ACCEPT != 0,
                    csa: frame[3] & NODE_ADD_KEYS_SET_CSA != 0,
                    granted_keys: KeyClasses(frame[4]),
                })
            }
            NODE_ADD_DSK_SET => {
                ensure_len(frame, 4)?;
                let input_len = frame[3] & NODE_ADD_DSK_SET_LENGTH_MASK;
                let copied = (input_len as usize).min(DSK_LEN);
                ensure_len(frame, 4 + copied)?;
                let mut dsk = [0u8; DSK_LEN];
                dsk[..copied].copy_from_slice(&frame[4..4 + copied]);
                Ok(Self::NodeAddDskSet {
                    accept: frame[3] & NODE_ADD_DSK_SET_ACCEPT != 0,
                    input_len,
                    dsk,
                })
            }
            _ => Err(unknown),
        }
    }

    fn decode_basic(frame: &[u8], unknown: FrameError) -> Result<Self, FrameError> {
        match frame[1] {
            LEARN_MODE_SET => {
                ensure_len(frame, 5)?;
                Ok(Self::LearnModeSet {
                    return_interview_status: frame[3] & LEARN_MODE_RETURN_INTERVIEW_STATUS != 0,
                    mode: frame[4],
                })
            }
            NETWORK_UPDATE_REQUEST => Ok(Self::NetworkUpdateRequest),
            NODE_INFORMATION_SEND => {
                ensure_len(frame, 6)?;
                Ok(Self::NodeInformationSend {
                    destination: NodeId(frame[4] as u16),
                    tx_options: frame[5],
                })
            }
            DEFAULT_SET => Ok(Self::DefaultSet),
            DSK_GET => {
                ensure_len(frame, 4)?;
                Ok(Self::DskGet {
                    add_mode: frame[3] & 0x01 != 0,
                })
            }
            _ => Err(unknown),
        }
    }

    fn decode_proxy(frame: &[u8], unknown: FrameError) -> Result<Self, FrameError> {
        match frame[1] {
            NODE_LIST_GET => Ok(Self::NodeListGet),
            FAILED_NODE_LIST_GET => Ok(Self::FailedNodeListGet),
            NODE_INFO_CACHED_GET => {
                ensure_len(frame, 5)?;
                Ok(Self::NodeInfoCachedGet {
                    max_age: frame[3] & 0x0F,
                    node: node_at(frame, 4, 5)?,
                })
            }
            MULTI_CHANNEL_END_POINT_GET => Ok(Self::MultiChannelEndPointGet {
                node: node_at(frame, 3, 4)?,
            }),
            MULTI_CHANNEL_CAPABILITY_GET => {
                ensure_len(frame, 5)?;
                Ok(Self::MultiChannelCapabilityGet {
                    node: node_at(frame, 3, 5)?,
                    endpoint: frame[4] & 0x7F,
                })
            }
            MULTI_CHANNEL_AGGREGATED_MEMBERS_GET => {
                ensure_len(frame, 5)?;
                Ok(Self::MultiChannelAggregatedMembersGet {
                    node: node_at(frame, 3, 5)?,
                    aggregated_endpoint: frame[4] & 0x7F,
                })
            }
            _ => Err(unknown),
        }
    }

    /// The node a command operates on when that node may be asleep.
    ///
    /// Commands returned here are postponed by the mailbox queue when the node
    /// is a mailbox node.
    pub fn mailbox_target(&self) -> Option<NodeId> {
        match self {
            Self::NodeInfoCachedGet { max_age: 0, node } => Some(*node),
            Self::NodeInformationSend { destination, .. } => Some(*destination),
            Self::NodeNeighborUpdateRequest { node } => Some(*node),
            Self::ReturnRouteAssign { source, .. } => Some(*source),
            Self::ReturnRouteDelete { node } => Some(*node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_node_add() {
        let frame = [0x34, NODE_ADD, 0x2A, 0x00, NODE_ADD_ANY_S2, 0x20];
        let (header, command) = NmCommand::decode(&frame).unwrap();
        assert_eq!(header.seq, 0x2A);
        assert_eq!(
            command,
            NmCommand::NodeAdd {
                mode: NODE_ADD_ANY_S2,
                tx_options: 0x20
            }
        );
    }

    #[test]
    fn test_decode_failed_node_remove_long_range() {
        let frame = [0x34, FAILED_NODE_REMOVE, 1, 0xFF, 0x01, 0x05];
        let (_, command) = NmCommand::decode(&frame).unwrap();
        assert_eq!(command, NmCommand::FailedNodeRemove { node: NodeId(0x0105) });

        let short = [0x34, FAILED_NODE_REMOVE, 1, 0xFF, 0x01];
        assert_eq!(
            NmCommand::decode(&short),
            Err(FrameError::TooShort {
                expected: 6,
                actual: 5
            })
        );
    }

    #[test]
    fn test_decode_dsk_set_copies_input_len() {
        let frame = [0x34, NODE_ADD_DSK_SET, 9, 0x82, 0xAB, 0xCD];
        let (_, command) = NmCommand::decode(&frame).unwrap();
        match command {
            NmCommand::NodeAddDskSet {
                accept,
                input_len,
                dsk,
            } => {
                assert!(accept);
                assert_eq!(input_len, 2);
                assert_eq!(&dsk[..3], &[0xAB, 0xCD, 0x00]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_decode_learn_mode_interview_bit() {
        let frame = [0x4D, LEARN_MODE_SET, 3, 0x01, LEARN_MODE_NWI];
        let (_, command) = NmCommand::decode(&frame).unwrap();
        assert_eq!(
            command,
            NmCommand::LearnModeSet {
                return_interview_status: true,
                mode: LEARN_MODE_NWI
            }
        );
    }

    #[test]
    fn test_decode_unknown_class_and_command() {
        assert_eq!(
            NmCommand::decode(&[0x20, 0x01, 0x00]),
            Err(FrameError::UnknownClass(0x20))
        );
        assert_eq!(
            NmCommand::decode(&[0x52, 0x7F, 0x00]),
            Err(FrameError::UnknownCommand {
                class: 0x52,
                command: 0x7F
            })
        );
        assert_eq!(
            NmCommand::decode(&[0x52]),
            Err(FrameError::TooShort {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn test_mailbox_target_only_for_sleep_sensitive_commands() {
        let cached_fresh = NmCommand::NodeInfoCachedGet {
            max_age: 0,
            node: NodeId(5),
        };
        let cached_stale_ok = NmCommand::NodeInfoCachedGet {
            max_age: 3,
            node: NodeId(5),
        };
        assert_eq!(cached_fresh.mailbox_target(), Some(NodeId(5)));
        assert_eq!(cached_stale_ok.mailbox_target(), None);
        assert_eq!(NmCommand::DefaultSet.mailbox_target(), None);
    }
}
