// crates/zipgw-nms/src/handler.rs
//! Entry point for network management requests received from IP clients.
//!
//! A request is decoded, parked in the mailbox queue if its target node is
//! asleep, checked against the session owner and finally turned into a state
//! machine event or answered directly.

use crate::frame::constants::*;
use crate::frame::reply::{busy_reply, dsk_report};
use crate::frame::{FrameError, NmCommand, RequestHeader};
use crate::hal::{NmsEnv, NmsError, NodeMode, NopPurpose};
use crate::nms::{NetworkManagement, skip_flirs_option};
use crate::nms::events::NmEvent;
use crate::nms::states::NmState;
use crate::types::{NodeId, Peer};
use alloc::vec::Vec;
use log::{debug, info, trace, warn};

/// Result of handing a request to [`NetworkManagement::handle_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The request was accepted. Its reply is sent now or when the
    /// operation completes.
    Handled,
    /// The request cannot run in the current state and nothing was sent.
    /// Also returned after a busy reply to a client that does not own the
    /// session.
    Busy,
    ParseError,
    NotSupported,
    ClassNotSupported,
    /// The target node is asleep; the request waits in the mailbox queue.
    Postponed,
}

impl From<FrameError> for HandlerOutcome {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooShort { .. } => Self::ParseError,
            FrameError::UnknownClass(_) => Self::ClassNotSupported,
            FrameError::UnknownCommand { .. } => Self::NotSupported,
        }
    }
}

impl From<NmsError> for HandlerOutcome {
    fn from(err: NmsError) -> Self {
        match err {
            NmsError::Busy | NmsError::NotIdle | NmsError::QueueFull => Self::Busy,
            NmsError::FrameTooShort { .. }
            | NmsError::InvalidNodeId(_)
            | NmsError::InvalidMode(_) => Self::ParseError,
            NmsError::UnknownCommandClass(_) => Self::ClassNotSupported,
            NmsError::UnknownCommand { .. }
            | NmsError::CollaboratorFailure(_)
            | NmsError::InvalidConfig(_) => Self::NotSupported,
        }
    }
}

impl NetworkManagement {
    /// Handles one network management request from `peer`.
    pub fn handle_command(
        &mut self,
        env: &mut NmsEnv<'_>,
        peer: Peer,
        frame: &[u8],
    ) -> HandlerOutcome {
        env.host.mailbox_abort_sending();

        let (header, command) = match NmCommand::decode(frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!("[NMS-Handler] Rejecting request from {}: {}", peer.remote, NmsError::from(err));
                return err.into();
            }
        };
        if self.postpone_for_mailbox(env, &peer, &command, frame) {
            return HandlerOutcome::Postponed;
        }
        self.execute(env, peer, header, command)
    }

    /// Runs a request without the mailbox check. Used for commands taken
    /// out of the mailbox queue.
    pub(crate) fn handle_command_internal(
        &mut self,
        env: &mut NmsEnv<'_>,
        peer: Peer,
        frame: &[u8],
    ) -> HandlerOutcome {
        match NmCommand::decode(frame) {
            Ok((header, command)) => self.execute(env, peer, header, command),
            Err(err) => err.into(),
        }
    }

    /// Parks the request if it targets a sleeping node, and starts checking
    /// whether that node is awake.
    fn postpone_for_mailbox(
        &mut self,
        env: &mut NmsEnv<'_>,
        peer: &Peer,
        command: &NmCommand,
        frame: &[u8],
    ) -> bool {
        if !self.config.mailbox_enabled {
            return false;
        }
        let Some(target) = command.mailbox_target() else {
            return false;
        };
        if target.is_none() || target == NodeId(0xFF) || env.host.mailbox_active_node() == target {
            return false;
        }
        let is_mailbox = env
            .directory
            .node(target)
            .is_some_and(|record| record.mode == NodeMode::Mailbox);
        if !is_mailbox {
            return false;
        }

        if !env.radio.send_nop(target, NopPurpose::AwakeCheck) {
            trace!("[NMS-Handler] Awake check of node {} not sent", target);
        }
        debug!("[NMS-Handler] Node {} is a mailbox node, queueing the request", target);
        let period = self.config.timeouts.queue_nak_waiting_ms;
        self.queue
            .push(env.transport, env.now_ms, period, target, *peer, frame)
            .is_ok()
    }

    fn execute(
        &mut self,
        env: &mut NmsEnv<'_>,
        peer: Peer,
        header: RequestHeader,
        command: NmCommand,
    ) -> HandlerOutcome {
        match self.dispatch_command(env, peer, header, command) {
            Ok(outcome) => outcome,
            Err(err) => {
                match err {
                    NmsError::InvalidMode(_) => warn!(
                        "[NMS-Handler] Dropping {:#04x}/{:#04x}: {}",
                        header.class, header.command, err
                    ),
                    _ => debug!(
                        "[NMS-Handler] Not running {:#04x}/{:#04x} in {:?}: {}",
                        header.class, header.command, self.session.state, err
                    ),
                }
                err.into()
            }
        }
    }

    fn dispatch_command(
        &mut self,
        env: &mut NmsEnv<'_>,
        peer: Peer,
        header: RequestHeader,
        command: NmCommand,
    ) -> Result<HandlerOutcome, NmsError> {
        // --- Admission ---
        if self.session.state.is_idle() {
            self.session.peer = Some(peer);
            self.session.seq = header.seq;
        } else if !self.session.peer.is_some_and(|owner| owner.same_endpoint(&peer)) {
            warn!(
                "[NMS-Handler] Session busy in {:?}, rejecting {:#04x}/{:#04x} from {}",
                self.session.state, header.class, header.command, peer.remote
            );
            env.transport.send(&peer, &busy_reply(&header));
            return Err(NmsError::Busy);
        }

        if header.class == COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION
            && env.radio.controller_capabilities() & CONTROLLER_NODEID_SERVER_PRESENT == 0
            && !env.radio.is_primary_controller()
        {
            info!("[NMS-Handler] Inclusion requires a SIS or a primary controller");
            return Ok(HandlerOutcome::NotSupported);
        }

        let idle = self.session.state.is_idle();
        match command {
            // --- Proxy ---
            NmCommand::NodeListGet => self.post_event(env, NmEvent::RequestNodeList),
            NmCommand::FailedNodeListGet => self.post_event(env, NmEvent::RequestFailedNodeList),
            NmCommand::NodeInfoCachedGet { max_age, node } => {
                self.require_idle()?;
                self.post_event(env, NmEvent::NodeInfoCachedGet { node, max_age });
            }
            NmCommand::MultiChannelEndPointGet { node } => {
                self.require_idle()?;
                let report = self.build_multi_channel_end_point_report(
                    env,
                    header.seq,
                    node.legacy_byte(),
                    node,
                );
                return Ok(self.finish_with_report(env, report));
            }
            NmCommand::MultiChannelCapabilityGet { node, endpoint } => {
                self.require_idle()?;
                let report = self.build_multi_channel_capability_report(
                    env,
                    header.seq,
                    node.legacy_byte(),
                    node,
                    endpoint,
                );
                return Ok(self.finish_with_report(env, report));
            }
            NmCommand::MultiChannelAggregatedMembersGet {
                node,
                aggregated_endpoint,
            } => {
                self.require_idle()?;
                let report = self.build_multi_channel_aggregated_members_report(
                    env,
                    header.seq,
                    node.legacy_byte(),
                    node,
                    aggregated_endpoint,
                );
                return Ok(self.finish_with_report(env, report));
            }

            // --- Basic ---
            NmCommand::DefaultSet => {
                if !idle {
                    // Only the session owner gets here.
                    self.send_to_peer(env, &busy_reply(&header));
                    return Ok(HandlerOutcome::Handled);
                }
                self.post_event(env, NmEvent::DefaultSet);
            }
            NmCommand::LearnModeSet {
                return_interview_status,
                mode,
            } => {
                // A cancel is answered with the seq of the cancelling request.
                if mode == LEARN_MODE_DISABLE
                    && matches!(
                        self.session.state,
                        NmState::LearnMode | NmState::WaitForSecureLearn
                    )
                {
                    self.session.seq = header.seq;
                }
                self.post_event(
                    env,
                    NmEvent::LearnSet {
                        mode,
                        return_interview_status,
                    },
                )
            }
            NmCommand::NodeInformationSend {
                destination,
                tx_options,
            } => {
                self.require_idle()?;
                self.post_event(
                    env,
                    NmEvent::NodeInformationSend {
                        destination,
                        tx_options,
                    },
                );
            }
            NmCommand::NetworkUpdateRequest => {
                self.require_idle()?;
                self.post_event(env, NmEvent::NetworkUpdateRequest);
            }
            NmCommand::DskGet { add_mode } => {
                let dsk = env.security.public_dsk(add_mode);
                env.transport.send(&peer, &dsk_report(header.seq, add_mode, &dsk));
            }

            // --- Inclusion ---
            NmCommand::NodeAdd { mode, tx_options } => {
                let event = self.node_add_event(env, mode, tx_options)?;
                self.post_event(env, event);
            }
            NmCommand::NodeRemove { mode } => {
                if !idle && self.session.state != NmState::WaitingForNodeRemoval {
                    return Err(NmsError::NotIdle);
                }
                let event = if mode == NODE_REMOVE_STOP {
                    NmEvent::NodeRemoveStop
                } else {
                    NmEvent::NodeRemove { mode }
                };
                self.post_event(env, event);
            }
            NmCommand::FailedNodeRemove { node } => {
                self.require_idle()?;
                self.post_event(env, NmEvent::FailedNodeRemove(node));
            }
            NmCommand::FailedNodeReplace {
                node,
                tx_options,
                mode,
            } => {
                let normal_power = tx_options != TRANSMIT_OPTION_LOW_POWER;
                let event = match mode {
                    START_FAILED_NODE_REPLACE => NmEvent::ReplaceFailedStart {
                        node,
                        normal_power,
                        s2: false,
                    },
                    START_FAILED_NODE_REPLACE_S2 => NmEvent::ReplaceFailedStart {
                        node,
                        normal_power,
                        s2: true,
                    },
                    STOP_FAILED_NODE_REPLACE => NmEvent::ReplaceFailedStop(node),
                    other => return Err(NmsError::InvalidMode(other)),
                };
                self.post_event(env, event);
            }
            NmCommand::NodeNeighborUpdateRequest { node } => {
                self.require_idle()?;
                self.post_event(env, NmEvent::NeighborUpdateRequest(node));
            }
            NmCommand::ReturnRouteAssign {
                source,
                destination,
            } => {
                self.require_idle()?;
                self.post_event(
                    env,
                    NmEvent::ReturnRouteAssign {
                        source,
                        destination,
                    },
                );
            }
            NmCommand::ReturnRouteDelete { node } => {
                self.require_idle()?;
                self.post_event(env, NmEvent::ReturnRouteDelete(node));
            }
            NmCommand::NodeAddKeysSet {
                accept,
                csa,
                granted_keys,
            } => self.post_event(
                env,
                NmEvent::KeysSet {
                    accept,
                    csa,
                    keys: granted_keys,
                },
            ),
            NmCommand::NodeAddDskSet {
                accept,
                input_len,
                dsk,
            } => self.post_event(
                env,
                NmEvent::DskSet {
                    accept,
                    input_len,
                    dsk,
                },
            ),
        }
        Ok(HandlerOutcome::Handled)
    }

    /// Fails with [`NmsError::NotIdle`] while an operation is running.
    fn require_idle(&self) -> Result<(), NmsError> {
        if self.session.state.is_idle() {
            Ok(())
        } else {
            Err(NmsError::NotIdle)
        }
    }

    /// Maps a NODE_ADD request to its event, deriving the radio add mode from
    /// the client's transmit options.
    fn node_add_event(
        &mut self,
        env: &NmsEnv<'_>,
        mode: u8,
        tx_options: u8,
    ) -> Result<NmEvent, NmsError> {
        let mut radio_mode = ADD_NODE_ANY | skip_flirs_option(env);
        if tx_options & TRANSMIT_OPTION_LOW_POWER == 0 {
            radio_mode |= ADD_NODE_OPTION_NORMAL_POWER;
        }
        if tx_options & TRANSMIT_OPTION_EXPLORE != 0 {
            radio_mode |= ADD_NODE_OPTION_NETWORK_WIDE;
        }
        match mode {
            NODE_ADD_STOP => Ok(NmEvent::NodeAddStop),
            NODE_ADD_ANY | NODE_ADD_ANY_S2 => {
                self.session.tx_options = TRANSMIT_OPTION_ACK | TRANSMIT_OPTION_AUTO_ROUTE | tx_options;
                Ok(NmEvent::NodeAdd {
                    mode: radio_mode,
                    s2: mode == NODE_ADD_ANY_S2,
                })
            }
            _ => Err(NmsError::InvalidMode(mode)),
        }
    }

    fn finish_with_report(
        &mut self,
        env: &mut NmsEnv<'_>,
        report: Option<Vec<u8>>,
    ) -> HandlerOutcome {
        match report {
            Some(frame) => {
                self.finish_with(env, frame);
                HandlerOutcome::Handled
            }
            None => HandlerOutcome::ParseError,
        }
    }
}
