// crates/zipgw-nms/src/nms/notify.rs
//! Collaborator callbacks, translated into state machine events.
//!
//! Radio completions are only forwarded while the operation that issued them
//! is still pending; anything else is a leftover of an abandoned session.

use super::NetworkManagement;
use super::events::{LearnInfo, NmEvent};
use super::flags::{KeyClasses, SecurityFlags};
use super::state::PendingOp;
use super::states::NmState;
use crate::frame::constants::*;
use crate::hal::{FailedNodeStatus, NmsEnv, NopPurpose, ZipAck};
use crate::handler::HandlerOutcome;
use crate::types::{Dsk, NodeId};
use log::{debug, info, trace};

impl NetworkManagement {
    /// Posts `event` if one of `ops` is pending, drops it otherwise.
    fn post_if_pending(&mut self, env: &mut NmsEnv<'_>, ops: &[PendingOp], event: NmEvent) {
        if ops.iter().any(|op| self.session.expects(*op)) {
            self.post_event(env, event);
        } else {
            debug!(
                "[NMS] Dropping late callback {:?} in state {:?}",
                event, self.session.state
            );
        }
    }

    // --- Radio ---

    pub fn notify_add_node_status(&mut self, env: &mut NmsEnv<'_>, status: u8, info: LearnInfo) {
        let Some(event) = NmEvent::from_add_node_status(status, info) else {
            trace!("[NMS] Ignoring add node status {:#04x}", status);
            return;
        };
        self.post_if_pending(env, &[PendingOp::AddNode], event);
    }

    pub fn notify_remove_node_status(&mut self, env: &mut NmsEnv<'_>, status: u8, source: NodeId) {
        self.post_if_pending(
            env,
            &[PendingOp::RemoveNode],
            NmEvent::RemoveNodeStatus { status, source },
        );
    }

    /// Completion of a failed node removal, including the removal of a
    /// self-destructed SmartStart node.
    pub fn notify_remove_failed_status(&mut self, env: &mut NmsEnv<'_>, code: u8) {
        let Some(status) = FailedNodeStatus::from_code(code) else {
            debug!("[NMS] Unknown failed node status {:#04x}", code);
            return;
        };
        self.post_if_pending(
            env,
            &[PendingOp::RemoveFailedNode, PendingOp::SelfDestructRemoval],
            NmEvent::RemoveFailedStatus(status),
        );
    }

    pub fn notify_replace_failed_status(&mut self, env: &mut NmsEnv<'_>, code: u8) {
        let event = match FailedNodeStatus::from_code(code) {
            Some(FailedNodeStatus::ReplaceReady) => {
                info!("[NMS] Radio is ready to replace node {}", self.session.pending_node);
                return;
            }
            Some(FailedNodeStatus::ReplaceDone) => NmEvent::ReplaceFailedDone(None),
            Some(FailedNodeStatus::NodeOk | FailedNodeStatus::ReplaceFailed) => {
                NmEvent::ReplaceFailedFail
            }
            other => {
                debug!("[NMS] Unexpected replace status {:?} ({:#04x})", other, code);
                return;
            }
        };
        self.post_if_pending(env, &[PendingOp::ReplaceFailedNode], event);
    }

    pub fn notify_learn_mode_status(&mut self, env: &mut NmsEnv<'_>, status: u8, source: NodeId) {
        let event = match status {
            LEARN_MODE_STATUS_STARTED => NmEvent::LearnModeStarted(source),
            LEARN_MODE_STATUS_DONE => NmEvent::LearnModeDone(source),
            LEARN_MODE_STATUS_FAILED => NmEvent::LearnModeFailed,
            other => {
                trace!("[NMS] Ignoring learn mode status {:#04x}", other);
                return;
            }
        };
        self.post_if_pending(env, &[PendingOp::LearnMode], event);
    }

    pub fn notify_neighbor_update_status(&mut self, env: &mut NmsEnv<'_>, status: u8) {
        self.post_if_pending(
            env,
            &[PendingOp::NeighborUpdate, PendingOp::NeighborUpdateAfterSecureAdd],
            NmEvent::NeighborUpdateStatus(status),
        );
    }

    pub fn notify_return_route_status(&mut self, env: &mut NmsEnv<'_>, status: u8) {
        self.post_if_pending(
            env,
            &[PendingOp::ReturnRouteAssign, PendingOp::ReturnRouteDelete],
            NmEvent::ReturnRouteStatus(status),
        );
    }

    pub fn notify_network_update_done(&mut self, env: &mut NmsEnv<'_>, status: u8) {
        self.post_if_pending(env, &[PendingOp::NetworkUpdate], NmEvent::NetworkUpdateStatus(status));
    }

    pub fn notify_set_default_done(&mut self, env: &mut NmsEnv<'_>) {
        self.post_if_pending(env, &[PendingOp::SetDefault], NmEvent::SetDefaultDone);
    }

    pub fn notify_node_information_sent(&mut self, env: &mut NmsEnv<'_>, status: u8) {
        if status != TRANSMIT_COMPLETE_OK {
            debug!("[NMS] Node information transmission ended with {:#04x}", status);
        }
        self.post_if_pending(env, &[PendingOp::NodeInformation], NmEvent::NodeInformationSent);
    }

    /// Transmission result of a NOP sent with [`RadioTransport::send_nop`].
    ///
    /// [`RadioTransport::send_nop`]: crate::hal::RadioTransport::send_nop
    pub fn notify_nop_done(
        &mut self,
        env: &mut NmsEnv<'_>,
        node: NodeId,
        purpose: NopPurpose,
        status: u8,
    ) {
        match purpose {
            NopPurpose::SelfDestruct => {
                self.post_if_pending(env, &[PendingOp::SelfDestructNop], NmEvent::SelfDestructTxDone);
            }
            NopPurpose::AwakeCheck if status == TRANSMIT_COMPLETE_OK => {
                debug!("[NMS] Node {} is awake, running its queued commands", node);
                self.notify_node_awake(env, node);
            }
            NopPurpose::AwakeCheck => trace!("[NMS] Node {} did not answer the awake check", node),
        }
    }

    /// A node information frame arrived.
    pub fn notify_node_info(&mut self, env: &mut NmsEnv<'_>, node: NodeId, nif: &[u8]) {
        self.post_event(env, NmEvent::NodeInfo(LearnInfo::new(node, nif)));
    }

    // --- Security engine ---

    pub fn notify_security_done(&mut self, env: &mut NmsEnv<'_>, flags: SecurityFlags) {
        self.post_event(env, NmEvent::SecurityDone(flags));
    }

    pub fn notify_key_request(&mut self, env: &mut NmsEnv<'_>, keys: KeyClasses, csa: bool) {
        self.post_event(env, NmEvent::KeyRequest { keys, csa });
    }

    pub fn notify_dsk_challenge(
        &mut self,
        env: &mut NmsEnv<'_>,
        granted_keys: KeyClasses,
        public_key: Dsk,
    ) {
        self.post_event(
            env,
            NmEvent::DskChallenge {
                granted_keys,
                public_key,
            },
        );
    }

    pub fn notify_s0_started(&mut self, env: &mut NmsEnv<'_>) {
        self.post_event(env, NmEvent::S0Started);
    }

    // --- Resource directory and gateway ---

    /// The interview of `node` finished. The result is read back from the
    /// resource directory.
    pub fn notify_probe_done(&mut self, env: &mut NmsEnv<'_>, node: NodeId) {
        self.post_event(env, NmEvent::NodeProbeDone(node));
    }

    pub fn notify_all_probed(&mut self, env: &mut NmsEnv<'_>) {
        self.post_event(env, NmEvent::AllProbed);
    }

    pub fn notify_dhcp_assigned(&mut self, env: &mut NmsEnv<'_>, node: NodeId) {
        self.post_event(env, NmEvent::DhcpDone(node));
    }

    pub fn notify_mdns_exited(&mut self, env: &mut NmsEnv<'_>) {
        self.post_event(env, NmEvent::MdnsExit);
    }

    pub fn notify_frame_received(&mut self, env: &mut NmsEnv<'_>) {
        if self.session.state == NmState::WaitForProbeBySis {
            self.post_event(env, NmEvent::FrameReceived);
        }
    }

    pub fn notify_virtual_nodes_removed(&mut self, env: &mut NmsEnv<'_>) {
        self.post_event(env, NmEvent::VirtualNodesRemoved);
    }

    /// The inclusion controller finished including or replacing the node.
    pub fn notify_proxy_complete(&mut self, env: &mut NmsEnv<'_>) {
        self.post_event(env, NmEvent::ProxyComplete);
    }

    /// Progress of the network update (DHCPv4, probing, virtual node bridge)
    /// that a buffered reply waits for.
    pub fn notify_network_update_status(&mut self, env: &mut NmsEnv<'_>, flags: u8) {
        if self.session.state == NmState::WaitingForProbe {
            self.post_event(env, NmEvent::NetworkUpdateFlags(flags));
        } else {
            self.session.network_update_flags |= flags;
        }
    }

    // --- Inclusion controller ---

    pub fn start_proxy_inclusion(&mut self, env: &mut NmsEnv<'_>, node: NodeId) {
        self.post_event(env, NmEvent::StartProxyInclusion(node));
    }

    pub fn start_proxy_replace(&mut self, env: &mut NmsEnv<'_>, node: NodeId) {
        self.post_event(env, NmEvent::StartProxyReplace(node));
    }

    // --- Mailbox queue ---

    /// `node` is awake: runs its first queued command. Returns true when a
    /// command was started.
    pub fn notify_node_awake(&mut self, env: &mut NmsEnv<'_>, node: NodeId) -> bool {
        let executing = self.queue.executing_node();
        if !executing.is_none() && executing != node {
            return false;
        }
        if !self.session.state.is_idle() {
            trace!("[NMS] Node {} woke up during {:?}", node, self.session.state);
            return false;
        }
        let Some(entry) = self.queue.take_front_for(node) else {
            return false;
        };

        self.queue.set_executing(node);
        match self.handle_command_internal(env, entry.peer, &entry.frame) {
            HandlerOutcome::Busy => {
                self.queue.set_executing(executing);
                self.queue.restore_front(entry);
                false
            }
            outcome => {
                debug!("[NMS] Queued command for node {} executed: {:?}", node, outcome);
                env.transport.send_ack(&entry.peer, ZipAck::Ack);
                true
            }
        }
    }

    /// Called on every return to idle. Continues with the next command of the
    /// node being served, or hands the node back to the mailbox.
    pub(crate) fn queue_nm_done(&mut self, env: &mut NmsEnv<'_>) {
        let node = self.queue.executing_node();
        if node.is_none() {
            return;
        }
        if !self.notify_node_awake(env, node) {
            debug!("[NMS] No more queued commands for node {}", node);
            self.queue.set_executing(NodeId::NONE);
            env.host.mailbox_wakeup(node);
        }
    }
}
