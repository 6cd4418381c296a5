// crates/zipgw-nms/src/nms/exclusion.rs
//! Node removal, failed-node removal and failed-node replacement.
//!
//! A replacement starts like a removal but, once the radio reports the slot
//! as re-used, it continues through the same security and interview states
//! as a fresh inclusion.

use super::events::{LearnInfo, NmEvent};
use super::flags::{SecurityFlags, SubFlags};
use super::state::{CommandKind, PendingOp};
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::constants::*;
use crate::frame::reply::{failed_node_remove_status, node_remove_status};
use crate::frame::{FailedNodeReplaceStatus, PendingReply};
use crate::hal::{FailedNodeStart, FailedNodeStatus, NmsEnv, RegisterFlags};
use crate::types::NodeId;
use log::{debug, info, trace, warn};

impl NetworkManagement {
    // --- Entry points ---

    pub(crate) fn start_node_remove(&mut self, env: &mut NmsEnv<'_>, mode: u8) -> Step {
        info!("[NMS] Starting node remove, mode {:#04x}", mode);
        self.session.pending_node = NodeId::NONE;
        self.session.pending = Some(PendingOp::RemoveNode);
        env.radio.remove_node(mode);
        let timeout = self.config.timeouts.remove_node_ms;
        self.enter(env, NmState::WaitingForNodeRemoval, Some(timeout));
        Step::Done
    }

    /// Stops remove mode and reports the removal as failed.
    pub(crate) fn stop_node_remove(&mut self, env: &mut NmsEnv<'_>) -> Step {
        debug!("[NMS] Remove timed out or cancelled");
        self.session.pending = None;
        env.radio.remove_node(REMOVE_NODE_STOP);
        self.session.reply = PendingReply::Frame(node_remove_status(
            self.session.seq,
            NODE_REMOVE_STATUS_FAILED,
            NodeId::NONE,
        ));
        Step::Reply
    }

    pub(crate) fn start_failed_node_remove(&mut self, env: &mut NmsEnv<'_>, node: NodeId) -> Step {
        info!("[NMS] Removing failed node {}", node);
        self.session.pending_node = node;
        let timeout = self.config.timeouts.remove_node_ms;
        self.enter(env, NmState::WaitingForFailNodeRemoval, Some(timeout));

        match env.radio.remove_failed_node(node) {
            FailedNodeStart::Started => {
                self.session.pending = Some(PendingOp::RemoveFailedNode);
                Step::Done
            }
            FailedNodeStart::NotFound => {
                debug!("[NMS] Node {} is not in the failed node list", node);
                self.failed_remove_reply(FAILED_NODE_REMOVE_NOT_FOUND)
            }
            FailedNodeStart::Refused => {
                warn!("[NMS] Radio refused to remove failed node {}", node);
                self.failed_remove_reply(FAILED_NODE_REMOVE_FAIL)
            }
        }
    }

    /// Starts (`normal_power = Some(..)`) or stops (`None`) the replacement
    /// of a failed node.
    pub(crate) fn start_replace_failed(
        &mut self,
        env: &mut NmsEnv<'_>,
        node: NodeId,
        normal_power: Option<bool>,
        s2: bool,
    ) -> Step {
        self.session.command = CommandKind::FailedNodeReplace;
        self.session.pending_node = node;
        self.session.reply =
            PendingReply::FailedNodeReplace(FailedNodeReplaceStatus::new(self.session.seq, node));
        self.enter(env, NmState::ReplaceFailedReq, None);
        if s2 {
            self.session.flags = SubFlags::S2_ADD;
        }

        let Some(normal_power) = normal_power else {
            debug!("[NMS] Replace of node {} stopped", node);
            return Step::Reply;
        };

        env.radio.add_node(ADD_NODE_STOP);
        match env.radio.replace_failed_node(node, normal_power) {
            FailedNodeStart::Started => {
                info!("[NMS] Replacing failed node {}", node);
                self.session.pending = Some(PendingOp::ReplaceFailedNode);
                let timeout = self.config.timeouts.add_node_ms;
                self.rearm(env, timeout);
                Step::Done
            }
            other => {
                warn!("[NMS] Replace of failed node {} not started: {:?}", node, other);
                Step::Reply
            }
        }
    }

    // --- Transitions ---

    pub(crate) fn removal_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match (self.session.state, event) {
            (NmState::WaitingForNodeRemoval, NmEvent::NodeRemove { mode }) => {
                debug!("[NMS] Remove requested again, restarting remove mode");
                self.start_node_remove(env, *mode)
            }
            (NmState::WaitingForNodeRemoval, NmEvent::NodeRemoveStop | NmEvent::Timeout) => {
                self.stop_node_remove(env)
            }
            (NmState::WaitingForNodeRemoval, NmEvent::RemoveNodeStatus { status, source }) => {
                self.remove_node_status(env, *status, *source)
            }

            (NmState::RemovingAssociations, NmEvent::VirtualNodesRemoved) => Step::Reply,
            (NmState::RemovingAssociations, NmEvent::Timeout) => {
                warn!("[NMS] Association cleanup did not finish, replying anyway");
                Step::Reply
            }

            (NmState::WaitingForFailNodeRemoval, NmEvent::RemoveFailedStatus(status)) => {
                if !self.session.complete(PendingOp::RemoveFailedNode) {
                    return Step::Unhandled;
                }
                self.failed_node_removed(env, *status)
            }
            (NmState::WaitingForFailNodeRemoval, NmEvent::Timeout) => {
                warn!(
                    "[NMS] Radio never reported the removal of failed node {}",
                    self.session.pending_node
                );
                self.session.pending = None;
                self.failed_remove_reply(FAILED_NODE_REMOVE_FAIL)
            }

            (
                NmState::ReplaceFailedReq,
                NmEvent::Timeout | NmEvent::ReplaceFailedStop(_) | NmEvent::ReplaceFailedFail,
            ) => {
                if matches!(event, NmEvent::ReplaceFailedFail)
                    && !self.session.complete(PendingOp::ReplaceFailedNode)
                {
                    return Step::Unhandled;
                }
                debug!("[NMS] Replace of node {} ended: {:?}", self.session.pending_node, event);
                self.session.pending = None;
                env.radio.add_node(ADD_NODE_STOP);
                Step::Reply
            }
            (NmState::ReplaceFailedReq, NmEvent::ReplaceFailedDone(info)) => {
                // Proxy replacements are not started through the radio.
                if info.is_none() && !self.session.complete(PendingOp::ReplaceFailedNode) {
                    return Step::Unhandled;
                }
                self.replace_done(env, info.as_ref())
            }

            _ => Step::Unhandled,
        }
    }

    fn remove_node_status(&mut self, env: &mut NmsEnv<'_>, status: u8, source: NodeId) -> Step {
        if !self.session.expects(PendingOp::RemoveNode) {
            return Step::Unhandled;
        }
        match status {
            REMOVE_NODE_STATUS_LEARN_READY => {
                trace!("[NMS] Radio is in remove mode");
                let timeout = self.config.timeouts.remove_node_ms;
                self.rearm(env, timeout);
                Step::Done
            }
            REMOVE_NODE_STATUS_NODE_FOUND => {
                trace!("[NMS] Node found for removal");
                Step::Done
            }
            REMOVE_NODE_STATUS_REMOVING_END_NODE | REMOVE_NODE_STATUS_REMOVING_CONTROLLER => {
                debug!("[NMS] Removing node {}", source);
                self.session.pending_node = source;
                Step::Done
            }
            REMOVE_NODE_STATUS_DONE => {
                self.session.complete(PendingOp::RemoveNode);
                let node = self.session.pending_node;
                info!("[NMS] Node {} removed", node);
                env.radio.remove_node(REMOVE_NODE_STOP);
                self.session.reply = PendingReply::Frame(node_remove_status(
                    self.session.seq,
                    NODE_REMOVE_STATUS_DONE,
                    node,
                ));
                if !node.is_valid() {
                    return Step::Reply;
                }
                let timeout = self.config.timeouts.remove_node_ms;
                self.enter(env, NmState::RemovingAssociations, Some(timeout));
                self.queue.purge_node(env.transport, node);
                // Completion arrives as `VirtualNodesRemoved`.
                env.host.node_deleted(node);
                Step::Done
            }
            REMOVE_NODE_STATUS_FAILED => {
                self.session.complete(PendingOp::RemoveNode);
                self.stop_node_remove(env)
            }
            other => {
                trace!("[NMS] Ignoring remove status {:#04x}", other);
                Step::Done
            }
        }
    }

    fn failed_remove_reply(&mut self, status: u8) -> Step {
        self.session.reply = PendingReply::Frame(failed_node_remove_status(
            self.session.seq,
            status,
            self.session.pending_node,
        ));
        Step::Reply
    }

    fn failed_node_removed(&mut self, env: &mut NmsEnv<'_>, status: FailedNodeStatus) -> Step {
        let node = self.session.pending_node;
        match status {
            FailedNodeStatus::Removed => {
                info!("[NMS] Failed node {} removed", node);
                self.queue.purge_node(env.transport, node);
                env.host.node_deleted(node);
                self.failed_remove_reply(FAILED_NODE_REMOVE_DONE)
            }
            FailedNodeStatus::NodeOk => {
                info!("[NMS] Node {} responded, it is not failing", node);
                env.directory.set_failing(node, false);
                self.failed_remove_reply(FAILED_NODE_REMOVE_FAIL)
            }
            other => {
                debug!("[NMS] Failed node {} not removed: {:?}", node, other);
                self.failed_remove_reply(FAILED_NODE_REMOVE_FAIL)
            }
        }
    }

    /// The failed node's id was taken by the replacement. Continues with the
    /// security bootstrap the old node had, or the new one announces.
    fn replace_done(&mut self, env: &mut NmsEnv<'_>, info: Option<&LearnInfo>) -> Step {
        let node = self.session.pending_node;
        let node_flags = match info {
            Some(info) => {
                let mut flags = SecurityFlags::empty();
                if info.supports(COMMAND_CLASS_SECURITY) {
                    flags.insert(SecurityFlags::SECURITY0);
                }
                if info.supports(COMMAND_CLASS_SECURITY_2) {
                    flags.insert(SecurityFlags::SECURITY2);
                }
                flags
            }
            None => env.directory.security_flags(node),
        };
        info!("[NMS] Failed node {} replaced", node);

        let timeout = self.config.timeouts.secure_add_ms;
        self.enter(env, NmState::WaitForSecureAdd, Some(timeout));
        env.host.node_deleted(node);
        env.directory.probe_lock(true);

        if self.suc_takes_over_inclusion(env) {
            return Step::Done;
        }
        env.directory
            .register_new_node(node, RegisterFlags::JUST_ADDED | RegisterFlags::ADDED_BY_ME);

        if self.session.flags.is_s2_add() && node_flags.has_any_s2() {
            info!("[NMS] Starting S2 bootstrap of replacement node {}", node);
            env.security.start_s2_add(node);
            return Step::Done;
        }
        if node_flags.contains(SecurityFlags::SECURITY0) {
            if self.session.flags.is_proxy_inclusion() {
                env.host.inclusion_controller_you_do_it(node);
            } else if !self.session.flags.is_smart_start() {
                let protocol = env.radio.node_protocol_info(node);
                env.security
                    .start_s0_add(node, self.session.tx_options, protocol.is_controller());
            }
            return Step::Done;
        }

        self.post_event(env, NmEvent::SecurityDone(SecurityFlags::empty()));
        Step::Done
    }
}
