// crates/zipgw-nms/src/nms/self_destruct.rs
//! Eviction of a SmartStart node whose security bootstrap failed.
//!
//! The node is expected to leave the network by itself. After a grace period
//! the gateway transmits to it once, which the radio requires before a
//! failed-node removal, and then removes it. A failed removal is retried once
//! after a long window.

use super::events::NmEvent;
use super::state::PendingOp;
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::PendingReply;
use crate::frame::constants::{NODE_ADD_STATUS_FAILED, NODE_ADD_STATUS_SECURITY_FAILED};
use crate::hal::{FailedNodeStart, FailedNodeStatus, NmsEnv, NopPurpose};
use log::{debug, info, warn};

impl NetworkManagement {
    pub(crate) fn self_destruct_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        let state = self.session.state;
        match (state, event) {
            (NmState::WaitForSelfDestruct | NmState::WaitForSelfDestructRetry, NmEvent::Timeout) => {
                let next = if state == NmState::WaitForSelfDestruct {
                    NmState::WaitForTxToSelfDestruct
                } else {
                    NmState::WaitForTxToSelfDestructRetry
                };
                self.enter(env, next, None);
                self.session.pending = Some(PendingOp::SelfDestructNop);
                let node = self.session.pending_node;
                if !env.radio.send_nop(node, NopPurpose::SelfDestruct) {
                    debug!("[NMS] NOP to self-destructing node {} not queued", node);
                    self.post_event(env, NmEvent::SelfDestructTxDone);
                }
                Step::Done
            }

            (
                NmState::WaitForTxToSelfDestruct | NmState::WaitForTxToSelfDestructRetry,
                NmEvent::SelfDestructTxDone,
            ) => {
                self.session.complete(PendingOp::SelfDestructNop);
                let next = if state == NmState::WaitForTxToSelfDestruct {
                    NmState::WaitForSelfDestructRemoval
                } else {
                    NmState::WaitForSelfDestructRemovalRetry
                };
                let node = self.session.pending_node;
                info!("[NMS] Removing self-destructed node {}", node);
                let timeout = self.config.timeouts.self_destruct_removal_ms;
                self.enter(env, next, Some(timeout));
                self.session.pending = Some(PendingOp::SelfDestructRemoval);
                if env.radio.remove_failed_node(node) != FailedNodeStart::Started {
                    debug!("[NMS] Removal of self-destructed node {} not started", node);
                    self.post_event(env, NmEvent::RemoveFailedStatus(FailedNodeStatus::NotRemoved));
                }
                Step::Done
            }

            (
                NmState::WaitForSelfDestructRemoval | NmState::WaitForSelfDestructRemovalRetry,
                NmEvent::RemoveFailedStatus(status),
            ) => {
                if !self.session.complete(PendingOp::SelfDestructRemoval) {
                    return Step::Unhandled;
                }
                if *status == FailedNodeStatus::Removed {
                    self.self_destruct_finished(env, NODE_ADD_STATUS_FAILED);
                    let node = self.session.pending_node;
                    env.host.node_deleted(node);
                    env.directory.probe_cancel();
                    self.reset_state(env);
                } else if state == NmState::WaitForSelfDestructRemoval {
                    warn!(
                        "[NMS] Self-destructed node {} could not be removed, retrying later",
                        self.session.pending_node
                    );
                    let timeout = self.config.timeouts.self_destruct_retry_ms;
                    self.enter(env, NmState::WaitForSelfDestructRetry, Some(timeout));
                } else {
                    warn!(
                        "[NMS] Giving up removal of self-destructed node {}",
                        self.session.pending_node
                    );
                    env.directory.probe_cancel();
                    self.self_destruct_finished(env, NODE_ADD_STATUS_SECURITY_FAILED);
                    self.reset_state(env);
                }
                Step::Done
            }

            (
                NmState::WaitForSelfDestructRemoval | NmState::WaitForSelfDestructRemovalRetry,
                NmEvent::Timeout,
            ) => {
                warn!("[NMS] Radio never reported the removal of the self-destructed node");
                env.directory.probe_cancel();
                self.self_destruct_finished(env, NODE_ADD_STATUS_SECURITY_FAILED);
                self.reset_state(env);
                Step::Done
            }

            _ => Step::Unhandled,
        }
    }

    /// Sends the final add status of the SmartStart session to the
    /// unsolicited destinations.
    fn self_destruct_finished(&mut self, env: &mut NmsEnv<'_>, status: u8) {
        if let PendingReply::NodeAdd(reply) = &mut self.session.reply {
            reply.status = status;
        }
        let frame = self.session.reply.encode();
        self.send_to_unsolicited(env, &frame);
    }
}
