// crates/zipgw-nms/src/nms/reply.rs
//! Reply emission and the return to idle.

use super::NetworkManagement;
use super::states::NmState;
use crate::frame::PendingReply;
use crate::frame::constants::{
    FAILED_NODE_REPLACE_DONE, NETWORK_UPDATE_FLAG_VIRTUAL, NODE_ADD_STATUS_DONE,
    NODE_ADD_STATUS_FAILED,
};
use crate::hal::{InclusionStep, NmsEnv};
use crate::types::Peer;
use alloc::vec::Vec;
use log::{debug, error, warn};

impl NetworkManagement {
    /// Emits the accumulated reply and ends the operation.
    pub(crate) fn send_reply(&mut self, env: &mut NmsEnv<'_>) {
        if self.session.flags.is_proxy_inclusion() {
            let ok = match &self.session.reply {
                PendingReply::NodeAdd(r) => r.status == NODE_ADD_STATUS_DONE,
                PendingReply::FailedNodeReplace(r) => r.status == FAILED_NODE_REPLACE_DONE,
                _ => false,
            };
            env.host.inclusion_controller_report(if ok {
                InclusionStep::Ok
            } else {
                InclusionStep::Failed
            });
        }

        let frame = self.session.reply.encode();
        if frame.is_empty() {
            warn!(
                "[NMS] No reply prepared in state {:?}, resetting",
                self.session.state
            );
            self.reset_state(env);
            return;
        }

        if !self.session.flags.is_smart_start() {
            self.send_to_peer(env, &frame);
            self.reset_state(env);
        } else {
            if self.session.reply.status() == Some(NODE_ADD_STATUS_FAILED) {
                error!("[NMS] SmartStart inclusion of node {} failed", self.session.pending_node);
            } else {
                debug!("[NMS] SmartStart inclusion of node {} succeeded", self.session.pending_node);
            }
            self.send_to_unsolicited(env, &frame);
            self.wait_for_middleware_probe(env);
        }
    }

    /// Sends `frame` to the peer owning the session.
    pub(crate) fn send_to_peer(&self, env: &mut NmsEnv<'_>, frame: &[u8]) {
        match &self.session.peer {
            Some(peer) => {
                debug!(
                    "[NMS] Sending reply class {:#04x} cmd {:#04x} to {}",
                    frame.first().copied().unwrap_or(0),
                    frame.get(1).copied().unwrap_or(0),
                    peer.remote
                );
                env.transport.send(peer, frame);
            }
            None => warn!("[NMS] No peer to send reply to"),
        }
    }

    /// Sends `frame` to both configured unsolicited destinations.
    pub(crate) fn send_to_unsolicited(&self, env: &mut NmsEnv<'_>, frame: &[u8]) {
        let destinations: Vec<_> = [
            self.config.unsolicited_destination,
            self.config.unsolicited_destination2,
        ]
        .into_iter()
        .flatten()
        .collect();
        if destinations.is_empty() {
            debug!("[NMS] No unsolicited destination, dropping {} byte frame", frame.len());
        }
        for (index, addr) in destinations.iter().enumerate() {
            if index > 0 && destinations[0] == *addr {
                continue;
            }
            env.transport.send(&Peer::unsolicited(*addr), frame);
        }
    }

    /// Sends `frame` to the peer and ends the operation.
    pub(crate) fn finish_with(&mut self, env: &mut NmsEnv<'_>, frame: Vec<u8>) {
        self.send_to_peer(env, &frame);
        self.reset_state(env);
    }

    /// Returns the session to idle and lets the surrounding components
    /// continue: queued mailbox commands, SmartStart add mode and the router.
    pub(crate) fn reset_state(&mut self, env: &mut NmsEnv<'_>) {
        debug!("[NMS] Reset network management state");
        self.session.reset();
        self.queue_nm_done(env);
        self.smart_start_init_if_pending(env);
        env.host.network_management_done();
    }

    /// Resets immediately after a SmartStart reply but holds new SmartStart
    /// inclusions back while the middleware interviews the node.
    fn wait_for_middleware_probe(&mut self, env: &mut NmsEnv<'_>) {
        self.middleware.waiting = true;
        self.extend_middleware_probe_timeout(env.now_ms);
        self.reset_state(env);
    }

    /// Restarts the middleware hold-off, if one is active.
    pub fn extend_middleware_probe_timeout(&mut self, now_ms: u64) {
        if self.middleware.waiting {
            self.middleware.deadline_ms =
                Some(now_ms.saturating_add(self.config.timeouts.middleware_probe_ms));
        }
    }

    /// Waits for DHCP, probing and the virtual node bridge before the
    /// buffered reply is sent.
    pub(crate) fn send_reply_when_network_updated(&mut self, env: &mut NmsEnv<'_>) {
        let timeout = self.config.timeouts.network_update_ms;
        self.enter(env, NmState::WaitingForProbe, Some(timeout));
        self.session.network_update_flags = if env.host.bridge_ready() {
            NETWORK_UPDATE_FLAG_VIRTUAL
        } else {
            0
        };
        env.directory.probe_lock(false);
    }
}
