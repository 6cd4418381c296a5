// crates/zipgw-nms/src/nms/maintenance.rs
//! Network maintenance requests: network update, node information send,
//! neighbor update, return routes, default set, cached node info, and the
//! wait for the network to settle before a reply.

use super::events::NmEvent;
use super::state::PendingOp;
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::PendingReply;
use crate::frame::constants::*;
use crate::frame::reply::{
    default_set_complete, neighbor_update_status, network_update_request_status,
    return_route_assign_complete, return_route_delete_complete,
};
use crate::hal::{NmsEnv, RegisterFlags};
use crate::types::NodeId;
use log::{debug, info, warn};

/// `max_age` value meaning "never refresh the cache".
const MAX_AGE_INFINITE: u8 = 15;

impl NetworkManagement {
    // --- Network update request ---

    pub(crate) fn start_network_update(&mut self, env: &mut NmsEnv<'_>) -> Step {
        if env.radio.request_network_update() {
            self.session.pending = Some(PendingOp::NetworkUpdate);
            self.enter(env, NmState::NetworkUpdate, None);
            return Step::Done;
        }
        // Nothing to fetch from the SUC: answer right away.
        let status = if env.radio.suc_node_id().is_none() {
            SUC_UPDATE_DISABLED
        } else {
            SUC_UPDATE_DONE
        };
        debug!("[NMS] Network update not started, status {:#04x}", status);
        self.network_update_done(env, status)
    }

    fn network_update_done(&mut self, env: &mut NmsEnv<'_>, status: u8) -> Step {
        self.session.reply =
            PendingReply::Frame(network_update_request_status(self.session.seq, status));
        if env.directory.probe_new_nodes() > 0 {
            info!("[NMS] Network update found new nodes, waiting for their interview");
            self.send_reply_when_network_updated(env);
            Step::Done
        } else {
            Step::Reply
        }
    }

    // --- Node information send ---

    pub(crate) fn start_node_information_send(
        &mut self,
        env: &mut NmsEnv<'_>,
        destination: NodeId,
        tx_options: u8,
    ) -> Step {
        self.session.pending = Some(PendingOp::NodeInformation);
        self.enter(env, NmState::SendingNodeInfo, None);
        if !env.radio.send_node_information(destination, tx_options) {
            warn!("[NMS] Radio refused to send node information to {}", destination);
            self.reset_state(env);
        }
        Step::Done
    }

    // --- Neighbor update ---

    pub(crate) fn start_neighbor_update(&mut self, env: &mut NmsEnv<'_>, node: NodeId) -> Step {
        self.session.pending_node = node;
        self.session.pending = Some(PendingOp::NeighborUpdate);
        let timeout = env.directory.inclusion_timeout_ms(true);
        self.enter(env, NmState::WaitingForNodeNeighUpdate, Some(timeout));
        env.radio.request_neighbor_update(node);
        Step::Done
    }

    // --- Return routes ---

    pub(crate) fn start_return_route_assign(
        &mut self,
        env: &mut NmsEnv<'_>,
        source: NodeId,
        destination: NodeId,
    ) -> Step {
        self.session.pending_node = source;
        self.session.pending = Some(PendingOp::ReturnRouteAssign);
        self.enter(env, NmState::WaitingForReturnRouteAssign, None);

        let own = env.radio.own_node_id();
        let accepted = if destination == own && env.radio.suc_node_id() == own {
            env.radio.assign_suc_return_route(source)
        } else {
            env.radio.assign_return_route(source, destination)
        };
        if accepted {
            return Step::Done;
        }
        warn!("[NMS] Return route assignment {} -> {} refused", source, destination);
        self.session.pending = None;
        self.session.reply = PendingReply::Frame(return_route_assign_complete(
            self.session.seq,
            TRANSMIT_COMPLETE_FAIL,
        ));
        Step::Reply
    }

    pub(crate) fn start_return_route_delete(&mut self, env: &mut NmsEnv<'_>, node: NodeId) -> Step {
        self.session.pending_node = node;
        self.session.pending = Some(PendingOp::ReturnRouteDelete);
        self.enter(env, NmState::WaitingForReturnRouteDelete, None);
        if env.radio.delete_return_route(node) {
            return Step::Done;
        }
        warn!("[NMS] Return route deletion for {} refused", node);
        self.session.pending = None;
        self.session.reply = PendingReply::Frame(return_route_delete_complete(
            self.session.seq,
            TRANSMIT_COMPLETE_FAIL,
        ));
        Step::Reply
    }

    // --- Default set ---

    pub(crate) fn start_default_set(&mut self, env: &mut NmsEnv<'_>) -> Step {
        warn!("[NMS] Resetting the gateway to factory defaults");
        self.session.pending = Some(PendingOp::SetDefault);
        let timeout = self.config.timeouts.set_default_ms;
        self.enter(env, NmState::SetDefault, Some(timeout));
        env.radio.set_default();
        Step::Done
    }

    // --- Cached node info ---

    pub(crate) fn node_info_cached_get(
        &mut self,
        env: &mut NmsEnv<'_>,
        node: NodeId,
        max_age: u8,
    ) -> Step {
        let own = env.radio.own_node_id();
        let node = if node.is_none() { own } else { node };

        if node != own
            && self.cache_is_stale(env, node, max_age)
            && env.directory.endpoint(node, 0).is_some()
        {
            debug!("[NMS] Cached info of node {} is too old, probing again", node);
            self.session.pending_node = node;
            self.enter(env, NmState::WaitForNodeInfoProbe, None);
            env.directory.probe_lock(true);
            env.directory.register_new_node(node, RegisterFlags::default());
            env.directory.probe_lock(false);
            return Step::Done;
        }
        let frame = self.build_node_info_cached_report(env, node, self.session.seq);
        self.session.reply = PendingReply::Frame(frame);
        Step::Reply
    }

    fn cache_is_stale(&self, env: &NmsEnv<'_>, node: NodeId, max_age: u8) -> bool {
        if max_age == 0 {
            return true;
        }
        if max_age >= MAX_AGE_INFINITE {
            return false;
        }
        let Some(record) = env.directory.node(node) else {
            return false;
        };
        let age_s = (env.now_ms / 1_000).saturating_sub(record.last_update_s);
        age_s > (1u64 << max_age) * 60
    }

    // --- Events ---

    pub(crate) fn maintenance_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match (self.session.state, event) {
            (NmState::NetworkUpdate, NmEvent::NetworkUpdateStatus(status)) => {
                if !self.session.complete(PendingOp::NetworkUpdate) {
                    return Step::Unhandled;
                }
                self.network_update_done(env, *status)
            }

            (NmState::SendingNodeInfo, NmEvent::NodeInformationSent) => {
                if self.session.complete(PendingOp::NodeInformation) {
                    self.reset_state(env);
                }
                Step::Done
            }

            (NmState::WaitingForNodeNeighUpdate, NmEvent::NeighborUpdateStatus(status)) => {
                match *status {
                    REQUEST_NEIGHBOR_UPDATE_STARTED => Step::Done,
                    REQUEST_NEIGHBOR_UPDATE_DONE | REQUEST_NEIGHBOR_UPDATE_FAILED => {
                        if !self.session.complete(PendingOp::NeighborUpdate) {
                            return Step::Unhandled;
                        }
                        self.session.reply =
                            PendingReply::Frame(neighbor_update_status(self.session.seq, *status));
                        Step::Reply
                    }
                    other => {
                        debug!("[NMS] Ignoring neighbor update status {:#04x}", other);
                        Step::Done
                    }
                }
            }
            (NmState::WaitingForNodeNeighUpdate, NmEvent::Timeout) => {
                warn!("[NMS] Neighbor update of node {} timed out", self.session.pending_node);
                self.session.pending = None;
                self.session.reply = PendingReply::Frame(neighbor_update_status(
                    self.session.seq,
                    REQUEST_NEIGHBOR_UPDATE_FAILED,
                ));
                Step::Reply
            }

            (NmState::WaitingForReturnRouteAssign, NmEvent::ReturnRouteStatus(status)) => {
                if !self.session.complete(PendingOp::ReturnRouteAssign) {
                    return Step::Unhandled;
                }
                self.session.reply =
                    PendingReply::Frame(return_route_assign_complete(self.session.seq, *status));
                Step::Reply
            }
            (NmState::WaitingForReturnRouteDelete, NmEvent::ReturnRouteStatus(status)) => {
                if !self.session.complete(PendingOp::ReturnRouteDelete) {
                    return Step::Unhandled;
                }
                self.session.reply =
                    PendingReply::Frame(return_route_delete_complete(self.session.seq, *status));
                Step::Reply
            }

            (NmState::WaitForNodeInfoProbe, NmEvent::NodeProbeDone(node)) => {
                if *node != self.session.pending_node {
                    return Step::Done;
                }
                let frame = self.build_node_info_cached_report(env, *node, self.session.seq);
                self.session.reply = PendingReply::Frame(frame);
                Step::Reply
            }

            (NmState::SetDefault, NmEvent::SetDefaultDone) => {
                if !self.session.complete(PendingOp::SetDefault) {
                    return Step::Unhandled;
                }
                info!("[NMS] Radio reset to default, tearing down the directory");
                self.session.reply =
                    PendingReply::Frame(default_set_complete(self.session.seq, DEFAULT_SET_DONE));
                // The directory answers with MdnsExit; no further timeout applies.
                self.enter(env, NmState::SetDefault, None);
                self.queue.purge_all(env.transport);
                env.directory.exit();
                Step::Done
            }
            (NmState::SetDefault, NmEvent::MdnsExit) => {
                env.host.default_set();
                env.host.bridge_reset();
                env.host.request_reset();
                self.send_reply_when_network_updated(env);
                Step::Done
            }
            (NmState::SetDefault, NmEvent::Timeout) => {
                warn!("[NMS] Set default timed out, soft resetting the radio");
                env.radio.soft_reset();
                self.session.pending = None;
                self.session.reply =
                    PendingReply::Frame(default_set_complete(self.session.seq, DEFAULT_SET_BUSY));
                Step::Reply
            }

            (NmState::WaitingForProbe, NmEvent::NetworkUpdateFlags(flags)) => {
                self.network_update_flags(env, *flags)
            }
            (NmState::WaitingForProbe, NmEvent::Timeout) => {
                warn!(
                    "[NMS] Network update wait timed out with flags {:#04x}",
                    self.session.network_update_flags
                );
                match self.network_update_flags(
                    env,
                    NETWORK_UPDATE_FLAG_DHCPV4 | NETWORK_UPDATE_FLAG_PROBE,
                ) {
                    Step::Reply => Step::Reply,
                    // Nothing re-arms the wait once its timer is gone.
                    _ => {
                        warn!("[NMS] Virtual node bridge still booting, replying anyway");
                        Step::Reply
                    }
                }
            }

            _ => Step::Unhandled,
        }
    }

    /// Accumulates network update flags and replies once DHCP, probing and
    /// the virtual node bridge are all done.
    fn network_update_flags(&mut self, env: &mut NmsEnv<'_>, flags: u8) -> Step {
        let mut current = self.session.network_update_flags | flags;
        if env.host.all_nodes_have_ipv4() || self.config.ipv4_disabled {
            current |= NETWORK_UPDATE_FLAG_DHCPV4;
        }
        if env.host.bridge_ready() {
            current |= NETWORK_UPDATE_FLAG_VIRTUAL;
        }
        self.session.network_update_flags = current;
        debug!("[NMS] Network update flags now {:#04x}", current);
        if current & NETWORK_UPDATE_FLAGS_ALL == NETWORK_UPDATE_FLAGS_ALL {
            Step::Reply
        } else {
            Step::Done
        }
    }
}
