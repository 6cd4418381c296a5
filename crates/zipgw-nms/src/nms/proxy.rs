// crates/zipgw-nms/src/nms/proxy.rs
//! Inclusion on behalf of another controller, and the Network Management
//! Proxy reports answered from the radio and the resource directory.

use super::events::NmEvent;
use super::flags::SubFlags;
use super::state::CommandKind;
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::constants::*;
use crate::frame::report::{
    CachedNodeInfo, failed_node_list_report, multi_channel_aggregated_members_report,
    multi_channel_capability_report, multi_channel_end_point_report, node_info_cached_report,
    node_list_report,
};
use crate::frame::{FailedNodeReplaceStatus, NodeAddStatus, NodeAddVariant, PendingReply};
use crate::hal::{InclusionStep, NmsEnv, NodeMode};
use crate::types::{NodeId, NodeMask};
use alloc::vec::Vec;
use log::{debug, info, warn};

impl NetworkManagement {
    // --- Proxy inclusion ---

    /// Asks `node` for its NIF so that it can be included, or used as the
    /// replacement of a failed node, on behalf of the inclusion controller.
    pub(crate) fn start_proxy(
        &mut self,
        env: &mut NmsEnv<'_>,
        node: NodeId,
        command: CommandKind,
    ) -> Step {
        info!("[NMS] Proxy {:?} of node {} requested", command, node);
        self.use_unsolicited_as_peer(env);
        self.session.pending_node = node;
        self.session.command = command;
        let timeout = self.config.timeouts.proxy_nif_ms;
        self.enter(env, NmState::ProxyInclusionWaitNif, Some(timeout));
        env.radio.request_node_info(node);
        Step::Done
    }

    pub(crate) fn proxy_wait_nif_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match event {
            NmEvent::Timeout => {
                warn!(
                    "[NMS] No NIF from node {}, proxy inclusion failed",
                    self.session.pending_node
                );
                env.host.inclusion_controller_report(InclusionStep::Failed);
                env.host.component_done();
                self.reset_state(env);
                Step::Done
            }
            NmEvent::NodeInfo(info) if info.source == self.session.pending_node => {
                let node = info.source;
                self.session.flags = SubFlags::S2_ADD | SubFlags::PROXY_INCLUSION;
                match self.session.command {
                    CommandKind::FailedNodeReplace => {
                        self.session.reply = PendingReply::FailedNodeReplace(
                            FailedNodeReplaceStatus::new(self.session.seq, node),
                        );
                        self.enter(env, NmState::ReplaceFailedReq, None);
                        self.post_event(env, NmEvent::ReplaceFailedDone(Some(info.clone())));
                    }
                    _ => {
                        self.session.command = CommandKind::NodeAdd;
                        self.session.dsk_valid = false;
                        self.session.reply = PendingReply::NodeAdd(NodeAddStatus::new(
                            self.session.seq,
                            NodeAddVariant::Classic,
                        ));
                        let timeout = self.config.timeouts.add_node_ms;
                        self.enter(env, NmState::NodeFound, Some(timeout));
                        self.post_event(env, NmEvent::AddController(info.clone()));
                        self.post_event(env, NmEvent::AddNodeDone);
                    }
                }
                Step::Done
            }
            NmEvent::NodeInfo(info) => {
                debug!("[NMS] Ignoring NIF of node {} during proxy inclusion", info.source);
                Step::Done
            }
            _ => Step::Unhandled,
        }
    }

    // --- Proxy reports ---

    /// `NODE_LIST_REPORT` of every node in the network except virtual nodes.
    pub(crate) fn build_node_list_report(&self, env: &NmsEnv<'_>, seq: u8) -> Vec<u8> {
        let own = env.radio.own_node_id();
        let suc = env.radio.suc_node_id();
        let capabilities = env.radio.controller_capabilities();

        let mut nodes = env.radio.node_list();
        nodes.subtract(&env.host.virtual_node_mask());

        let (status, controller) = if suc.is_none()
            && capabilities & (CONTROLLER_NODEID_SERVER_PRESENT | CONTROLLER_IS_SECONDARY) == 0
        {
            // Primary controller in a network without a SIS.
            (NODE_LIST_REPORT_LATEST, own)
        } else if suc == own {
            (NODE_LIST_REPORT_LATEST, suc)
        } else {
            (NODE_LIST_REPORT_NO_GUARANTEE, suc)
        };
        node_list_report(seq, status, controller.legacy_byte(), &nodes)
    }

    /// `FAILED_NODE_LIST_REPORT` of failing nodes and of reachable nodes whose
    /// interview failed.
    pub(crate) fn build_failed_node_list_report(&self, env: &NmsEnv<'_>, seq: u8) -> Vec<u8> {
        let own = env.radio.own_node_id();
        let mut failed = NodeMask::new();
        for node in env.directory.node_ids() {
            if node == own {
                continue;
            }
            let Some(record) = env.directory.node(node) else {
                continue;
            };
            if record.failing || (record.probe_failed && record.mode != NodeMode::Mailbox) {
                failed.add(node);
            }
        }
        failed_node_list_report(seq, &failed)
    }

    pub(crate) fn build_node_info_cached_report(
        &self,
        env: &NmsEnv<'_>,
        node: NodeId,
        seq: u8,
    ) -> Vec<u8> {
        let record = if node.is_valid() {
            env.directory.node(node)
        } else {
            None
        };
        let Some(record) = record else {
            debug!("[NMS] No cached info for node {}", node);
            return node_info_cached_report(seq, None);
        };
        let info = CachedNodeInfo {
            status: if record.probe_done {
                NODE_INFO_CACHED_STATUS_OK
            } else {
                NODE_INFO_CACHED_STATUS_NOT_RESPONDING
            },
            age_s: (env.now_ms / 1_000).saturating_sub(record.last_update_s),
            protocol: env.radio.node_protocol_info(node),
            granted_keys: record.security_flags.key_classes(),
            endpoint_info: env
                .directory
                .endpoint(node, 0)
                .map(|ep| ep.info)
                .unwrap_or_default(),
        };
        node_info_cached_report(seq, Some(&info))
    }

    /// `None` when the node is unknown.
    pub(crate) fn build_multi_channel_end_point_report(
        &self,
        env: &NmsEnv<'_>,
        seq: u8,
        node_byte: u8,
        node: NodeId,
    ) -> Option<Vec<u8>> {
        let record = env.directory.node(node)?;
        Some(multi_channel_end_point_report(
            seq,
            node_byte,
            node,
            record.endpoint_count,
            record.aggregated_endpoint_count,
        ))
    }

    pub(crate) fn build_multi_channel_capability_report(
        &self,
        env: &NmsEnv<'_>,
        seq: u8,
        node_byte: u8,
        node: NodeId,
        endpoint: u8,
    ) -> Option<Vec<u8>> {
        let record = env.directory.endpoint(node, endpoint)?;
        Some(multi_channel_capability_report(seq, node_byte, node, &record))
    }

    pub(crate) fn build_multi_channel_aggregated_members_report(
        &self,
        env: &NmsEnv<'_>,
        seq: u8,
        node_byte: u8,
        node: NodeId,
        endpoint: u8,
    ) -> Option<Vec<u8>> {
        let record = env.directory.endpoint(node, endpoint)?;
        Some(multi_channel_aggregated_members_report(
            seq, node_byte, node, &record,
        ))
    }
}
