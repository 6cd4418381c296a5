// crates/zipgw-nms/src/nms/inclusion.rs
//! Classic, S2 and SmartStart inclusion: from add mode to the final
//! `NODE_ADD_STATUS`.
//!
//! All three entry points meet in `NodeFound`. After the protocol part of the
//! add is done, the security bootstrap runs in `WaitForSecureAdd` (see
//! `security.rs`), then the node is interviewed and given an address before
//! the reply goes out.

use super::events::{LearnInfo, NmEvent};
use super::flags::{SecurityFlags, SubFlags};
use super::state::{CommandKind, PendingOp};
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::constants::*;
use crate::frame::reply::{SecuritySection, smart_start_join_started, with_ip_association};
use crate::frame::{NodeAddStatus, NodeAddVariant, PendingReply};
use crate::hal::{BootMode, NmsEnv, NodeMode, ProvisioningStatus, RegisterFlags};
use crate::types::{DSK_LEN, HomeId};
use log::{debug, error, info, trace, warn};

/// First radio protocol version able to skip FLiRS neighbor discovery.
const SFLND_MIN_PROTOCOL: (u8, u8) = (7, 19);

/// S2 bootstraps estimated to run longer than this risk the joining node
/// timing out, so FLiRS neighbor discovery is postponed.
const SFLND_S2_ESTIMATE_MS: u64 = 60_000;

/// Returns the skip-FLiRS add option when the radio supports it and the S2
/// bootstrap is expected to be slow.
pub(crate) fn skip_flirs_option(env: &NmsEnv<'_>) -> u8 {
    if env.radio.protocol_version() >= SFLND_MIN_PROTOCOL
        && env.directory.s2_inclusion_estimate_ms() > SFLND_S2_ESTIMATE_MS
    {
        ADD_NODE_OPTION_SFLND
    } else {
        0
    }
}

impl NetworkManagement {
    // --- Entry points ---

    pub(crate) fn start_node_add(&mut self, env: &mut NmsEnv<'_>, mode: u8, s2: bool) -> Step {
        info!("[NMS] Starting node add, mode {:#04x}, s2={}", mode, s2);
        env.radio.add_node(mode);
        self.session.command = CommandKind::NodeAdd;
        self.session.reply = PendingReply::NodeAdd(NodeAddStatus::new(
            self.session.seq,
            NodeAddVariant::Classic,
        ));
        self.session.dsk_valid = false;
        if s2 {
            self.session.flags = SubFlags::S2_ADD;
        }
        self.session.pending = Some(PendingOp::AddNode);
        let timeout = self.config.timeouts.add_node_ms;
        self.enter(env, NmState::WaitingForAdd, Some(timeout));
        Step::Done
    }

    /// Starts the inclusion of a provisioned node that announced itself.
    pub(crate) fn start_smart_start_add(
        &mut self,
        env: &mut NmsEnv<'_>,
        home_id: &HomeId,
        options: u8,
    ) -> Step {
        let Some(entry) = env.provisioning.by_home_id(home_id) else {
            warn!(
                "[NMS] SmartStart join from home id {} is not provisioned, ignoring",
                home_id
            );
            return Step::Done;
        };
        if entry.status != ProvisioningStatus::Pending {
            info!(
                "[NMS] SmartStart entry for home id {} is {:?}, not including",
                home_id, entry.status
            );
            return Step::Done;
        }
        let Some(dsk_home_id) = entry.dsk.get(8..12) else {
            error!(
                "[NMS] Provisioning entry for home id {} has a short DSK ({} bytes)",
                home_id,
                entry.dsk.len()
            );
            return Step::Done;
        };

        self.use_unsolicited_as_peer(env);
        env.radio
            .add_node_smart_start(ADD_NODE_HOME_ID | options, dsk_home_id);

        let variant = if entry.boot_mode == BootMode::LongRange {
            NodeAddVariant::Extended
        } else {
            NodeAddVariant::Classic
        };
        self.session.command = CommandKind::NodeAdd;
        self.session.reply = PendingReply::NodeAdd(NodeAddStatus::new(self.session.seq, variant));
        self.session.flags = SubFlags::S2_ADD | SubFlags::SMART_START;
        self.session.pending = Some(PendingOp::AddNode);
        let timeout = self.config.timeouts.add_node_ms;
        self.enter(env, NmState::WaitingForAdd, Some(timeout));

        let report = smart_start_join_started(self.session.seq, &entry.dsk);
        self.send_to_unsolicited(env, &report);

        let len = entry.dsk.len().min(DSK_LEN);
        self.session.just_included_dsk = [0; DSK_LEN];
        self.session.just_included_dsk[..len].copy_from_slice(&entry.dsk[..len]);
        self.session.dsk_valid = false;
        Step::Done
    }

    // --- Transitions ---

    pub(crate) fn inclusion_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match (self.session.state, event) {
            (NmState::WaitingForAdd, NmEvent::AddNodeFound) => {
                let timeout = self.config.timeouts.add_node_ms;
                self.enter(env, NmState::NodeFound, Some(timeout));
                Step::Done
            }
            (NmState::WaitingForAdd, NmEvent::AddNodeLearnReady) => {
                trace!("[NMS] Radio is in add mode");
                Step::Done
            }
            (NmState::WaitingForAdd, NmEvent::NodeAddStop | NmEvent::Timeout) => {
                self.fail_add(env, ADD_NODE_STOP)
            }

            (NmState::NodeFound, NmEvent::AddEndNode(info)) => self.node_found(env, info, false),
            (NmState::NodeFound, NmEvent::AddController(info)) => self.node_found(env, info, true),
            (NmState::NodeFound, NmEvent::AddFailed | NmEvent::Timeout) => {
                let step = self.fail_add(env, ADD_NODE_STOP_FAILED);
                env.directory.probe_lock(false);
                step
            }

            (NmState::WaitForProtocol, NmEvent::AddProtocolDone) => {
                env.radio.add_node(ADD_NODE_STOP);
                Step::Done
            }
            (NmState::WaitForProtocol, NmEvent::AddSflndDone) => {
                debug!("[NMS] Radio skipped FLiRS neighbor discovery, doing it after security");
                self.session.delay_neighbor_update = true;
                Step::Done
            }
            (NmState::WaitForProtocol, NmEvent::AddNodeDone) => self.protocol_add_done(env),
            (
                NmState::WaitForProtocol,
                NmEvent::Timeout | NmEvent::AddFailed | NmEvent::AddNotPrimary,
            ) => {
                let step = self.fail_add(env, ADD_NODE_STOP_FAILED);
                env.directory.probe_lock(false);
                step
            }

            (NmState::PrepareSucInclusion, NmEvent::Timeout) => {
                let node = self.session.pending_node;
                let replace = self.session.command == CommandKind::FailedNodeReplace;
                info!("[NMS] Handing inclusion of node {} over to the SUC", node);
                self.enter(env, NmState::WaitForSucInclusion, None);
                env.host.request_inclusion_handover(node, replace);
                Step::Done
            }
            (NmState::WaitForSucInclusion, NmEvent::ProxyComplete) => {
                self.enter(env, NmState::WaitForSecureAdd, None);
                let flags = SecurityFlags(
                    (SecurityFlags::SECURITY0.0 | SecurityFlags::SECURITY2.0)
                        & env.security.gateway_flags().0,
                );
                self.post_event(env, NmEvent::SecurityDone(flags));
                Step::Done
            }

            (NmState::WaitForNeighborUpdateAfterSecureAdd, NmEvent::NeighborUpdateStatus(status)) => {
                match *status {
                    REQUEST_NEIGHBOR_UPDATE_DONE | REQUEST_NEIGHBOR_UPDATE_FAILED
                        if self
                            .session
                            .complete(PendingOp::NeighborUpdateAfterSecureAdd) =>
                    {
                        self.neighbor_update_after_add_done(env);
                    }
                    _ => trace!("[NMS] Neighbor update status {:#04x}", status),
                }
                Step::Done
            }
            (NmState::WaitForNeighborUpdateAfterSecureAdd, NmEvent::Timeout) => {
                self.session.pending = None;
                self.neighbor_update_after_add_done(env);
                Step::Done
            }

            (NmState::WaitForProbeAfterAdd, NmEvent::NodeProbeDone(node)) => {
                if *node != self.session.pending_node {
                    trace!("[NMS] Probe of node {} is not the one being added", node);
                    return Step::Done;
                }
                self.probe_done_after_add(env)
            }

            (NmState::WaitDhcp, NmEvent::DhcpDone(node)) if *node == self.session.pending_node => {
                self.sleep_mailbox_node(env);
                Step::Reply
            }
            (NmState::WaitDhcp, NmEvent::Timeout) => {
                debug!("[NMS] No address for node {} yet, replying anyway", self.session.pending_node);
                self.sleep_mailbox_node(env);
                Step::Reply
            }

            _ => Step::Unhandled,
        }
    }

    /// Common failure exit of the add states: stops the radio with `radio_mode`
    /// and prepares the short failed status.
    fn fail_add(&mut self, env: &mut NmsEnv<'_>, radio_mode: u8) -> Step {
        if let PendingReply::NodeAdd(reply) = &mut self.session.reply {
            reply.status = NODE_ADD_STATUS_FAILED;
            reply.clear_node_info();
        }
        env.radio.add_node(radio_mode);
        Step::Reply
    }

    fn node_found(&mut self, env: &mut NmsEnv<'_>, info: &LearnInfo, is_controller: bool) -> Step {
        let source = info.source;
        if !info.nif.is_empty() && !source.is_none() && !env.host.is_virtual_node(source) {
            let timeout = env.directory.inclusion_timeout_ms(is_controller);
            self.session.pending_node = source;
            if let PendingReply::NodeAdd(reply) = &mut self.session.reply {
                reply.node = source;
                reply.set_node_info_frame(&info.nif);
            }
            debug!(
                "[NMS] Found {} {} ({} byte NIF)",
                if is_controller { "controller" } else { "end node" },
                source,
                info.nif.len()
            );
            self.enter(env, NmState::WaitForProtocol, Some(timeout));
        } else {
            if env.host.is_virtual_node(source) {
                error!("[NMS] Node id {} offered for inclusion is a virtual node", source);
            }
            self.post_event(env, NmEvent::AddFailed);
        }
        if self.session.flags.is_smart_start() {
            self.newly_included_smart_start = self.session.pending_node;
        }
        Step::Done
    }

    /// The radio finished the protocol part of the add. Decides which
    /// security bootstrap, if any, the node gets.
    fn protocol_add_done(&mut self, env: &mut NmsEnv<'_>) -> Step {
        let node = self.session.pending_node;
        env.radio.add_node(ADD_NODE_STOP);

        let protocol = env.radio.node_protocol_info(node);
        if let PendingReply::NodeAdd(reply) = &mut self.session.reply {
            reply.capability = protocol.capability;
            reply.security = protocol.security;
        }
        let timeout = self.config.timeouts.secure_add_ms;
        self.enter(env, NmState::WaitForSecureAdd, Some(timeout));

        if env.directory.node_exists(node) && !self.session.flags.is_proxy_inclusion() {
            warn!("[NMS] Node {} has already been included", node);
            self.session.dsk_valid = false;
            let flags = env.directory.security_flags(node);
            self.post_event(env, NmEvent::SecurityDone(flags));
            self.post_event(env, NmEvent::NodeProbeDone(node));
            return Step::Done;
        }

        env.directory.probe_lock(true);
        if self.suc_takes_over_inclusion(env) {
            return Step::Done;
        }

        env.directory
            .register_new_node(node, RegisterFlags::JUST_ADDED | RegisterFlags::ADDED_BY_ME);
        env.host.node_added(node);

        let gateway = env.security.gateway_flags();
        if self.session.flags.is_s2_add()
            && gateway.has_any_s2()
            && (self.reply_nif_supports(COMMAND_CLASS_SECURITY_2)
                || self.session.flags.is_smart_start())
        {
            info!("[NMS] Starting S2 bootstrap of node {}", node);
            env.security.start_s2_add(node);
            return Step::Done;
        }

        if gateway.contains(SecurityFlags::SECURITY0)
            && self.reply_nif_supports(COMMAND_CLASS_SECURITY)
        {
            if self.session.flags.is_proxy_inclusion() {
                env.host.inclusion_controller_you_do_it(node);
            } else if !self.session.flags.is_smart_start() {
                info!("[NMS] Starting S0 bootstrap of node {}", node);
                env.security
                    .start_s0_add(node, self.session.tx_options, protocol.is_controller());
            }
            return Step::Done;
        }

        self.post_event(env, NmEvent::SecurityDone(SecurityFlags::empty()));
        Step::Done
    }

    /// If another SUC can include nodes itself, registers the new node and
    /// prepares the hand-over. Returns true when the hand-over was prepared.
    pub(crate) fn suc_takes_over_inclusion(&mut self, env: &mut NmsEnv<'_>) -> bool {
        let suc = env.radio.suc_node_id();
        if suc.is_none()
            || suc == env.radio.own_node_id()
            || !env
                .directory
                .supports_command_class(suc, COMMAND_CLASS_INCLUSION_CONTROLLER)
        {
            return false;
        }
        let node = self.session.pending_node;
        env.directory
            .register_new_node(node, RegisterFlags::JUST_ADDED);
        env.host.node_added(node);
        let timeout = self.config.timeouts.prepare_suc_ms;
        self.enter(env, NmState::PrepareSucInclusion, Some(timeout));
        true
    }

    fn reply_nif_supports(&self, class: u8) -> bool {
        match &self.session.reply {
            PendingReply::NodeAdd(reply) => reply.command_classes.contains(&class),
            _ => false,
        }
    }

    fn neighbor_update_after_add_done(&mut self, env: &mut NmsEnv<'_>) {
        debug!("[NMS] Delayed neighbor discovery after secure add finished");
        self.enter(env, NmState::WaitForProbeAfterAdd, None);
        env.directory.probe_lock(false);
    }

    /// The interview of the new node finished. Completes the reply with the
    /// interview result and waits for the node's IPv4 address.
    fn probe_done_after_add(&mut self, env: &mut NmsEnv<'_>) -> Step {
        let node = self.session.pending_node;
        let record = env.directory.node(node).unwrap_or_default();
        let granted = record.security_flags.key_classes();
        let kex_fail_type = self.session.inclusion_flags.kex_fail_type();
        self.session.inclusion_flags = SecurityFlags::empty();

        match &mut self.session.reply {
            PendingReply::NodeAdd(reply) => {
                let endpoint = env
                    .directory
                    .endpoint(node, 0)
                    .filter(|ep| ep.probe_done && ep.info.len() >= 2);
                match endpoint {
                    Some(ep) => {
                        reply.device_class = [record.node_type, ep.info[0], ep.info[1]];
                        reply.command_classes = with_ip_association(&ep.info[2..]);
                    }
                    None => {
                        debug!("[NMS] Interview of node {} failed, reporting no command classes", node);
                        reply.command_classes.clear();
                    }
                }
                reply.device_class_len = 3;
                reply.has_node_info = true;
                reply.security_section = Some(SecuritySection {
                    granted_keys: granted,
                    kex_fail_type,
                });
                reply.dsk = Some(
                    self.session
                        .flags
                        .contains(SubFlags::REPORT_DSK)
                        .then_some(self.session.just_included_dsk),
                );
            }
            PendingReply::FailedNodeReplace(reply) => {
                reply.granted_keys = granted;
                reply.kex_fail_type = kex_fail_type;
            }
            _ => {}
        }

        if self.config.ipv4_disabled || env.host.ipv4_address_assigned(node) {
            self.enter(env, NmState::WaitDhcp, None);
            self.sleep_mailbox_node(env);
            return Step::Reply;
        }
        let timeout = self.config.timeouts.dhcp_ms;
        self.enter(env, NmState::WaitDhcp, Some(timeout));
        Step::Done
    }

    fn sleep_mailbox_node(&mut self, env: &mut NmsEnv<'_>) {
        let node = self.session.pending_node;
        if self.config.mailbox_enabled
            && env
                .directory
                .node(node)
                .is_some_and(|r| r.mode == NodeMode::Mailbox)
        {
            env.host.put_node_to_sleep_later(node);
        }
    }
}
