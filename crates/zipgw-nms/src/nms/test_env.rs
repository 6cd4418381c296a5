// crates/zipgw-nms/src/nms/test_env.rs
//! Recording collaborators for the unit tests of the state machine.

use crate::hal::{
    EndpointRecord, FailedNodeStart, GatewayHost, InclusionStep, NmsEnv, NodeProtocolInfo,
    NodeRecord, NopPurpose, PreInclusionNif, ProvisioningEntry, ProvisioningList,
    RadioLearnMode, RadioTransport, RegisterFlags, ReplyTransport, ResourceDirectory,
    SecurityEngine, ZipAck,
};
use crate::nms::flags::{KeyClasses, SecurityFlags};
use crate::types::{DSK_LEN, Dsk, HomeId, NodeId, NodeMask, Peer};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

pub(crate) const GATEWAY: NodeId = NodeId(1);

pub(crate) fn create_test_peer() -> Peer {
    Peer::new("192.168.0.10:4123".parse().unwrap(), false)
}

pub(crate) fn create_test_dsk(seed: u8) -> Dsk {
    let mut dsk = [0u8; DSK_LEN];
    for (i, byte) in dsk.iter_mut().enumerate() {
        *byte = seed.wrapping_add(i as u8);
    }
    dsk
}

pub(crate) struct TestRadio {
    pub calls: Vec<String>,
    pub failed_start: FailedNodeStart,
    pub suc: NodeId,
    pub protocol: (u8, u8),
    pub info: BTreeMap<u16, NodeProtocolInfo>,
    pub nodes: NodeMask,
    pub routes_accepted: bool,
    pub network_update_started: bool,
    pub nop_accepted: bool,
    pub capabilities: u8,
    pub primary: bool,
    pub home_id: HomeId,
}

impl RadioTransport for TestRadio {
    fn add_node(&mut self, mode: u8) {
        self.calls.push(format!("add_node({mode:#04x})"));
    }
    fn add_node_smart_start(&mut self, mode: u8, dsk_home_id: &[u8]) {
        self.calls
            .push(format!("add_node_smart_start({mode:#04x}, {dsk_home_id:?})"));
    }
    fn remove_node(&mut self, mode: u8) {
        self.calls.push(format!("remove_node({mode:#04x})"));
    }
    fn remove_failed_node(&mut self, node: NodeId) -> FailedNodeStart {
        self.calls.push(format!("remove_failed_node({node})"));
        self.failed_start
    }
    fn replace_failed_node(&mut self, node: NodeId, normal_power: bool) -> FailedNodeStart {
        self.calls
            .push(format!("replace_failed_node({node}, {normal_power})"));
        self.failed_start
    }
    fn request_neighbor_update(&mut self, node: NodeId) {
        self.calls.push(format!("request_neighbor_update({node})"));
    }
    fn assign_return_route(&mut self, source: NodeId, destination: NodeId) -> bool {
        self.calls
            .push(format!("assign_return_route({source}, {destination})"));
        self.routes_accepted
    }
    fn assign_suc_return_route(&mut self, source: NodeId) -> bool {
        self.calls.push(format!("assign_suc_return_route({source})"));
        self.routes_accepted
    }
    fn delete_return_route(&mut self, node: NodeId) -> bool {
        self.calls.push(format!("delete_return_route({node})"));
        self.routes_accepted
    }
    fn set_learn_mode(&mut self, mode: RadioLearnMode) {
        self.calls.push(format!("set_learn_mode({mode:?})"));
    }
    fn explore_request_inclusion(&mut self) {
        self.calls.push("explore_request_inclusion".into());
    }
    fn explore_request_exclusion(&mut self) {
        self.calls.push("explore_request_exclusion".into());
    }
    fn request_node_info(&mut self, node: NodeId) {
        self.calls.push(format!("request_node_info({node})"));
    }
    fn send_nop(&mut self, node: NodeId, purpose: NopPurpose) -> bool {
        self.calls.push(format!("send_nop({node}, {purpose:?})"));
        self.nop_accepted
    }
    fn send_node_information(&mut self, destination: NodeId, tx_options: u8) -> bool {
        self.calls
            .push(format!("send_node_information({destination}, {tx_options:#04x})"));
        true
    }
    fn request_network_update(&mut self) -> bool {
        self.calls.push("request_network_update".into());
        self.network_update_started
    }
    fn set_default(&mut self) {
        self.calls.push("set_default".into());
    }
    fn soft_reset(&mut self) {
        self.calls.push("soft_reset".into());
    }
    fn node_protocol_info(&self, node: NodeId) -> NodeProtocolInfo {
        self.info.get(&node.0).copied().unwrap_or_default()
    }
    fn own_node_id(&self) -> NodeId {
        GATEWAY
    }
    fn suc_node_id(&self) -> NodeId {
        self.suc
    }
    fn home_id(&self) -> HomeId {
        self.home_id
    }
    fn controller_capabilities(&self) -> u8 {
        self.capabilities
    }
    fn is_primary_controller(&self) -> bool {
        self.primary
    }
    fn protocol_version(&self) -> (u8, u8) {
        self.protocol
    }
    fn node_list(&self) -> NodeMask {
        self.nodes.clone()
    }
}

pub(crate) struct TestSecurity {
    pub calls: Vec<String>,
    pub gateway_flags: SecurityFlags,
}

impl SecurityEngine for TestSecurity {
    fn start_s2_add(&mut self, node: NodeId) {
        self.calls.push(format!("start_s2_add({node})"));
    }
    fn start_s0_add(&mut self, node: NodeId, tx_options: u8, is_controller: bool) {
        self.calls
            .push(format!("start_s0_add({node}, {tx_options:#04x}, {is_controller})"));
    }
    fn start_learn(&mut self, node: NodeId) {
        self.calls.push(format!("start_learn({node})"));
    }
    fn key_grant(&mut self, accept: bool, keys: KeyClasses, csa: bool) {
        self.calls
            .push(format!("key_grant({accept}, {:#04x}, {csa})", keys.0));
    }
    fn dsk_accept(&mut self, accept: bool, dsk: &[u8], input_len: u8) {
        self.calls
            .push(format!("dsk_accept({accept}, {}, {input_len})", dsk.len()));
    }
    fn abort_join(&mut self) {
        self.calls.push("abort_join".into());
    }
    fn new_dynamic_ecdh_key(&mut self) {
        self.calls.push("new_dynamic_ecdh_key".into());
    }
    fn reinitialize(&mut self) {
        self.calls.push("reinitialize".into());
    }
    fn clear_network_keys(&mut self, keys: KeyClasses) {
        self.calls.push(format!("clear_network_keys({:#04x})", keys.0));
    }
    fn gateway_flags(&self) -> SecurityFlags {
        self.gateway_flags
    }
    fn public_dsk(&self, add_mode: bool) -> Dsk {
        create_test_dsk(if add_mode { 0xA0 } else { 0x50 })
    }
}

pub(crate) struct TestDirectory {
    pub calls: Vec<String>,
    pub nodes: BTreeMap<u16, NodeRecord>,
    pub endpoints: BTreeMap<(u16, u8), EndpointRecord>,
    pub inclusion_controllers: Vec<NodeId>,
    pub new_probes: usize,
    pub s2_estimate_ms: u64,
}

impl ResourceDirectory for TestDirectory {
    fn node_exists(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node.0)
    }
    fn node(&self, node: NodeId) -> Option<NodeRecord> {
        self.nodes.get(&node.0).cloned()
    }
    fn endpoint(&self, node: NodeId, endpoint: u8) -> Option<EndpointRecord> {
        self.endpoints.get(&(node.0, endpoint)).cloned()
    }
    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().map(|id| NodeId(*id)).collect()
    }
    fn security_flags(&self, node: NodeId) -> SecurityFlags {
        self.nodes
            .get(&node.0)
            .map(|r| r.security_flags)
            .unwrap_or_default()
    }
    fn set_security_flags(&mut self, node: NodeId, flags: SecurityFlags) {
        self.calls
            .push(format!("set_security_flags({node}, {:#04x})", flags.0));
        if let Some(record) = self.nodes.get_mut(&node.0) {
            record.security_flags = flags;
        }
    }
    fn register_new_node(&mut self, node: NodeId, flags: RegisterFlags) {
        self.calls
            .push(format!("register_new_node({node}, {:#04x})", flags.0));
        self.nodes.entry(node.0).or_insert_with(|| NodeRecord {
            node,
            ..Default::default()
        });
    }
    fn add_dsk(&mut self, node: NodeId, dsk: &[u8]) {
        self.calls.push(format!("add_dsk({node}, {})", dsk.len()));
    }
    fn set_failing(&mut self, node: NodeId, failing: bool) {
        self.calls.push(format!("set_failing({node}, {failing})"));
    }
    fn probe_lock(&mut self, locked: bool) {
        self.calls.push(format!("probe_lock({locked})"));
    }
    fn probe_cancel(&mut self) {
        self.calls.push("probe_cancel".into());
    }
    fn probe_new_nodes(&mut self) -> usize {
        self.calls.push("probe_new_nodes".into());
        self.new_probes
    }
    fn supports_command_class(&self, node: NodeId, class: u8) -> bool {
        class == crate::frame::constants::COMMAND_CLASS_INCLUSION_CONTROLLER
            && self.inclusion_controllers.contains(&node)
    }
    fn inclusion_timeout_ms(&self, is_controller: bool) -> u64 {
        if is_controller { 80_000 } else { 76_000 }
    }
    fn s2_inclusion_estimate_ms(&self) -> u64 {
        self.s2_estimate_ms
    }
    fn exit(&mut self) {
        self.calls.push("exit".into());
    }
}

#[derive(Default)]
pub(crate) struct TestProvisioning {
    pub entries: Vec<ProvisioningEntry>,
}

impl ProvisioningList for TestProvisioning {
    fn by_home_id(&self, home_id: &HomeId) -> Option<ProvisioningEntry> {
        self.entries
            .iter()
            .find(|e| e.dsk.get(8..12) == Some(&home_id.0[..]))
            .cloned()
    }
    fn by_dsk(&self, dsk: &[u8]) -> Option<ProvisioningEntry> {
        self.entries.iter().find(|e| e.dsk == dsk).cloned()
    }
    fn match_challenge(&self, public_key: &[u8]) -> Option<ProvisioningEntry> {
        self.entries
            .iter()
            .find(|e| e.dsk.len() == DSK_LEN && e.dsk.get(2..) == public_key.get(2..DSK_LEN))
            .cloned()
    }
    fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == crate::hal::ProvisioningStatus::Pending)
            .count()
    }
    fn build_report(&self, entry: &ProvisioningEntry, seq: u8) -> Vec<u8> {
        let mut frame = vec![0x78, 0x03, seq];
        frame.extend_from_slice(&entry.dsk);
        frame
    }
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: Vec<(Peer, Vec<u8>)>,
    pub acks: Vec<(Peer, ZipAck)>,
}

impl ReplyTransport for RecordingTransport {
    fn send(&mut self, to: &Peer, frame: &[u8]) {
        self.sent.push((*to, frame.to_vec()));
    }
    fn send_ack(&mut self, to: &Peer, ack: ZipAck) {
        self.acks.push((*to, ack));
    }
}

pub(crate) struct TestHost {
    pub calls: Vec<String>,
    pub virtual_nodes: Vec<NodeId>,
    pub ipv4_assigned: bool,
    pub all_have_ipv4: bool,
    pub bridge_ready: bool,
    pub mailbox_active: NodeId,
    pub random: u8,
}

impl GatewayHost for TestHost {
    fn is_virtual_node(&self, node: NodeId) -> bool {
        self.virtual_nodes.contains(&node)
    }
    fn virtual_node_mask(&self) -> NodeMask {
        let mut mask = NodeMask::new();
        for node in &self.virtual_nodes {
            mask.add(*node);
        }
        mask
    }
    fn ipv4_address_assigned(&self, _node: NodeId) -> bool {
        self.ipv4_assigned
    }
    fn all_nodes_have_ipv4(&self) -> bool {
        self.all_have_ipv4
    }
    fn bridge_ready(&self) -> bool {
        self.bridge_ready
    }
    fn home_id(&self) -> HomeId {
        HomeId([0xC0, 0xFF, 0xEE, 0x01])
    }
    fn node_added(&mut self, node: NodeId) {
        self.calls.push(format!("node_added({node})"));
    }
    fn node_deleted(&mut self, node: NodeId) {
        self.calls.push(format!("node_deleted({node})"));
    }
    fn put_node_to_sleep_later(&mut self, node: NodeId) {
        self.calls.push(format!("put_node_to_sleep_later({node})"));
    }
    fn mailbox_active_node(&self) -> NodeId {
        self.mailbox_active
    }
    fn mailbox_wakeup(&mut self, node: NodeId) {
        self.calls.push(format!("mailbox_wakeup({node})"));
    }
    fn mailbox_abort_sending(&mut self) {
        self.calls.push("mailbox_abort_sending".into());
    }
    fn request_inclusion_handover(&mut self, node: NodeId, replace: bool) {
        self.calls
            .push(format!("request_inclusion_handover({node}, {replace})"));
    }
    fn inclusion_controller_you_do_it(&mut self, node: NodeId) {
        self.calls.push(format!("inclusion_controller_you_do_it({node})"));
    }
    fn inclusion_controller_report(&mut self, step: InclusionStep) {
        self.calls.push(format!("inclusion_controller_report({step:?})"));
    }
    fn set_pre_inclusion_nif(&mut self, nif: PreInclusionNif) {
        self.calls.push(format!("set_pre_inclusion_nif({nif:?})"));
    }
    fn restore_nif(&mut self) {
        self.calls.push("restore_nif".into());
    }
    fn network_left(&mut self) {
        self.calls.push("network_left".into());
    }
    fn network_joined(&mut self, node: NodeId, includer: Option<NodeId>) {
        self.calls.push(format!("network_joined({node}, {includer:?})"));
    }
    fn network_replicated(&mut self) {
        self.calls.push("network_replicated".into());
    }
    fn default_set(&mut self) {
        self.calls.push("default_set".into());
    }
    fn bridge_reset(&mut self) {
        self.calls.push("bridge_reset".into());
    }
    fn request_reset(&mut self) {
        self.calls.push("request_reset".into());
    }
    fn network_management_done(&mut self) {
        self.calls.push("network_management_done".into());
    }
    fn component_done(&mut self) {
        self.calls.push("component_done".into());
    }
    fn random_u8(&mut self) -> u8 {
        self.random
    }
}

/// A full set of recording collaborators and a virtual clock.
pub(crate) struct TestEnv {
    pub now_ms: u64,
    pub radio: TestRadio,
    pub security: TestSecurity,
    pub directory: TestDirectory,
    pub provisioning: TestProvisioning,
    pub transport: RecordingTransport,
    pub host: TestHost,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            radio: TestRadio {
                calls: Vec::new(),
                failed_start: FailedNodeStart::Started,
                suc: GATEWAY,
                protocol: (7, 18),
                info: BTreeMap::new(),
                nodes: NodeMask::new(),
                routes_accepted: true,
                network_update_started: false,
                nop_accepted: true,
                capabilities: crate::frame::constants::CONTROLLER_NODEID_SERVER_PRESENT,
                primary: true,
                home_id: HomeId([0xC0, 0xFF, 0xEE, 0x01]),
            },
            security: TestSecurity {
                calls: Vec::new(),
                gateway_flags: SecurityFlags::SECURITY0 | SecurityFlags::SECURITY2,
            },
            directory: TestDirectory {
                calls: Vec::new(),
                nodes: BTreeMap::new(),
                endpoints: BTreeMap::new(),
                inclusion_controllers: Vec::new(),
                new_probes: 0,
                s2_estimate_ms: 30_000,
            },
            provisioning: TestProvisioning::default(),
            transport: RecordingTransport::default(),
            host: TestHost {
                calls: Vec::new(),
                virtual_nodes: Vec::new(),
                ipv4_assigned: true,
                all_have_ipv4: true,
                bridge_ready: true,
                mailbox_active: NodeId::NONE,
                random: 0x42,
            },
        }
    }

    pub fn env(&mut self) -> NmsEnv<'_> {
        NmsEnv {
            now_ms: self.now_ms,
            radio: &mut self.radio,
            security: &mut self.security,
            directory: &mut self.directory,
            provisioning: &self.provisioning,
            transport: &mut self.transport,
            host: &mut self.host,
        }
    }

    /// Frames sent so far, without the peer.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.transport.sent.iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn last_frame(&self) -> Option<&[u8]> {
        self.transport.sent.last().map(|(_, f)| f.as_slice())
    }
}
