// crates/zipgw-nms/tests/simulator/mocks.rs
//! Scriptable collaborators. Every call is recorded as a string so scenarios
//! can assert on the exact sequence the state machine produced.

use std::collections::BTreeMap;
use zipgw_nms::hal::{
    EndpointRecord, FailedNodeStart, GatewayHost, InclusionStep, NodeProtocolInfo, NodeRecord,
    NopPurpose, PreInclusionNif, ProvisioningEntry, ProvisioningList, RadioLearnMode,
    RadioTransport, RegisterFlags, ReplyTransport, ResourceDirectory, SecurityEngine, ZipAck,
};
use zipgw_nms::{Dsk, HomeId, KeyClasses, NodeId, NodeMask, Peer, SecurityFlags};

pub const GATEWAY_NODE: NodeId = NodeId(1);
pub const GATEWAY_HOME_ID: HomeId = HomeId([0xCA, 0xFE, 0x00, 0x01]);

pub struct SimRadio {
    pub calls: Vec<String>,
    pub failed_start: FailedNodeStart,
    pub suc: NodeId,
    pub protocol_version: (u8, u8),
    pub protocol_info: BTreeMap<u16, NodeProtocolInfo>,
    pub nodes: NodeMask,
    pub accept_routes: bool,
    pub start_network_update: bool,
    pub capabilities: u8,
}

impl Default for SimRadio {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failed_start: FailedNodeStart::Started,
            suc: GATEWAY_NODE,
            protocol_version: (7, 18),
            protocol_info: BTreeMap::new(),
            nodes: NodeMask::new(),
            accept_routes: true,
            start_network_update: false,
            // SIS present.
            capabilities: 0x04,
        }
    }
}

impl RadioTransport for SimRadio {
    fn add_node(&mut self, mode: u8) {
        self.calls.push(format!("add_node({mode:#04x})"));
    }
    fn add_node_smart_start(&mut self, mode: u8, dsk_home_id: &[u8]) {
        self.calls
            .push(format!("add_node_smart_start({mode:#04x}, {dsk_home_id:02X?})"));
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
        self.accept_routes
    }
    fn assign_suc_return_route(&mut self, source: NodeId) -> bool {
        self.calls.push(format!("assign_suc_return_route({source})"));
        self.accept_routes
    }
    fn delete_return_route(&mut self, node: NodeId) -> bool {
        self.calls.push(format!("delete_return_route({node})"));
        self.accept_routes
    }
    fn set_learn_mode(&mut self, mode: RadioLearnMode) {
        self.calls.push(format!("set_learn_mode({mode:?})"));
    }
    fn explore_request_inclusion(&mut self) {
        self.calls.push("explore_request_inclusion".to_string());
    }
    fn explore_request_exclusion(&mut self) {
        self.calls.push("explore_request_exclusion".to_string());
    }
    fn request_node_info(&mut self, node: NodeId) {
        self.calls.push(format!("request_node_info({node})"));
    }
    fn send_nop(&mut self, node: NodeId, purpose: NopPurpose) -> bool {
        self.calls.push(format!("send_nop({node}, {purpose:?})"));
        true
    }
    fn send_node_information(&mut self, destination: NodeId, tx_options: u8) -> bool {
        self.calls
            .push(format!("send_node_information({destination}, {tx_options:#04x})"));
        true
    }
    fn request_network_update(&mut self) -> bool {
        self.calls.push("request_network_update".to_string());
        self.start_network_update
    }
    fn set_default(&mut self) {
        self.calls.push("set_default".to_string());
    }
    fn soft_reset(&mut self) {
        self.calls.push("soft_reset".to_string());
    }
    fn node_protocol_info(&self, node: NodeId) -> NodeProtocolInfo {
        self.protocol_info.get(&node.0).copied().unwrap_or_default()
    }
    fn own_node_id(&self) -> NodeId {
        GATEWAY_NODE
    }
    fn suc_node_id(&self) -> NodeId {
        self.suc
    }
    fn home_id(&self) -> HomeId {
        GATEWAY_HOME_ID
    }
    fn controller_capabilities(&self) -> u8 {
        self.capabilities
    }
    fn is_primary_controller(&self) -> bool {
        true
    }
    fn protocol_version(&self) -> (u8, u8) {
        self.protocol_version
    }
    fn node_list(&self) -> NodeMask {
        self.nodes.clone()
    }
}

pub struct SimSecurity {
    pub calls: Vec<String>,
    pub gateway_flags: SecurityFlags,
    pub dsk: Dsk,
}

impl Default for SimSecurity {
    fn default() -> Self {
        let mut dsk = [0u8; 16];
        for (i, byte) in dsk.iter_mut().enumerate() {
            *byte = 0xD0 + i as u8;
        }
        Self {
            calls: Vec::new(),
            gateway_flags: SecurityFlags::SECURITY0 | SecurityFlags::SECURITY2,
            dsk,
        }
    }
}

impl SecurityEngine for SimSecurity {
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
            .push(format!("dsk_accept({accept}, {dsk:02X?}, {input_len})"));
    }
    fn abort_join(&mut self) {
        self.calls.push("abort_join".to_string());
    }
    fn new_dynamic_ecdh_key(&mut self) {
        self.calls.push("new_dynamic_ecdh_key".to_string());
    }
    fn reinitialize(&mut self) {
        self.calls.push("reinitialize".to_string());
    }
    fn clear_network_keys(&mut self, keys: KeyClasses) {
        self.calls.push(format!("clear_network_keys({:#04x})", keys.0));
    }
    fn gateway_flags(&self) -> SecurityFlags {
        self.gateway_flags
    }
    fn public_dsk(&self, _add_mode: bool) -> Dsk {
        self.dsk
    }
}

pub struct SimDirectory {
    pub calls: Vec<String>,
    pub nodes: BTreeMap<u16, NodeRecord>,
    pub endpoints: BTreeMap<(u16, u8), EndpointRecord>,
    pub new_probes: usize,
}

impl Default for SimDirectory {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            GATEWAY_NODE.0,
            NodeRecord {
                node: GATEWAY_NODE,
                node_type: 0x02,
                probe_done: true,
                ..Default::default()
            },
        );
        Self {
            calls: Vec::new(),
            nodes,
            endpoints: BTreeMap::new(),
            new_probes: 0,
        }
    }
}

impl SimDirectory {
    /// Records a finished interview of `node` with the given endpoint 0 info.
    pub fn complete_interview(&mut self, node: NodeId, node_type: u8, info: &[u8]) {
        let record = self.nodes.entry(node.0).or_insert_with(|| NodeRecord {
            node,
            ..Default::default()
        });
        record.node_type = node_type;
        record.probe_done = true;
        self.endpoints.insert(
            (node.0, 0),
            EndpointRecord {
                endpoint: 0,
                info: info.to_vec(),
                probe_done: true,
                aggregated_members: Vec::new(),
            },
        );
    }
}

impl ResourceDirectory for SimDirectory {
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
        self.calls.push(format!("add_dsk({node}, {dsk:02X?})"));
    }
    fn set_failing(&mut self, node: NodeId, failing: bool) {
        self.calls.push(format!("set_failing({node}, {failing})"));
    }
    fn probe_lock(&mut self, locked: bool) {
        self.calls.push(format!("probe_lock({locked})"));
    }
    fn probe_cancel(&mut self) {
        self.calls.push("probe_cancel".to_string());
    }
    fn probe_new_nodes(&mut self) -> usize {
        self.calls.push("probe_new_nodes".to_string());
        self.new_probes
    }
    fn supports_command_class(&self, _node: NodeId, _class: u8) -> bool {
        false
    }
    fn inclusion_timeout_ms(&self, is_controller: bool) -> u64 {
        if is_controller { 76_732 } else { 76_000 }
    }
    fn s2_inclusion_estimate_ms(&self) -> u64 {
        20_000
    }
    fn exit(&mut self) {
        self.calls.push("exit".to_string());
    }
}

#[derive(Default)]
pub struct SimProvisioning {
    pub entries: Vec<ProvisioningEntry>,
}

impl ProvisioningList for SimProvisioning {
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
            .find(|e| e.dsk.len() == 16 && e.dsk.get(2..) == public_key.get(2..16))
            .cloned()
    }
    fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == zipgw_nms::hal::ProvisioningStatus::Pending)
            .count()
    }
    fn build_report(&self, entry: &ProvisioningEntry, seq: u8) -> Vec<u8> {
        let mut frame = vec![0x78, 0x03, seq, 0, entry.dsk.len() as u8];
        frame.extend_from_slice(&entry.dsk);
        frame
    }
}

#[derive(Default)]
pub struct SimTransport {
    pub sent: Vec<(Peer, Vec<u8>)>,
    pub acks: Vec<(Peer, ZipAck)>,
}

impl ReplyTransport for SimTransport {
    fn send(&mut self, to: &Peer, frame: &[u8]) {
        log::debug!("[Sim] -> {}: {:02X?}", to.remote, frame);
        self.sent.push((*to, frame.to_vec()));
    }
    fn send_ack(&mut self, to: &Peer, ack: ZipAck) {
        self.acks.push((*to, ack));
    }
}

pub struct SimHost {
    pub calls: Vec<String>,
    pub virtual_nodes: Vec<NodeId>,
    pub ipv4_assigned: bool,
    pub bridge_ready: bool,
    pub mailbox_active: NodeId,
    pub next_random: u8,
}

impl Default for SimHost {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            virtual_nodes: Vec::new(),
            ipv4_assigned: true,
            bridge_ready: true,
            mailbox_active: NodeId::NONE,
            next_random: 0x30,
        }
    }
}

impl GatewayHost for SimHost {
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
        self.ipv4_assigned
    }
    fn bridge_ready(&self) -> bool {
        self.bridge_ready
    }
    fn home_id(&self) -> HomeId {
        GATEWAY_HOME_ID
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
    fn mailbox_abort_sending(&mut self) {}
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
        self.calls.push("restore_nif".to_string());
    }
    fn network_left(&mut self) {
        self.calls.push("network_left".to_string());
    }
    fn network_joined(&mut self, node: NodeId, includer: Option<NodeId>) {
        self.calls.push(format!("network_joined({node}, {includer:?})"));
    }
    fn network_replicated(&mut self) {
        self.calls.push("network_replicated".to_string());
    }
    fn default_set(&mut self) {
        self.calls.push("default_set".to_string());
    }
    fn bridge_reset(&mut self) {
        self.calls.push("bridge_reset".to_string());
    }
    fn request_reset(&mut self) {
        self.calls.push("request_reset".to_string());
    }
    fn network_management_done(&mut self) {
        self.calls.push("network_management_done".to_string());
    }
    fn component_done(&mut self) {
        self.calls.push("component_done".to_string());
    }
    fn random_u8(&mut self) -> u8 {
        self.next_random = self.next_random.wrapping_add(1);
        self.next_random
    }
}
