// crates/zipgw-nms/src/frame/report.rs
//! Builders for the Network Management Proxy reports.

use super::constants::*;
use super::reply::with_ip_association;
use crate::hal::{EndpointRecord, NodeProtocolInfo};
use crate::nms::flags::KeyClasses;
use crate::types::{CLASSIC_NODEMASK_LEN, NodeId, NodeMask};
use alloc::vec;
use alloc::vec::Vec;

fn push_long_range_mask(frame: &mut Vec<u8>, mask: &NodeMask) {
    let len = mask.long_range_report_len();
    frame.extend_from_slice(&(len as u16).to_be_bytes());
    frame.extend_from_slice(&mask.long_range[..len]);
}

/// `NODE_LIST_REPORT`: `[class, cmd, seq, status, controller_id, mask[29],
/// lr_len_msb, lr_len_lsb, lr_mask...]`.
pub fn node_list_report(seq: u8, status: u8, controller_id: u8, nodes: &NodeMask) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY,
        NODE_LIST_REPORT,
        seq,
        status,
        controller_id,
    ];
    frame.extend_from_slice(&nodes.classic);
    push_long_range_mask(&mut frame, nodes);
    frame
}

/// `FAILED_NODE_LIST_REPORT`: `[class, cmd, seq, mask[29], lr_len_msb,
/// lr_len_lsb, lr_mask...]`.
pub fn failed_node_list_report(seq: u8, failed: &NodeMask) -> Vec<u8> {
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY,
        FAILED_NODE_LIST_REPORT,
        seq,
    ];
    frame.extend_from_slice(&failed.classic[..CLASSIC_NODEMASK_LEN]);
    push_long_range_mask(&mut frame, failed);
    frame
}

/// Cached node information, as gathered from the radio and the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CachedNodeInfo {
    pub status: u8,
    pub age_s: u64,
    pub protocol: NodeProtocolInfo,
    pub granted_keys: KeyClasses,
    /// Endpoint info of the root device: generic, specific, cc...
    pub endpoint_info: Vec<u8>,
}

/// Encodes an age in seconds as the log2 of the age in minutes.
pub fn age_to_log2_minutes(age_s: u64) -> u8 {
    let minutes = age_s / 60;
    (0..16u8)
        .rev()
        .find(|bit| minutes & (1 << bit) != 0)
        .unwrap_or(0)
}

/// `NODE_INFO_CACHED_REPORT`. `info = None` reports an unknown node.
pub fn node_info_cached_report(seq: u8, info: Option<&CachedNodeInfo>) -> Vec<u8> {
    let Some(info) = info else {
        let mut frame = vec![0u8; 10];
        frame[0] = COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY;
        frame[1] = NODE_INFO_CACHED_REPORT;
        frame[2] = seq;
        frame[3] = NODE_INFO_CACHED_STATUS_UNKNOWN << 4;
        return frame;
    };
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY,
        NODE_INFO_CACHED_REPORT,
        seq,
        (info.status << 4) | (age_to_log2_minutes(info.age_s) & 0x0F),
        info.protocol.capability,
        info.protocol.security,
        info.granted_keys.0,
        info.protocol.basic,
        info.protocol.generic,
        info.protocol.specific,
    ];
    if info.endpoint_info.len() >= 2 {
        frame.extend_from_slice(&with_ip_association(&info.endpoint_info[2..]));
    }
    frame
}

/// `NM_MULTI_CHANNEL_END_POINT_REPORT`.
pub fn multi_channel_end_point_report(
    seq: u8,
    node_byte: u8,
    node: NodeId,
    individual: u8,
    aggregated: u8,
) -> Vec<u8> {
    let [_, msb, lsb] = node.to_frame();
    vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY,
        MULTI_CHANNEL_END_POINT_REPORT,
        seq,
        node_byte,
        0,
        individual & 0x7F,
        aggregated & 0x7F,
        msb,
        lsb,
    ]
}

/// `NM_MULTI_CHANNEL_CAPABILITY_REPORT`.
pub fn multi_channel_capability_report(
    seq: u8,
    node_byte: u8,
    node: NodeId,
    endpoint: &EndpointRecord,
) -> Vec<u8> {
    let [_, msb, lsb] = node.to_frame();
    let cc_len = endpoint.info.len().saturating_sub(2) as u8;
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY,
        MULTI_CHANNEL_CAPABILITY_REPORT,
        seq,
        node_byte,
        cc_len,
        endpoint.endpoint & 0x7F,
    ];
    frame.extend_from_slice(&endpoint.info);
    frame.push(msb);
    frame.push(lsb);
    frame
}

/// `NM_MULTI_CHANNEL_AGGREGATED_MEMBERS_REPORT`.
pub fn multi_channel_aggregated_members_report(
    seq: u8,
    node_byte: u8,
    node: NodeId,
    endpoint: &EndpointRecord,
) -> Vec<u8> {
    let [_, msb, lsb] = node.to_frame();
    let mut frame = vec![
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY,
        MULTI_CHANNEL_AGGREGATED_MEMBERS_REPORT,
        seq,
        node_byte,
        endpoint.endpoint & 0x7F,
        endpoint.aggregated_members.len() as u8,
    ];
    frame.extend_from_slice(&endpoint.aggregated_members);
    frame.push(msb);
    frame.push(lsb);
    frame
}
