// crates/zipgw-nms/src/config.rs
use crate::hal::NmsError;
use core::net::SocketAddr;

/// Timeouts used by the state machine, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NmsTimeouts {
    /// Guard for the radio add-node phases and failed-node replacement.
    pub add_node_ms: u64,
    /// Guard for the security bootstrap after the protocol add completed.
    pub secure_add_ms: u64,
    /// Rearmed when a DSK challenge is presented to the client.
    pub dsk_challenge_ms: u64,
    pub learn_classic_ms: u64,
    pub learn_network_wide_ms: u64,
    /// Base interval between explore requests (a random 0..=255 ms is added).
    pub explore_retry_base_ms: u64,
    pub proxy_nif_ms: u64,
    pub dhcp_ms: u64,
    pub set_default_ms: u64,
    pub prepare_suc_ms: u64,
    /// Grace period for a SmartStart node to evict itself.
    pub self_destruct_ms: u64,
    pub self_destruct_retry_ms: u64,
    pub self_destruct_removal_ms: u64,
    pub probe_by_sis_ms: u64,
    pub network_update_ms: u64,
    pub remove_node_ms: u64,
    pub middleware_probe_ms: u64,
    pub queue_nak_waiting_ms: u64,
}

impl Default for NmsTimeouts {
    fn default() -> Self {
        Self {
            add_node_ms: 60_000,
            secure_add_ms: 250_000,
            dsk_challenge_ms: 310_000,
            learn_classic_ms: 20_000,
            learn_network_wide_ms: 6_000,
            explore_retry_base_ms: 4_000,
            proxy_nif_ms: 5_000,
            dhcp_ms: 5_000,
            set_default_ms: 15_000,
            prepare_suc_ms: 2_000,
            self_destruct_ms: 3_000,
            self_destruct_retry_ms: 240_000,
            self_destruct_removal_ms: 20_000,
            probe_by_sis_ms: 6_000,
            network_update_ms: 65_000,
            remove_node_ms: 60_000,
            middleware_probe_ms: 9_000,
            queue_nak_waiting_ms: 60_000,
        }
    }
}

impl NmsTimeouts {
    fn all(&self) -> [(&'static str, u64); 18] {
        [
            ("add_node_ms", self.add_node_ms),
            ("secure_add_ms", self.secure_add_ms),
            ("dsk_challenge_ms", self.dsk_challenge_ms),
            ("learn_classic_ms", self.learn_classic_ms),
            ("learn_network_wide_ms", self.learn_network_wide_ms),
            ("explore_retry_base_ms", self.explore_retry_base_ms),
            ("proxy_nif_ms", self.proxy_nif_ms),
            ("dhcp_ms", self.dhcp_ms),
            ("set_default_ms", self.set_default_ms),
            ("prepare_suc_ms", self.prepare_suc_ms),
            ("self_destruct_ms", self.self_destruct_ms),
            ("self_destruct_retry_ms", self.self_destruct_retry_ms),
            ("self_destruct_removal_ms", self.self_destruct_removal_ms),
            ("probe_by_sis_ms", self.probe_by_sis_ms),
            ("network_update_ms", self.network_update_ms),
            ("remove_node_ms", self.remove_node_ms),
            ("middleware_probe_ms", self.middleware_probe_ms),
            ("queue_nak_waiting_ms", self.queue_nak_waiting_ms),
        ]
    }
}

/// Configuration of the network management component.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NmsConfig {
    /// Receives SmartStart and other unsolicited reports.
    pub unsolicited_destination: Option<SocketAddr>,
    pub unsolicited_destination2: Option<SocketAddr>,
    /// The gateway does not hand out IPv4 addresses, so no DHCP wait is needed.
    pub ipv4_disabled: bool,
    pub mailbox_enabled: bool,
    pub smart_start_enabled: bool,
    pub timeouts: NmsTimeouts,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            unsolicited_destination: None,
            unsolicited_destination2: None,
            ipv4_disabled: false,
            mailbox_enabled: true,
            smart_start_enabled: true,
            timeouts: NmsTimeouts::default(),
        }
    }
}

impl NmsConfig {
    /// Checks the timeouts for values the state machine cannot work with.
    pub fn validate(&self) -> Result<(), NmsError> {
        if let Some((name, _)) = self.timeouts.all().iter().find(|(_, ms)| *ms == 0) {
            log::error!("[NMS] Configuration timeout {} must not be zero", name);
            return Err(NmsError::InvalidConfig("timeouts must be non-zero"));
        }
        if self.timeouts.self_destruct_retry_ms < self.timeouts.self_destruct_ms {
            return Err(NmsError::InvalidConfig(
                "self_destruct_retry_ms is shorter than self_destruct_ms",
            ));
        }
        Ok(())
    }
}
