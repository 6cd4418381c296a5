// crates/zipgw-nms/src/nms/smart_start.rs
//! SmartStart add mode management and the unsolicited reports that go with it.

use super::NetworkManagement;
use super::events::NmEvent;
use super::inclusion::skip_flirs_option;
use crate::frame::constants::*;
use crate::frame::reply::included_nif_report;
use crate::hal::{BootMode, NmsEnv, ProvisioningStatus};
use crate::types::{HomeId, NodeId};
use log::{debug, info, trace};

impl NetworkManagement {
    /// A provisioned node announced itself with a SmartStart prime.
    ///
    /// Long Range entries are only included from a Long Range prime.
    pub fn smart_start_inclusion(
        &mut self,
        env: &mut NmsEnv<'_>,
        home_id: HomeId,
        options: u8,
        is_lr_prime: bool,
    ) {
        let entry = env
            .provisioning
            .by_home_id(&home_id)
            .filter(|e| e.status == ProvisioningStatus::Pending);
        let Some(entry) = entry else {
            info!(
                "[NMS] Rejecting SmartStart inclusion of {}: not provisioned or not pending",
                home_id
            );
            return;
        };

        let mut options = options;
        if entry.boot_mode == BootMode::LongRange {
            if !is_lr_prime {
                trace!("[NMS] Long Range entry {} primed over classic, ignoring", home_id);
                return;
            }
            options |= ADD_NODE_OPTION_LONG_RANGE;
        }
        options |= skip_flirs_option(env);
        self.post_event(env, NmEvent::NodeAddSmartStart { home_id, options });
    }

    /// Puts the radio back in SmartStart add mode if any provisioned node is
    /// still waiting, or stops add mode otherwise.
    pub fn smart_start_init_if_pending(&mut self, env: &mut NmsEnv<'_>) {
        if !self.config.smart_start_enabled
            || self.middleware.waiting
            || !self.session.state.is_idle()
        {
            return;
        }
        if env.provisioning.pending_count() > 0 {
            let mode = ADD_NODE_SMART_START | ADD_NODE_OPTION_NETWORK_WIDE | skip_flirs_option(env);
            debug!("[NMS] Enabling SmartStart add mode {:#04x}", mode);
            env.radio.add_node(mode);
        } else {
            env.radio.add_node(ADD_NODE_STOP);
        }
    }

    /// An included node information frame was heard. Frames from a foreign
    /// network that match the provisioning list are reported to the
    /// unsolicited destinations.
    pub fn included_nif_received(
        &mut self,
        env: &mut NmsEnv<'_>,
        node: NodeId,
        foreign_home_id: bool,
        home_id: HomeId,
    ) {
        if !foreign_home_id {
            trace!("[NMS] Ignoring included NIF from node {} of our network", node);
            return;
        }
        let Some(entry) = env.provisioning.by_home_id(&home_id) else {
            info!(
                "[NMS] Included NIF from home id {} is not in the provisioning list",
                home_id
            );
            return;
        };
        let seq = env.host.random_u8();
        self.send_to_unsolicited(env, &included_nif_report(seq, &entry.dsk));
        let seq = env.host.random_u8();
        let report = env.provisioning.build_report(&entry, seq);
        self.send_to_unsolicited(env, &report);
    }

    /// Sends the node list to the unsolicited destinations. Returns false,
    /// without sending, while an operation is running.
    pub fn send_node_list_to_unsolicited(&mut self, env: &mut NmsEnv<'_>) -> bool {
        if !self.session.state.is_idle() {
            return false;
        }
        let seq = env.host.random_u8();
        let frame = self.build_node_list_report(env, seq);
        self.send_to_unsolicited(env, &frame);
        true
    }

    pub fn send_failed_node_list_to_unsolicited(&mut self, env: &mut NmsEnv<'_>) {
        let seq = env.host.random_u8();
        let frame = self.build_failed_node_list_report(env, seq);
        self.send_to_unsolicited(env, &frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NmsConfig;
    use crate::hal::ProvisioningEntry;
    use crate::nms::states::NmState;
    use crate::nms::test_env::TestEnv;
    use alloc::string::String;
    use alloc::vec::Vec;

    const PRIME_HOME_ID: HomeId = HomeId([0xD8, 0x09, 0x0A, 0x0B]);

    fn create_test_nms() -> NetworkManagement {
        let mut config = NmsConfig::default();
        config.unsolicited_destination = Some("10.0.0.5:41230".parse().unwrap());
        config.unsolicited_destination2 = Some("10.0.0.6:41230".parse().unwrap());
        NetworkManagement::new(config)
    }

    fn create_test_entry(status: ProvisioningStatus, boot_mode: BootMode) -> ProvisioningEntry {
        let mut dsk: Vec<u8> = (0..16).collect();
        dsk[8..12].copy_from_slice(&PRIME_HOME_ID.0);
        ProvisioningEntry {
            dsk,
            status,
            boot_mode,
            advertised_join_keys: None,
        }
    }

    #[test]
    fn test_pending_entry_starts_smart_start_add() {
        let mut t = TestEnv::new();
        t.provisioning
            .entries
            .push(create_test_entry(ProvisioningStatus::Pending, BootMode::SmartStart));
        let mut nms = create_test_nms();
        nms.smart_start_inclusion(&mut t.env(), PRIME_HOME_ID, ADD_NODE_OPTION_NETWORK_WIDE, false);
        assert_eq!(nms.state(), NmState::WaitingForAdd);
        assert!(nms.flags().is_smart_start());
        assert!(
            t.radio
                .calls
                .iter()
                .any(|c| c.starts_with("add_node_smart_start(0x48"))
        );
    }

    #[test]
    fn test_passive_or_unknown_entries_are_dropped() {
        let mut t = TestEnv::new();
        t.provisioning
            .entries
            .push(create_test_entry(ProvisioningStatus::Passive, BootMode::SmartStart));
        let mut nms = create_test_nms();
        nms.smart_start_inclusion(&mut t.env(), PRIME_HOME_ID, 0, false);
        nms.smart_start_inclusion(&mut t.env(), HomeId([1, 2, 3, 4]), 0, false);
        assert_eq!(nms.state(), NmState::Idle);
        assert!(t.radio.calls.is_empty());
    }

    #[test]
    fn test_posted_event_for_passive_entry_stays_idle() {
        let mut t = TestEnv::new();
        t.provisioning
            .entries
            .push(create_test_entry(ProvisioningStatus::Passive, BootMode::SmartStart));
        let mut nms = create_test_nms();
        nms.post_event(
            &mut t.env(),
            NmEvent::NodeAddSmartStart {
                home_id: PRIME_HOME_ID,
                options: 0,
            },
        );
        assert_eq!(nms.state(), NmState::Idle);
        assert!(t.radio.calls.is_empty());
        assert!(t.frames().is_empty());

        t.provisioning.entries[0].status = ProvisioningStatus::Ignored;
        nms.post_event(
            &mut t.env(),
            NmEvent::NodeAddSmartStart {
                home_id: PRIME_HOME_ID,
                options: 0,
            },
        );
        assert_eq!(nms.state(), NmState::Idle);
        assert!(t.radio.calls.is_empty());
    }

    #[test]
    fn test_long_range_entry_needs_long_range_prime() {
        let mut t = TestEnv::new();
        t.provisioning
            .entries
            .push(create_test_entry(ProvisioningStatus::Pending, BootMode::LongRange));
        let mut nms = create_test_nms();
        nms.smart_start_inclusion(&mut t.env(), PRIME_HOME_ID, 0, false);
        assert_eq!(nms.state(), NmState::Idle);

        nms.smart_start_inclusion(&mut t.env(), PRIME_HOME_ID, 0, true);
        assert_eq!(nms.state(), NmState::WaitingForAdd);
        assert!(
            t.radio
                .calls
                .iter()
                .any(|c| c.starts_with("add_node_smart_start(0x28"))
        );
    }

    #[test]
    fn test_init_if_pending_follows_the_provisioning_list() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        nms.smart_start_init_if_pending(&mut t.env());
        assert_eq!(t.radio.calls, ["add_node(0x05)"]);

        t.provisioning
            .entries
            .push(create_test_entry(ProvisioningStatus::Pending, BootMode::SmartStart));
        nms.smart_start_init_if_pending(&mut t.env());
        assert_eq!(t.radio.calls.last().map(String::as_str), Some("add_node(0x49)"));

        nms.middleware.waiting = true;
        nms.smart_start_init_if_pending(&mut t.env());
        assert_eq!(t.radio.calls.len(), 2);
    }

    #[test]
    fn test_foreign_included_nif_is_reported_to_both_destinations() {
        let mut t = TestEnv::new();
        t.provisioning
            .entries
            .push(create_test_entry(ProvisioningStatus::Pending, BootMode::SmartStart));
        let mut nms = create_test_nms();
        nms.included_nif_received(&mut t.env(), NodeId(0), false, PRIME_HOME_ID);
        assert!(t.frames().is_empty());

        nms.included_nif_received(&mut t.env(), NodeId(0), true, PRIME_HOME_ID);
        let frames = t.frames();
        assert_eq!(frames.len(), 4);
        assert_eq!(&frames[0][..4], &[0x34, 0x19, 0x42, 16]);
        assert_eq!(&frames[2][..2], &[0x78, 0x03]);
    }

    #[test]
    fn test_node_list_is_not_sent_while_busy() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        assert!(nms.send_node_list_to_unsolicited(&mut t.env()));
        assert_eq!(t.frames().len(), 2);
        assert_eq!(t.frames()[0][2], 0x42);

        nms.post_event(&mut t.env(), NmEvent::NeighborUpdateRequest(NodeId(3)));
        assert!(!nms.send_node_list_to_unsolicited(&mut t.env()));
        nms.send_failed_node_list_to_unsolicited(&mut t.env());
        assert_eq!(t.frames().len(), 4);
        assert_eq!(t.frames()[3][1], 0x0C);
    }
}
