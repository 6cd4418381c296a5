// crates/zipgw-nms/src/nms/learn.rs
//! Learn mode: the gateway itself joins or leaves another network, or
//! receives a controller replication.

use super::events::NmEvent;
use super::flags::{KeyClasses, SecurityFlags, SubFlags};
use super::state::PendingOp;
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::PendingReply;
use crate::frame::constants::*;
use crate::frame::reply::{LearnModeSetStatus, LearnSecurityResult};
use crate::hal::{NmsEnv, PreInclusionNif, RadioLearnMode};
use crate::types::{Dsk, NodeId};
use log::{debug, info, warn};

/// Explore frames sent in network-wide learn mode before giving up.
const MAX_EXPLORE_REQUESTS: u8 = 4;

/// DSK bytes the including controller asks for.
const LEARN_DSK_INPUT_LEN: u8 = 2;

impl NetworkManagement {
    pub(crate) fn start_learn_mode(
        &mut self,
        env: &mut NmsEnv<'_>,
        mode: u8,
        return_interview_status: bool,
    ) -> Step {
        let flags = match mode {
            LEARN_MODE_CLASSIC => SubFlags::empty(),
            LEARN_MODE_NWI => SubFlags::LEARNMODE_NWI,
            LEARN_MODE_NWE => SubFlags::LEARNMODE_NWE,
            LEARN_MODE_DISABLE => {
                self.session.reply = PendingReply::LearnMode(LearnModeSetStatus::new(
                    self.session.seq,
                    LEARN_MODE_FAILED,
                ));
                return Step::Reply;
            }
            other => {
                warn!("[NMS] Unknown learn mode {:#04x}", other);
                return Step::Done;
            }
        };
        info!("[NMS] Entering learn mode {:#04x}", mode);
        self.session.flags = flags;
        self.session.reply =
            PendingReply::LearnMode(LearnModeSetStatus::new(self.session.seq, LEARN_MODE_FAILED));

        // SmartStart add mode must not be running while we learn.
        env.radio.add_node(ADD_NODE_STOP);
        env.host.set_pre_inclusion_nif(PreInclusionNif::NoScheme);

        let timeout = if mode == LEARN_MODE_CLASSIC {
            self.config.timeouts.learn_classic_ms
        } else {
            self.config.timeouts.learn_network_wide_ms
        };
        self.enter(env, NmState::LearnMode, Some(timeout));
        if return_interview_status && mode != LEARN_MODE_NWE {
            self.session.flags.insert(SubFlags::LEARNMODE_NEW);
        }
        self.session.explore_count = 0;
        self.session.pending = Some(PendingOp::LearnMode);
        env.radio.set_learn_mode(RadioLearnMode::Classic);
        Step::Done
    }

    pub(crate) fn learn_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match (self.session.state, event) {
            (NmState::LearnMode, NmEvent::Timeout) => self.learn_mode_timeout(env),
            (NmState::LearnMode, NmEvent::LearnSet { mode, .. }) => {
                if *mode == LEARN_MODE_DISABLE {
                    self.update_reply_seq();
                    self.learn_timer_expired(env)
                } else {
                    debug!("[NMS] Already in learn mode, ignoring mode {:#04x}", mode);
                    Step::Done
                }
            }

            (NmState::LearnMode, NmEvent::LearnModeStarted(node)) => {
                info!("[NMS] Learn mode started, node {}", node);
                env.directory.probe_lock(true);
                self.session.pending_node = *node;
                self.enter(env, NmState::LearnModeStarted, None);
                env.security.start_learn(*node);
                Step::Done
            }
            (NmState::LearnMode | NmState::LearnModeStarted, NmEvent::LearnModeDone(node)) => {
                if !self.session.complete(PendingOp::LearnMode) {
                    return Step::Unhandled;
                }
                self.learn_mode_done(env, *node)
            }
            (NmState::LearnMode | NmState::LearnModeStarted, NmEvent::LearnModeFailed) => {
                self.session.pending = None;
                warn!("[NMS] Learn mode failed");
                env.directory.probe_lock(false);
                self.learn_failed_reply();
                Step::Reply
            }

            (NmState::WaitForSecureLearn, NmEvent::DskChallenge { public_key, .. }) => {
                env.host.set_pre_inclusion_nif(PreInclusionNif::S2Access);
                if let PendingReply::LearnMode(reply) = &mut self.session.reply {
                    reply.challenge_dsk = *public_key;
                }
                env.security
                    .dsk_accept(true, public_key, LEARN_DSK_INPUT_LEN);
                Step::Done
            }
            (NmState::WaitForSecureLearn, NmEvent::SecurityDone(flags)) => {
                self.secure_learn_done(env, *flags);
                Step::Done
            }
            (NmState::WaitForSecureLearn, NmEvent::LearnSet { mode, .. }) => {
                if *mode == LEARN_MODE_DISABLE {
                    self.update_reply_seq();
                    // The security engine answers with a failed SecurityDone.
                    env.security.abort_join();
                }
                Step::Done
            }

            (NmState::WaitForMdns, NmEvent::MdnsExit) => {
                if !self.session.flags.contains(SubFlags::CONTROLLER_REPLICATION) {
                    env.host.bridge_reset();
                }
                if self.session.flags.contains(SubFlags::LEARNMODE_NEW) {
                    let frame = self.session.reply.encode();
                    self.send_to_peer(env, &frame);
                    if let PendingReply::LearnMode(reply) = &mut self.session.reply {
                        reply.status = LEARN_MODE_INTERVIEW_COMPLETED;
                    }
                    let timeout = self.config.timeouts.probe_by_sis_ms;
                    self.enter(env, NmState::WaitForProbeBySis, Some(timeout));
                } else {
                    env.host.request_reset();
                    self.send_reply_when_network_updated(env);
                }
                Step::Done
            }

            (NmState::WaitForProbeBySis, NmEvent::Timeout) => {
                debug!("[NMS] Including controller finished its interview");
                env.host.request_reset();
                self.enter(env, NmState::WaitForOurProbe, None);
                Step::Done
            }
            (NmState::WaitForProbeBySis, NmEvent::FrameReceived) => {
                let timeout = self.config.timeouts.probe_by_sis_ms;
                self.rearm(env, timeout);
                Step::Done
            }
            (NmState::WaitForOurProbe, NmEvent::AllProbed) => {
                if self.session.flags.contains(SubFlags::LEARNMODE_NEW) {
                    debug!("[NMS] Network interviewed, sending interview completed");
                    self.send_reply_when_network_updated(env);
                }
                Step::Done
            }

            _ => Step::Unhandled,
        }
    }

    fn learn_mode_timeout(&mut self, env: &mut NmsEnv<'_>) -> Step {
        let flags = self.session.flags;
        if self.session.explore_count == 0 {
            env.radio.set_learn_mode(RadioLearnMode::Disable);
            if flags.contains(SubFlags::LEARNMODE_NWI) {
                env.radio.set_learn_mode(RadioLearnMode::NetworkWideInclusion);
            } else if flags.contains(SubFlags::LEARNMODE_NWE) {
                env.radio.set_learn_mode(RadioLearnMode::NetworkWideExclusion);
            }
        }

        if flags.is_network_wide_learn() && self.session.explore_count < MAX_EXPLORE_REQUESTS {
            if flags.contains(SubFlags::LEARNMODE_NWI) {
                env.radio.explore_request_inclusion();
            } else {
                env.radio.explore_request_exclusion();
            }
            let jitter = env.host.random_u8() as u64;
            let delay = self.config.timeouts.explore_retry_base_ms + jitter;
            self.rearm(env, delay);
            self.session.explore_count += 1;
            Step::Done
        } else {
            self.learn_timer_expired(env)
        }
    }

    /// Learn mode timed out or was cancelled by the client.
    fn learn_timer_expired(&mut self, env: &mut NmsEnv<'_>) -> Step {
        info!("[NMS] Learn mode timed out or cancelled");
        env.host.restore_nif();
        env.radio.set_learn_mode(RadioLearnMode::Disable);
        self.session.pending = None;
        env.directory.probe_lock(false);
        self.learn_failed_reply();
        Step::Reply
    }

    fn learn_failed_reply(&mut self) {
        self.session.reply =
            PendingReply::LearnMode(LearnModeSetStatus::new(self.session.seq, LEARN_MODE_FAILED));
    }

    fn update_reply_seq(&mut self) {
        let seq = self.session.seq;
        if let PendingReply::LearnMode(reply) = &mut self.session.reply {
            reply.seq = seq;
        }
    }

    /// The radio finished learn mode. Tells exclusion, inclusion into a new
    /// network and controller replication apart.
    fn learn_mode_done(&mut self, env: &mut NmsEnv<'_>, source: NodeId) -> Step {
        let own = env.radio.own_node_id();
        let mut others = env.radio.node_list();
        others.remove(own);
        let clean_network = others.is_empty();
        let new_network = env.radio.home_id() != env.host.home_id();

        self.enter(env, NmState::WaitForSecureLearn, None);

        if clean_network || source.is_none() {
            warn!("[NMS] Gateway has been excluded");
            self.queue.purge_all(env.transport);
            env.host.network_left();
            self.post_event(env, NmEvent::SecurityDone(SecurityFlags::empty()));
            // An exclusion resets the gateway once the directory has exited.
            self.enter(env, NmState::SetDefault, None);
        } else if new_network {
            info!(
                "[NMS] Gateway joined network {} as node {}",
                env.radio.home_id(),
                source
            );
            let includer = self
                .session
                .flags
                .contains(SubFlags::LEARNMODE_NEW)
                .then_some(self.session.pending_node);
            env.host.network_joined(source, includer);
        } else {
            warn!("[NMS] Controller replication received");
            self.session.flags.insert(SubFlags::CONTROLLER_REPLICATION);
            env.host.network_replicated();
            let flags = env.security.gateway_flags();
            self.post_event(env, NmEvent::SecurityDone(flags));
        }
        Step::Done
    }

    fn secure_learn_done(&mut self, env: &mut NmsEnv<'_>, flags: SecurityFlags) {
        debug!("[NMS] Secure learn done, flags {:#010x}", flags.0);
        env.security.reinitialize();
        let own = env.radio.own_node_id();
        let seq = self.session.seq;
        let challenge_dsk: Dsk = match &self.session.reply {
            PendingReply::LearnMode(reply) => reply.challenge_dsk,
            _ => Dsk::default(),
        };
        let mut reply = LearnModeSetStatus::new(
            seq,
            if flags.is_known_bad() {
                LEARN_MODE_SECURITY_FAILED
            } else {
                LEARN_MODE_DONE
            },
        );
        reply.new_node_id = own;
        reply.challenge_dsk = challenge_dsk;
        reply.security = Some(LearnSecurityResult {
            granted_keys: flags.key_classes(),
            kex_fail_type: flags.kex_fail_type(),
            dsk: challenge_dsk,
        });
        self.session.reply = PendingReply::LearnMode(reply);
        self.enter(env, NmState::WaitForMdns, None);

        if !flags.contains(SecurityFlags::SECURITY0) {
            env.security.clear_network_keys(KeyClasses::S0);
        }
        if !flags.has_any_s2() {
            warn!("[NMS] No S2 keys granted, clearing all S2 keys");
            env.security.clear_network_keys(
                KeyClasses::S2_ACCESS | KeyClasses::S2_AUTHENTICATED | KeyClasses::S2_UNAUTHENTICATED,
            );
        }
        // Completion arrives as `MdnsExit`.
        env.directory.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NmsConfig;
    use crate::nms::test_env::{GATEWAY, TestEnv, create_test_dsk, create_test_peer};
    use crate::types::HomeId;

    fn create_test_nms() -> NetworkManagement {
        let mut nms = NetworkManagement::new(NmsConfig::default());
        nms.session.peer = Some(create_test_peer());
        nms.session.seq = 0x30;
        nms
    }

    fn start(nms: &mut NetworkManagement, t: &mut TestEnv, mode: u8, ris: bool) {
        nms.post_event(
            &mut t.env(),
            NmEvent::LearnSet {
                mode,
                return_interview_status: ris,
            },
        );
    }

    #[test]
    fn test_disable_while_idle_replies_failed() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_DISABLE, false);
        assert_eq!(nms.state(), NmState::Idle);
        assert_eq!(t.last_frame(), Some(&[0x4D, 0x02, 0x30, 0x07, 0, 0][..]));
    }

    #[test]
    fn test_classic_learn_mode_times_out() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_CLASSIC, false);
        assert_eq!(nms.state(), NmState::LearnMode);
        assert_eq!(nms.session.timer.deadline(), Some(20_000));
        assert!(t.radio.calls.contains(&"set_learn_mode(Classic)".into()));
        assert!(t.host.calls.contains(&"set_pre_inclusion_nif(NoScheme)".into()));

        nms.post_event(&mut t.env(), NmEvent::Timeout);
        assert_eq!(nms.state(), NmState::Idle);
        assert!(t.host.calls.contains(&"restore_nif".into()));
        assert!(t.radio.calls.contains(&"set_learn_mode(Disable)".into()));
        assert_eq!(t.last_frame(), Some(&[0x4D, 0x02, 0x30, 0x07, 0, 0][..]));
    }

    #[test]
    fn test_network_wide_inclusion_sends_four_explore_requests() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_NWI, false);
        assert_eq!(nms.session.timer.deadline(), Some(6_000));

        for round in 1..=4u64 {
            t.now_ms = nms.session.timer.deadline().unwrap();
            nms.post_event(&mut t.env(), NmEvent::Timeout);
            assert_eq!(nms.state(), NmState::LearnMode);
            assert_eq!(nms.session.explore_count as u64, round);
            assert_eq!(nms.session.timer.deadline(), Some(t.now_ms + 4_000 + 0x42));
        }
        let explores = t
            .radio
            .calls
            .iter()
            .filter(|c| *c == "explore_request_inclusion")
            .count();
        assert_eq!(explores, 4);
        assert!(t.radio.calls.contains(&"set_learn_mode(NetworkWideInclusion)".into()));

        nms.post_event(&mut t.env(), NmEvent::Timeout);
        assert_eq!(nms.state(), NmState::Idle);
        assert_eq!(t.last_frame().map(|f| f[3]), Some(LEARN_MODE_FAILED));
    }

    #[test]
    fn test_cancel_uses_the_new_seq() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_CLASSIC, false);
        nms.session.seq = 0x31;
        start(&mut nms, &mut t, LEARN_MODE_DISABLE, false);
        assert_eq!(nms.state(), NmState::Idle);
        assert_eq!(t.last_frame(), Some(&[0x4D, 0x02, 0x31, 0x07, 0, 0][..]));
    }

    #[test]
    fn test_exclusion_resets_gateway_after_network_update() {
        let mut t = TestEnv::new();
        t.radio.nodes.add(GATEWAY);
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_NWE, true);
        assert!(!nms.flags().contains(SubFlags::LEARNMODE_NEW));

        nms.post_event(&mut t.env(), NmEvent::LearnModeStarted(NodeId(1)));
        assert_eq!(nms.state(), NmState::LearnModeStarted);
        nms.post_event(&mut t.env(), NmEvent::LearnModeDone(NodeId::NONE));
        assert_eq!(nms.state(), NmState::SetDefault);
        assert!(t.host.calls.contains(&"network_left".into()));
        assert!(t.directory.calls.contains(&"exit".into()));

        nms.post_event(&mut t.env(), NmEvent::MdnsExit);
        assert_eq!(nms.state(), NmState::WaitingForProbe);
        assert!(t.host.calls.contains(&"default_set".into()));
        assert!(t.host.calls.contains(&"request_reset".into()));

        nms.post_event(&mut t.env(), NmEvent::NetworkUpdateFlags(NETWORK_UPDATE_FLAG_PROBE));
        assert_eq!(nms.state(), NmState::Idle);
        let frame = t.last_frame().unwrap();
        assert_eq!(&frame[..6], &[0x4D, 0x02, 0x30, LEARN_MODE_DONE, 0, 1]);
        assert_eq!(frame.len(), 24);
    }

    #[test]
    fn test_inclusion_with_interview_status_reports_twice() {
        let mut t = TestEnv::new();
        t.radio.nodes.add(GATEWAY);
        t.radio.nodes.add(NodeId(1));
        t.radio.nodes.add(NodeId(7));
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_CLASSIC, true);
        nms.post_event(&mut t.env(), NmEvent::LearnModeStarted(NodeId(7)));
        assert_eq!(t.security.calls, ["start_learn(7)"]);

        // Joining a network with a different home id.
        t.radio.home_id = HomeId([0xDE, 0xAD, 0xBE, 0xEF]);
        nms.post_event(&mut t.env(), NmEvent::LearnModeDone(NodeId(7)));
        assert_eq!(nms.state(), NmState::WaitForSecureLearn);
        assert!(t.host.calls.contains(&"network_joined(7, Some(NodeId(7)))".into()));

        let dsk = create_test_dsk(0x60);
        nms.post_event(
            &mut t.env(),
            NmEvent::DskChallenge {
                granted_keys: KeyClasses::S2_ACCESS,
                public_key: dsk,
            },
        );
        assert!(t.security.calls.contains(&"dsk_accept(true, 16, 2)".into()));
        nms.post_event(
            &mut t.env(),
            NmEvent::SecurityDone(SecurityFlags::SECURITY2_ACCESS),
        );
        assert_eq!(nms.state(), NmState::WaitForMdns);
        assert!(t.security.calls.contains(&"clear_network_keys(0x80)".into()));

        nms.post_event(&mut t.env(), NmEvent::MdnsExit);
        assert_eq!(nms.state(), NmState::WaitForProbeBySis);
        let first = t.last_frame().unwrap().to_vec();
        assert_eq!(first[3], LEARN_MODE_DONE);
        assert_eq!(first[6], KeyClasses::S2_ACCESS.0);
        assert_eq!(&first[8..], &dsk);

        nms.post_event(&mut t.env(), NmEvent::Timeout);
        assert_eq!(nms.state(), NmState::WaitForOurProbe);
        nms.post_event(&mut t.env(), NmEvent::AllProbed);
        assert_eq!(nms.state(), NmState::WaitingForProbe);
        nms.post_event(&mut t.env(), NmEvent::Timeout);
        assert_eq!(nms.state(), NmState::Idle);
        assert_eq!(t.last_frame().map(|f| f[3]), Some(LEARN_MODE_INTERVIEW_COMPLETED));
    }

    #[test]
    fn test_controller_replication_keeps_keys() {
        let mut t = TestEnv::new();
        t.radio.nodes.add(GATEWAY);
        t.radio.nodes.add(NodeId(2));
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_CLASSIC, false);
        nms.post_event(&mut t.env(), NmEvent::LearnModeStarted(NodeId(1)));
        nms.post_event(&mut t.env(), NmEvent::LearnModeDone(NodeId(1)));
        assert!(nms.flags().contains(SubFlags::CONTROLLER_REPLICATION));
        assert_eq!(nms.state(), NmState::WaitForMdns);
        assert!(t.host.calls.contains(&"network_replicated".into()));
        assert!(
            !t.security
                .calls
                .iter()
                .any(|c| c.starts_with("clear_network_keys"))
        );

        nms.post_event(&mut t.env(), NmEvent::MdnsExit);
        assert!(!t.host.calls.contains(&"bridge_reset".into()));
        assert_eq!(nms.state(), NmState::WaitingForProbe);
    }

    #[test]
    fn test_s0_during_secure_learn_aborts_s2_join() {
        let mut t = TestEnv::new();
        let mut nms = create_test_nms();
        start(&mut nms, &mut t, LEARN_MODE_CLASSIC, false);
        nms.post_event(&mut t.env(), NmEvent::LearnModeStarted(NodeId(4)));
        nms.post_event(&mut t.env(), NmEvent::S0Started);
        assert!(t.host.calls.contains(&"set_pre_inclusion_nif(S0)".into()));
        assert!(t.security.calls.contains(&"abort_join".into()));
        assert_eq!(nms.state(), NmState::LearnModeStarted);
    }
}
