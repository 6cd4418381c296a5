// crates/zipgw-nms/src/nms/security.rs
//! Bridge between the state machine and the security engine while a node
//! bootstraps in `WaitForSecureAdd`.

use super::events::NmEvent;
use super::flags::{KeyClasses, SecurityFlags, SubFlags};
use super::state::{CommandKind, PendingOp};
use super::states::NmState;
use super::{NetworkManagement, Step};
use crate::frame::PendingReply;
use crate::frame::constants::*;
use crate::frame::reply::{node_add_dsk_report, node_add_keys_report};
use crate::hal::NmsEnv;
use crate::types::{DSK_LEN, Dsk};
use log::{debug, info, warn};

/// Number of DSK bytes the user has to type in for authenticated classes.
const DSK_INPUT_LEN: u8 = 2;

impl NetworkManagement {
    pub(crate) fn secure_add_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match event {
            NmEvent::SecurityDone(flags) => self.security_done(env, Some(*flags)),
            NmEvent::NodeAddStop => self.security_done(env, None),
            NmEvent::KeyRequest { keys, csa } => {
                self.key_request(env, *keys, *csa);
                Step::Done
            }
            NmEvent::DskChallenge {
                granted_keys,
                public_key,
            } => {
                self.dsk_challenge(env, *granted_keys, public_key);
                Step::Done
            }
            NmEvent::KeysSet { accept, csa, keys } => {
                if *csa {
                    self.session.flags.insert(SubFlags::CSA_INCLUSION);
                }
                env.security.key_grant(*accept, *keys, *csa);
                Step::Done
            }
            NmEvent::DskSet {
                accept,
                input_len,
                dsk,
            } => {
                let len = *input_len as usize;
                if len <= DSK_LEN {
                    env.security.dsk_accept(*accept, &dsk[..len], *input_len);
                    self.session.dsk_valid = true;
                    self.session.just_included_dsk[..len].copy_from_slice(&dsk[..len]);
                } else {
                    env.security.dsk_accept(false, &[], DSK_INPUT_LEN);
                }
                Step::Done
            }
            NmEvent::Timeout => {
                warn!(
                    "[NMS] Security bootstrap of node {} timed out",
                    self.session.pending_node
                );
                self.post_event(env, NmEvent::NodeAddStop);
                Step::Done
            }
            _ => Step::Unhandled,
        }
    }

    /// The bootstrap finished with `flags`, or was stopped by the client
    /// (`None`). Records the outcome in the reply and moves on to the
    /// interview.
    fn security_done(&mut self, env: &mut NmsEnv<'_>, flags: Option<SecurityFlags>) -> Step {
        self.session.timer.cancel();
        let flags = match flags {
            Some(flags) => {
                self.session.inclusion_flags = flags;
                flags
            }
            None => {
                env.security.key_grant(false, KeyClasses::empty(), false);
                env.security.dsk_accept(false, &[], DSK_INPUT_LEN);
                SecurityFlags::KNOWN_BAD
            }
        };
        let bad = flags.is_known_bad();
        let node = self.session.pending_node;

        match &mut self.session.reply {
            PendingReply::NodeAdd(reply) if self.session.command == CommandKind::NodeAdd => {
                reply.status = if bad {
                    NODE_ADD_STATUS_SECURITY_FAILED
                } else {
                    NODE_ADD_STATUS_DONE
                };
            }
            PendingReply::FailedNodeReplace(reply) => {
                reply.status = if bad {
                    NODE_ADD_STATUS_SECURITY_FAILED
                } else {
                    FAILED_NODE_REPLACE_DONE
                };
                reply.granted_keys = flags.key_classes();
                reply.kex_fail_type = flags.kex_fail_type();
            }
            _ => {}
        }
        env.directory.set_security_flags(node, flags.persisted());
        env.security.new_dynamic_ecdh_key();

        if self.session.flags.is_smart_start() && bad {
            info!(
                "[NMS] SmartStart node {} failed security, waiting for it to self destruct",
                node
            );
            let timeout = self.config.timeouts.self_destruct_ms;
            self.enter(env, NmState::WaitForSelfDestruct, Some(timeout));
            return Step::Done;
        }

        let s2_ok = flags.has_any_s2() && !bad;
        if self.session.dsk_valid && (self.session.flags.is_smart_start() || s2_ok) {
            env.directory.add_dsk(node, &self.session.just_included_dsk);
        }
        if s2_ok {
            self.session.flags.insert(SubFlags::REPORT_DSK);
        }
        if self.session.flags.is_smart_start() {
            // Holds SmartStart add mode back while the new node is interviewed.
            self.middleware.waiting = true;
        }

        if self.session.delay_neighbor_update {
            debug!("[NMS] Starting the delayed neighbor discovery of node {}", node);
            self.session.delay_neighbor_update = false;
            let timeout = env.directory.inclusion_timeout_ms(true);
            self.enter(env, NmState::WaitForNeighborUpdateAfterSecureAdd, Some(timeout));
            self.session.pending = Some(PendingOp::NeighborUpdateAfterSecureAdd);
            env.radio.request_neighbor_update(node);
        } else {
            self.enter(env, NmState::WaitForProbeAfterAdd, None);
            env.directory.probe_lock(false);
        }
        Step::Done
    }

    fn key_request(&mut self, env: &mut NmsEnv<'_>, requested: KeyClasses, csa: bool) {
        if self.session.flags.is_smart_start() {
            let allowed = env
                .provisioning
                .by_dsk(&self.session.just_included_dsk)
                .and_then(|entry| entry.advertised_join_keys);
            let keys = match allowed {
                Some(allowed) => KeyClasses(requested.0 & allowed.0),
                None => requested,
            };
            debug!(
                "[NMS] SmartStart node requested keys {:#04x}, granting {:#04x}",
                requested.0, keys.0
            );
            self.session.granted_keys = keys;
            env.security.key_grant(true, keys, false);
        } else {
            let frame = node_add_keys_report(self.session.seq, csa, requested);
            self.send_to_peer(env, &frame);
        }
    }

    fn dsk_challenge(&mut self, env: &mut NmsEnv<'_>, granted: KeyClasses, public_key: &Dsk) {
        let timeout = self.config.timeouts.dsk_challenge_ms;
        self.rearm(env, timeout);

        let mut key = *public_key;
        if let Some(entry) = env.provisioning.match_challenge(&key) {
            if let Some(prefix) = entry.dsk.get(..2) {
                key[..2].copy_from_slice(prefix);
            }
            self.accept_challenge(env, &key);
        } else if self.session.granted_keys == KeyClasses::S2_UNAUTHENTICATED {
            // Unauthenticated nodes may use a dynamic DSK.
            self.accept_challenge(env, &key);
        } else if self.session.flags.is_smart_start() {
            warn!("[NMS] SmartStart: challenged DSK is not in the provisioning list");
            self.session.dsk_valid = false;
            // Rejected from the next tick, outside the security engine callback.
            self.deferred_abort_ms = Some(env.now_ms);
        } else {
            let input_len = if granted.intersects(KeyClasses::S2_ACCESS | KeyClasses::S2_AUTHENTICATED)
                && !self.session.flags.contains(SubFlags::CSA_INCLUSION)
            {
                DSK_INPUT_LEN
            } else {
                0
            };
            let frame = node_add_dsk_report(self.session.seq, input_len, &key);
            self.session.just_included_dsk = key;
            self.send_to_peer(env, &frame);
        }
    }

    fn accept_challenge(&mut self, env: &mut NmsEnv<'_>, key: &Dsk) {
        self.session.just_included_dsk = *key;
        self.session.dsk_valid = true;
        env.security.dsk_accept(true, key, DSK_INPUT_LEN);
    }

    /// Rejects a SmartStart DSK challenge that could not be matched.
    pub(crate) fn fire_deferred_abort(&mut self, env: &mut NmsEnv<'_>) {
        debug!("[NMS] Rejecting unmatched SmartStart DSK challenge");
        env.security.dsk_accept(false, &[], DSK_INPUT_LEN);
    }
}
