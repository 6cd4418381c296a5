// crates/zipgw-nms/src/nms/mod.rs
//! The network management state machine.
//!
//! A single [`NetworkManagement`] owns the session. Every input, whether a
//! client request, a radio callback, a security engine callback or a timer
//! expiry, is turned into an [`NmEvent`] and run to completion by
//! [`NetworkManagement::post_event`]. Collaborators are reached through the
//! [`NmsEnv`] passed into each call.

pub mod events;
pub mod flags;
pub mod state;
pub mod states;

mod exclusion;
mod inclusion;
mod learn;
mod maintenance;
mod notify;
mod proxy;
mod reply;
mod security;
mod self_destruct;
mod smart_start;
mod tick;

#[cfg(test)]
pub(crate) mod test_env;

pub(crate) use inclusion::skip_flirs_option;

use crate::config::NmsConfig;
use crate::frame::PendingReply;
use crate::frame::reply::node_add_status_rejected;
use crate::hal::{NmsEnv, NmsError, PreInclusionNif};
use crate::queue::NmQueue;
use crate::types::{Dsk, NodeId, Peer};
use events::NmEvent;
use flags::{KeyClasses, SubFlags};
use log::{debug, info, trace, warn};
use state::{CommandKind, NmsState};
use states::NmState;

/// Outcome of one transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// The event was consumed.
    Done,
    /// The operation ended: emit the accumulated reply and return to idle.
    Reply,
    /// The current state has no transition for the event.
    Unhandled,
}

/// Hold-off after a SmartStart reply, during which the middleware is
/// expected to interview the new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct MiddlewareProbe {
    pub waiting: bool,
    pub deadline_ms: Option<u64>,
}

/// Read-only view of the session, used by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub state: NmState,
    pub flags: SubFlags,
    pub seq: u8,
    pub pending_node: NodeId,
    pub peer: Option<Peer>,
    pub idle: bool,
    /// The DSK of the node being included, once it has been confirmed.
    pub dsk: Option<Dsk>,
    pub granted_keys: KeyClasses,
    pub queue_len: usize,
    pub next_deadline_ms: Option<u64>,
}

/// The network management component of the gateway.
pub struct NetworkManagement {
    pub(crate) session: NmsState,
    pub(crate) config: NmsConfig,
    pub(crate) queue: NmQueue,
    pub(crate) middleware: MiddlewareProbe,
    /// Pending asynchronous rejection of a DSK challenge.
    pub(crate) deferred_abort_ms: Option<u64>,
    pub(crate) newly_included_smart_start: NodeId,
}

impl NetworkManagement {
    pub fn new(config: NmsConfig) -> Self {
        Self {
            session: NmsState::default(),
            config,
            queue: NmQueue::new(),
            middleware: MiddlewareProbe::default(),
            deferred_abort_ms: None,
            newly_included_smart_start: NodeId::NONE,
        }
    }

    /// A fallible constructor that validates the configuration first.
    pub fn with_validated_config(config: NmsConfig) -> Result<Self, NmsError> {
        config.validate()?;
        info!(
            "[NMS] Network management configured: unsolicited={:?}/{:?}, ipv4_disabled={}, smart_start={}",
            config.unsolicited_destination,
            config.unsolicited_destination2,
            config.ipv4_disabled,
            config.smart_start_enabled
        );
        Ok(Self::new(config))
    }

    // --- Queries ---

    pub fn state(&self) -> NmState {
        self.session.state
    }

    /// True when no operation is running and no SmartStart middleware
    /// hold-off is active.
    pub fn is_idle(&self) -> bool {
        self.session.state.is_idle() && !self.middleware.waiting
    }

    pub fn peer(&self) -> Option<Peer> {
        self.session.peer
    }

    pub fn seq(&self) -> u8 {
        self.session.seq
    }

    pub fn flags(&self) -> SubFlags {
        self.session.flags
    }

    pub fn pending_node(&self) -> NodeId {
        self.session.pending_node
    }

    /// The node most recently included through SmartStart.
    pub fn newly_included_smart_start_node(&self) -> NodeId {
        self.newly_included_smart_start
    }

    pub fn config(&self) -> &NmsConfig {
        &self.config
    }

    pub fn queue(&self) -> &NmQueue {
        &self.queue
    }

    pub fn snapshot(&self) -> SessionView {
        SessionView {
            state: self.session.state,
            flags: self.session.flags,
            seq: self.session.seq,
            pending_node: self.session.pending_node,
            peer: self.session.peer,
            idle: self.is_idle(),
            dsk: self
                .session
                .dsk_valid
                .then_some(self.session.just_included_dsk),
            granted_keys: self.session.granted_keys,
            queue_len: self.queue.len(),
            next_deadline_ms: self.next_deadline(),
        }
    }

    // --- Event dispatch ---

    /// Runs one event to completion.
    pub fn post_event(&mut self, env: &mut NmsEnv<'_>, event: NmEvent) {
        let old_state = self.session.state;
        trace!("[NMS] Event {:?} in state {:?}", event, old_state);

        match self.dispatch(env, &event) {
            Step::Done => {}
            Step::Reply => self.send_reply(env),
            Step::Unhandled => {
                warn!("[NMS] Unhandled event {:?} in state {:?}", event, old_state);
            }
        }

        let new_state = self.session.state;
        if old_state != new_state {
            info!(
                "[NMS] State transition: {:?} -> {:?} (on event: {:?})",
                old_state, new_state, event
            );
        }
        // A timer never outlives the state that armed it.
        if self.session.timer.is_armed() && self.session.timer.owner() != new_state {
            debug!(
                "[NMS] Cancelling timer owned by {:?}",
                self.session.timer.owner()
            );
            self.session.timer.cancel();
        }
    }

    fn dispatch(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        if *event == NmEvent::S0Started {
            return self.on_s0_started(env);
        }

        match self.session.state {
            NmState::Idle => self.idle_event(env, event),

            NmState::LearnMode
            | NmState::LearnModeStarted
            | NmState::WaitForSecureLearn
            | NmState::WaitForMdns
            | NmState::WaitForProbeBySis
            | NmState::WaitForOurProbe => self.learn_event(env, event),

            NmState::WaitingForAdd
            | NmState::NodeFound
            | NmState::WaitForProtocol
            | NmState::PrepareSucInclusion
            | NmState::WaitForSucInclusion
            | NmState::WaitForNeighborUpdateAfterSecureAdd
            | NmState::WaitForProbeAfterAdd
            | NmState::WaitDhcp => self.inclusion_event(env, event),

            NmState::WaitForSecureAdd => self.secure_add_event(env, event),
            NmState::ProxyInclusionWaitNif => self.proxy_wait_nif_event(env, event),

            NmState::WaitForSelfDestruct
            | NmState::WaitForTxToSelfDestruct
            | NmState::WaitForSelfDestructRemoval
            | NmState::WaitForSelfDestructRetry
            | NmState::WaitForTxToSelfDestructRetry
            | NmState::WaitForSelfDestructRemovalRetry => self.self_destruct_event(env, event),

            NmState::WaitingForNodeRemoval
            | NmState::RemovingAssociations
            | NmState::WaitingForFailNodeRemoval
            | NmState::ReplaceFailedReq => self.removal_event(env, event),

            NmState::NetworkUpdate
            | NmState::SendingNodeInfo
            | NmState::WaitingForNodeNeighUpdate
            | NmState::WaitingForReturnRouteAssign
            | NmState::WaitingForReturnRouteDelete
            | NmState::WaitForNodeInfoProbe
            | NmState::SetDefault
            | NmState::WaitingForProbe => self.maintenance_event(env, event),
        }
    }

    fn idle_event(&mut self, env: &mut NmsEnv<'_>, event: &NmEvent) -> Step {
        match event {
            NmEvent::NodeAdd { mode, s2 } => self.start_node_add(env, *mode, *s2),
            NmEvent::NodeAddSmartStart { home_id, options } => {
                self.start_smart_start_add(env, home_id, *options)
            }
            NmEvent::NodeAddStop => {
                debug!("[NMS] Add stop while idle, rejecting");
                self.session.reply = PendingReply::Frame(node_add_status_rejected(self.session.seq));
                Step::Reply
            }
            NmEvent::NodeRemove { mode } => self.start_node_remove(env, *mode),
            NmEvent::NodeRemoveStop => self.stop_node_remove(env),
            NmEvent::FailedNodeRemove(node) => self.start_failed_node_remove(env, *node),
            NmEvent::ReplaceFailedStart {
                node,
                normal_power,
                s2,
            } => self.start_replace_failed(env, *node, Some(*normal_power), *s2),
            NmEvent::ReplaceFailedStop(node) => self.start_replace_failed(env, *node, None, false),
            NmEvent::NeighborUpdateRequest(node) => self.start_neighbor_update(env, *node),
            NmEvent::ReturnRouteAssign {
                source,
                destination,
            } => self.start_return_route_assign(env, *source, *destination),
            NmEvent::ReturnRouteDelete(node) => self.start_return_route_delete(env, *node),
            NmEvent::NetworkUpdateRequest => self.start_network_update(env),
            NmEvent::NodeInformationSend {
                destination,
                tx_options,
            } => self.start_node_information_send(env, *destination, *tx_options),
            NmEvent::DefaultSet => self.start_default_set(env),
            NmEvent::LearnSet {
                mode,
                return_interview_status,
            } => self.start_learn_mode(env, *mode, *return_interview_status),
            NmEvent::NodeInfoCachedGet { node, max_age } => {
                self.node_info_cached_get(env, *node, *max_age)
            }
            NmEvent::RequestNodeList => {
                let frame = self.build_node_list_report(env, self.session.seq);
                self.session.reply = PendingReply::Frame(frame);
                Step::Reply
            }
            NmEvent::RequestFailedNodeList => {
                let frame = self.build_failed_node_list_report(env, self.session.seq);
                self.session.reply = PendingReply::Frame(frame);
                Step::Reply
            }
            NmEvent::StartProxyInclusion(node) => {
                self.start_proxy(env, *node, CommandKind::NodeAdd)
            }
            NmEvent::StartProxyReplace(node) => {
                self.start_proxy(env, *node, CommandKind::FailedNodeReplace)
            }
            // Late add-mode callbacks from SmartStart listening.
            NmEvent::AddNodeLearnReady | NmEvent::AddNodeFound => {
                trace!("[NMS] Ignoring {:?} while idle", event);
                Step::Done
            }
            _ => Step::Unhandled,
        }
    }

    /// An S0 bootstrap started while learning: the S2 join must not proceed.
    fn on_s0_started(&mut self, env: &mut NmsEnv<'_>) -> Step {
        if matches!(
            self.session.state,
            NmState::LearnModeStarted | NmState::WaitForSecureLearn
        ) {
            info!("[NMS] S0 inclusion has started, aborting S2 join");
            env.host.set_pre_inclusion_nif(PreInclusionNif::S0);
            env.security.clear_network_keys(
                KeyClasses::S2_UNAUTHENTICATED
                    | KeyClasses::S2_AUTHENTICATED
                    | KeyClasses::S2_ACCESS,
            );
            env.security.abort_join();
            Step::Done
        } else {
            Step::Unhandled
        }
    }

    // --- Transition helpers ---

    /// Moves to `state`, replacing the state timer.
    pub(crate) fn enter(&mut self, env: &NmsEnv<'_>, state: NmState, timeout_ms: Option<u64>) {
        self.session.state = state;
        self.session.timer.cancel();
        if let Some(ms) = timeout_ms {
            self.session.timer.arm(env.now_ms, ms, state);
        }
    }

    /// Rearms the timer of the current state.
    pub(crate) fn rearm(&mut self, env: &NmsEnv<'_>, timeout_ms: u64) {
        let state = self.session.state;
        self.session.timer.arm(env.now_ms, timeout_ms, state);
    }

    /// Takes over the session as originated by the gateway itself, with the
    /// first unsolicited destination as peer and a random seq.
    pub(crate) fn use_unsolicited_as_peer(&mut self, env: &mut NmsEnv<'_>) {
        self.session.peer = self.config.unsolicited_destination.map(Peer::unsolicited);
        self.session.seq = env.host.random_u8();
    }
}
