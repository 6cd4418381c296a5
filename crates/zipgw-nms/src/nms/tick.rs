// crates/zipgw-nms/src/nms/tick.rs
//! Time-based processing: the state timer, the deferred DSK abort, the
//! SmartStart middleware hold-off and the mailbox queue "waiting" acks.

use super::NetworkManagement;
use super::events::NmEvent;
use crate::hal::NmsEnv;
use log::{debug, trace};

impl NetworkManagement {
    /// Processes every deadline that has passed at `env.now_ms`.
    pub fn tick(&mut self, env: &mut NmsEnv<'_>) {
        let now = env.now_ms;

        // --- 1. State timer ---
        if self.session.timer.take_expired(now) {
            trace!("[NMS] Timer of {:?} expired at {}ms", self.session.state, now);
            self.post_event(env, NmEvent::Timeout);
        }

        // --- 2. Deferred rejection of a DSK challenge ---
        if self.deferred_abort_ms.is_some_and(|d| now >= d) {
            self.deferred_abort_ms = None;
            self.fire_deferred_abort(env);
        }

        // --- 3. SmartStart middleware probe hold-off ---
        if self.middleware.waiting && self.middleware.deadline_ms.is_some_and(|d| now >= d) {
            debug!("[NMS] Middleware probe hold-off ended");
            self.middleware = Default::default();
            self.smart_start_init_if_pending(env);
        }

        // --- 4. Mailbox queue ---
        let period = self.config.timeouts.queue_nak_waiting_ms;
        self.queue.tick(env.transport, now, period);
    }

    /// The earliest time at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.session.timer.deadline(),
            self.deferred_abort_ms,
            self.middleware.deadline_ms.filter(|_| self.middleware.waiting),
            self.queue.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}
