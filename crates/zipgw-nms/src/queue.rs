// crates/zipgw-nms/src/queue.rs
//! Postponed network management commands for sleeping (mailbox) nodes.
//!
//! A command whose target node is asleep is parked here until the node is
//! seen awake. While parked, the requesting client periodically receives a
//! "waiting" acknowledgement so it does not give up on the request.

use crate::hal::{NmsError, ReplyTransport, ZipAck};
use crate::types::{NodeId, Peer};
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use log::{debug, error, trace};

/// A command waiting for its target node to wake up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub node: NodeId,
    pub peer: Peer,
    /// The request frame as received.
    pub frame: Vec<u8>,
    /// When the next "waiting" acknowledgement is due.
    next_waiting_ms: u64,
}

/// Bounded FIFO of postponed commands.
#[derive(Debug, Default)]
pub struct NmQueue {
    entries: VecDeque<QueuedCommand>,
    /// The node whose queued commands are currently being executed.
    executing: NodeId,
}

impl NmQueue {
    /// Maximum number of postponed commands.
    pub const CAPACITY: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn executing_node(&self) -> NodeId {
        self.executing
    }

    pub(crate) fn set_executing(&mut self, node: NodeId) {
        self.executing = node;
    }

    /// Parks `frame` for `node` and tells the client to wait.
    pub fn push(
        &mut self,
        transport: &mut dyn ReplyTransport,
        now_ms: u64,
        waiting_period_ms: u64,
        node: NodeId,
        peer: Peer,
        frame: &[u8],
    ) -> Result<(), NmsError> {
        if self.entries.len() >= Self::CAPACITY {
            error!("[NMS-Queue] Unable to queue command for node {}: queue full", node);
            return Err(NmsError::QueueFull);
        }
        transport.send_ack(&peer, ZipAck::Waiting);
        self.entries.push_back(QueuedCommand {
            node,
            peer,
            frame: frame.to_vec(),
            next_waiting_ms: now_ms.saturating_add(waiting_period_ms),
        });
        debug!(
            "[NMS-Queue] Queued command {:02X?} for mailbox node {} ({} queued)",
            frame.get(..2).unwrap_or(frame),
            node,
            self.entries.len()
        );
        Ok(())
    }

    /// The first command queued for `node`.
    pub fn front_for(&self, node: NodeId) -> Option<&QueuedCommand> {
        self.entries.iter().find(|e| e.node == node)
    }

    /// Takes the first command queued for `node` out of the queue without
    /// answering its client.
    pub(crate) fn take_front_for(&mut self, node: NodeId) -> Option<QueuedCommand> {
        let index = self.entries.iter().position(|e| e.node == node)?;
        self.entries.remove(index)
    }

    /// Puts back a command taken with [`take_front_for`](Self::take_front_for)
    /// that could not run.
    pub(crate) fn restore_front(&mut self, entry: QueuedCommand) {
        self.entries.push_front(entry);
    }

    /// Removes the first command queued for `node`, answering its client
    /// with `ack`.
    pub(crate) fn remove_front_for(
        &mut self,
        transport: &mut dyn ReplyTransport,
        node: NodeId,
        ack: ZipAck,
    ) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.node == node) else {
            return false;
        };
        if let Some(entry) = self.entries.remove(index) {
            transport.send_ack(&entry.peer, ack);
        }
        true
    }

    /// Drops every command for `node`, rejecting each one. Returns how many
    /// were dropped.
    pub fn purge_node(&mut self, transport: &mut dyn ReplyTransport, node: NodeId) -> usize {
        let mut purged = 0;
        while self.remove_front_for(transport, node, ZipAck::Nak) {
            purged += 1;
        }
        if purged > 0 {
            debug!("[NMS-Queue] Purged {} command(s) for node {}", purged, node);
        }
        purged
    }

    /// Drops every queued command, rejecting each one.
    pub fn purge_all(&mut self, transport: &mut dyn ReplyTransport) {
        while let Some(entry) = self.entries.pop_front() {
            transport.send_ack(&entry.peer, ZipAck::Nak);
        }
    }

    /// Repeats the "waiting" acknowledgement for every command whose period
    /// has elapsed.
    pub fn tick(&mut self, transport: &mut dyn ReplyTransport, now_ms: u64, period_ms: u64) {
        for entry in self.entries.iter_mut() {
            if now_ms >= entry.next_waiting_ms {
                trace!("[NMS-Queue] Still waiting for node {}", entry.node);
                transport.send_ack(&entry.peer, ZipAck::Waiting);
                entry.next_waiting_ms = now_ms.saturating_add(period_ms);
            }
        }
    }

    /// The earliest pending "waiting" acknowledgement.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.next_waiting_ms).min()
    }
}
