//! Pending-query queue with a one-way FIFO to LIFO switch
//!
//! The crawl starts breadth-first so the classifier sees a wide variety of
//! result counts early. Once the queue reaches the staging threshold it
//! turns depth-first for the rest of the crawl, draining branches to
//! completion and keeping the queue from growing without bound. The switch
//! never reverts, even if the queue shrinks again.

use crate::state::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Order in which pending queries are taken from the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueOrder {
    /// Staging phase: oldest query first
    Fifo,

    /// Bulk phase: newest query first
    Lifo,
}

/// Queue of query nodes waiting to be fetched
#[derive(Debug, Clone)]
pub struct WorkQueue {
    /// Pending nodes; FIFO pops from the front, LIFO from the back
    pending: VecDeque<NodeId>,

    /// Current ordering policy
    order: QueueOrder,

    /// Queue length that triggers the switch to LIFO
    staging_threshold: usize,
}

impl WorkQueue {
    /// Creates an empty queue in the staging (FIFO) phase
    pub fn new(staging_threshold: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            order: QueueOrder::Fifo,
            staging_threshold,
        }
    }

    /// Rebuilds a queue from snapshot contents
    ///
    /// `pending` is in pop-independent storage order, exactly as returned
    /// by [`WorkQueue::pending`].
    pub fn from_parts(pending: Vec<NodeId>, order: QueueOrder, staging_threshold: usize) -> Self {
        Self {
            pending: pending.into(),
            order,
            staging_threshold,
        }
    }

    /// Enqueues a freshly expanded set of children
    ///
    /// Under FIFO the children are appended in alphabet order. Under LIFO
    /// they are appended reversed, so popping still descends alphabetically.
    pub fn push_children(&mut self, children: &[NodeId]) {
        match self.order {
            QueueOrder::Fifo => self.pending.extend(children.iter().copied()),
            QueueOrder::Lifo => self.pending.extend(children.iter().rev().copied()),
        }
        tracing::trace!(
            "Queued {} children ({:?}), {} pending",
            children.len(),
            self.order,
            self.pending.len()
        );
    }

    /// Puts back queries that were dispatched but never resolved
    ///
    /// Under FIFO they go to the front, keeping their original order, so
    /// they are retried first. Under LIFO they go to the back, which is also
    /// the next place popped from.
    pub fn requeue(&mut self, nodes: &[NodeId]) {
        match self.order {
            QueueOrder::Fifo => {
                for node in nodes.iter().rev() {
                    self.pending.push_front(*node);
                }
            }
            QueueOrder::Lifo => self.pending.extend(nodes.iter().copied()),
        }
    }

    /// Switches to LIFO once the staging threshold is reached
    ///
    /// # Returns
    ///
    /// `true` if this call performed the switch
    pub fn apply_staging_policy(&mut self) -> bool {
        if self.order == QueueOrder::Fifo && self.pending.len() >= self.staging_threshold {
            self.order = QueueOrder::Lifo;
            tracing::info!(
                "Staging threshold of {} pending queries reached, switching to depth-first order",
                self.staging_threshold
            );
            return true;
        }
        false
    }

    /// Takes the next query according to the current order
    pub fn pop(&mut self) -> Option<NodeId> {
        self.apply_staging_policy();
        match self.order {
            QueueOrder::Fifo => self.pending.pop_front(),
            QueueOrder::Lifo => self.pending.pop_back(),
        }
    }

    /// Takes up to `limit` queries
    pub fn pop_batch(&mut self, limit: usize) -> Vec<NodeId> {
        let mut batch = Vec::with_capacity(limit.min(self.pending.len()));
        while batch.len() < limit {
            match self.pop() {
                Some(node) => batch.push(node),
                None => break,
            }
        }
        batch
    }

    /// Returns true if `node` is waiting in the queue
    pub fn contains(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    /// Pending nodes in storage order
    pub fn pending(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pending.iter().copied()
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }

    pub fn staging_threshold(&self) -> usize {
        self.staging_threshold
    }

    /// Returns the number of pending queries
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
