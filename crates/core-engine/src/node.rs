//! The node-library contract: what a node type implements and what the
//! engine hands it while it runs.

use std::os::fd::RawFd;

use core_events::{EventKey, EventList, NodeId, PositionRef};
use core_predicate::{PredicateRegistry, PredicateTarget};

use crate::delay::DelayList;
use crate::dispatch::ProcessingState;
use crate::graph::{Graph, broadcast_forward};

/// What a node's event handler tells the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// This node does not handle events (pure sources). The dispatcher
    /// skips the event without counting work, so a lingering event at a
    /// source cannot spin the loop.
    Ignored,
    /// Only this event was consumed or advanced; the walk may continue
    /// from its successor.
    Continue,
    /// The list was mutated beyond this event; restart the walk.
    Rewind,
}

/// What an I/O callback tells the multiplexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoStatus {
    Continue,
    /// Disable this subscription; later polls ignore it. The error policy
    /// for failing descriptors.
    Disable,
}

/// Services available to a node callback. Disjoint `&mut` views into the
/// engine; the node's own behavior box is vacated for the duration of the
/// call, so `graph` access to *other* nodes is safe and access to itself
/// yields a node without behavior.
pub struct NodeCtx<'a> {
    /// The node being called.
    pub node: NodeId,
    pub events: &'a mut EventList,
    pub graph: &'a mut Graph,
    pub predicates: &'a mut PredicateRegistry,
    pub delays: &'a mut DelayList,
}

impl NodeCtx<'_> {
    pub fn outputs_len(&self) -> usize {
        self.graph.node(self.node).map_or(0, |n| n.outputs.len())
    }

    pub fn output(&self, index: usize) -> Option<core_events::ChannelId> {
        self.graph.node(self.node)?.outputs.get(index)
    }

    /// Fan the event out across this node's output connectors (the
    /// broadcast primitive). Mutate the event data first; copies share it.
    pub fn broadcast_forward(&mut self, event: EventKey) {
        broadcast_forward(self.graph, self.events, self.node, event);
    }

    /// Arm or clear this node's waiting gate. Only the node itself arms
    /// the gate; deliveries clear it.
    pub fn set_waiting(&mut self, waiting: bool) {
        if let Some(node) = self.graph.node_mut(self.node) {
            node.waiting_new_event = waiting;
        }
    }

    /// Predicate view of a live event.
    pub fn target(&self, event: EventKey) -> Option<PredicateTarget<'_>> {
        let ev = self.events.get(event)?;
        Some(PredicateTarget {
            data: &ev.data,
            input_index: ev.input_index,
        })
    }
}

/// Implemented by every node type. All methods have inert defaults: a
/// behavior with none overridden is a valid (if useless) node.
pub trait NodeBehavior {
    /// Invoked by the dispatch loop while the event is still in the list.
    /// The handler must destroy the event, move it (reassign its
    /// position), replicate around it, or suspend its position via the
    /// waiting gate; "do nothing" is reserved for [`HandleOutcome::Ignored`].
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        let _ = (ctx, event);
        HandleOutcome::Ignored
    }

    /// Invoked by the multiplexer when a subscribed descriptor is ready.
    fn handle_io(&mut self, ctx: &mut NodeCtx<'_>, fd: RawFd, is_write: bool) -> IoStatus {
        let _ = (ctx, fd, is_write);
        IoStatus::Continue
    }

    /// Subscribe this node's descriptors. Called once, after the whole
    /// graph is wired.
    fn register_io(&self, node: NodeId, state: &mut ProcessingState) {
        let _ = (node, state);
    }
}

/// A delay callback: fired at most once, with the engine, the delay list
/// (so periodic callbacks can re-arm), the scheduled target position and
/// the originally requested fire time.
pub type DelayCallback =
    Box<dyn FnOnce(&mut crate::Engine, &mut DelayList, Option<PositionRef>, core_time::AbsoluteTime)>;
