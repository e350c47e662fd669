//! Graph fabric: nodes, channels, slot arrays and the broadcast primitive.
//!
//! Nodes and channels live in slab arenas owned by the [`Graph`]; the ids
//! events carry ([`NodeId`]/[`ChannelId`] via `PositionRef`) are arena
//! indices. Cross-references between nodes and channels are these weak ids,
//! checked on use: a cleared endpoint simply drops the event on its next
//! hop.

use core_events::{ChannelId, EventKey, EventList, NodeId, PositionRef};
use smallvec::SmallVec;
use tracing::trace;

use crate::node::NodeBehavior;

/// Sparse array of output (or input) connectors. Storing at index `i`
/// grows the array to `i + 1`; empty slots stay addressable so broadcast
/// counts them as connectors with nothing attached.
#[derive(Debug, Default)]
pub struct SlotArray {
    slots: SmallVec<[Option<ChannelId>; 4]>,
}

impl SlotArray {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ChannelId> {
        self.slots.get(index).copied().flatten()
    }

    fn ensure(&mut self, index: usize) {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
    }

    fn set(&mut self, index: usize, channel: ChannelId) -> Option<ChannelId> {
        self.ensure(index);
        self.slots[index].replace(channel)
    }

    fn clear(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<ChannelId>> + '_ {
        self.slots.iter().copied()
    }
}

pub struct GraphNode {
    /// Vacated while a callback on this node is running.
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
    pub inputs: SlotArray,
    pub outputs: SlotArray,
    /// Gate set by a node that suspends itself (e.g. a window holding
    /// buffered events); any channel delivery to the node clears it.
    pub waiting_new_event: bool,
    /// Type name from the node's specification, for diagnostics.
    pub spec_name: &'static str,
}

/// Directed edge between two node connectors. Either endpoint may be
/// absent (cleared by slot displacement or node removal); an event reaching
/// an endless channel is destroyed.
#[derive(Debug, Clone, Copy)]
pub struct GraphChannel {
    pub start: Option<(NodeId, usize)>,
    pub end: Option<(NodeId, usize)>,
}

#[derive(Default)]
pub struct Graph {
    nodes: Vec<Option<GraphNode>>,
    free_nodes: Vec<usize>,
    channels: Vec<Option<GraphChannel>>,
    free_channels: Vec<usize>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn add_node(
        &mut self,
        spec_name: &'static str,
        behavior: Box<dyn NodeBehavior>,
    ) -> NodeId {
        let node = GraphNode {
            behavior: Some(behavior),
            inputs: SlotArray::default(),
            outputs: SlotArray::default(),
            waiting_new_event: false,
            spec_name,
        };
        let index = match self.free_nodes.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        NodeId::from_index(index)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.index())?.as_ref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id.index())?.as_mut()
    }

    pub fn channel(&self, id: ChannelId) -> Option<&GraphChannel> {
        self.channels.get(id.index())?.as_ref()
    }

    fn channel_mut(&mut self, id: ChannelId) -> Option<&mut GraphChannel> {
        self.channels.get_mut(id.index())?.as_mut()
    }

    /// Wire a channel between `start`'s output slot and `end`'s input slot
    /// (either endpoint may be absent). Displacing a channel that claimed
    /// the slot clears that channel's matching endpoint. The displaced
    /// channel is orphaned, not destroyed; destroying it is the caller's
    /// business.
    pub fn connect(
        &mut self,
        start: Option<(NodeId, usize)>,
        end: Option<(NodeId, usize)>,
    ) -> ChannelId {
        let channel = GraphChannel { start, end };
        let index = match self.free_channels.pop() {
            Some(i) => {
                self.channels[i] = Some(channel);
                i
            }
            None => {
                self.channels.push(Some(channel));
                self.channels.len() - 1
            }
        };
        let id = ChannelId::from_index(index);

        if let Some((node, slot)) = start {
            let displaced = self
                .node_mut(node)
                .and_then(|n| n.outputs.set(slot, id));
            if let Some(old) = displaced {
                if let Some(old_ch) = self.channel_mut(old) {
                    if old_ch.start == Some((node, slot)) {
                        old_ch.start = None;
                    }
                }
            }
        }
        if let Some((node, slot)) = end {
            let displaced = self.node_mut(node).and_then(|n| n.inputs.set(slot, id));
            if let Some(old) = displaced {
                if let Some(old_ch) = self.channel_mut(old) {
                    if old_ch.end == Some((node, slot)) {
                        old_ch.end = None;
                    }
                }
            }
        }
        id
    }

    /// Drop a channel, clearing the slots that reference it.
    pub fn remove_channel(&mut self, id: ChannelId) {
        let Some(channel) = self.channels.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if let Some((node, slot)) = channel.start {
            if let Some(n) = self.node_mut(node) {
                if n.outputs.get(slot) == Some(id) {
                    n.outputs.clear(slot);
                }
            }
        }
        if let Some((node, slot)) = channel.end {
            if let Some(n) = self.node_mut(node) {
                if n.inputs.get(slot) == Some(id) {
                    n.inputs.clear(slot);
                }
            }
        }
        self.free_channels.push(id.index());
    }

    /// Drop a node, detaching the endpoints of every incident channel.
    /// The node's behavior (and whatever resources it holds) is released
    /// here; channels survive as orphans.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        for ch in node.inputs.iter().flatten() {
            if let Some(channel) = self.channel_mut(ch) {
                if channel.end.map(|(n, _)| n) == Some(id) {
                    channel.end = None;
                }
            }
        }
        for ch in node.outputs.iter().flatten() {
            if let Some(channel) = self.channel_mut(ch) {
                if channel.start.map(|(n, _)| n) == Some(id) {
                    channel.start = None;
                }
            }
        }
        self.free_nodes.push(id.index());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }
}

/// Channel hop: decrement TTL (destroying the event when the budget runs
/// out), otherwise retarget the event at the channel's end node and clear
/// that node's waiting gate. Returns the rewind flag for the dispatcher:
/// `false` on a plain retarget because neighbouring list positions stay
/// valid.
pub(crate) fn handle_channel_event(
    graph: &mut Graph,
    events: &mut EventList,
    channel: ChannelId,
    key: EventKey,
) -> bool {
    let end = match graph.channel(channel) {
        Some(ch) => ch.end,
        None => None,
    };
    let Some(event) = events.get_mut(key) else {
        return true;
    };
    let ttl = event.data.ttl.saturating_sub(1);
    event.data.ttl = ttl;
    if ttl == 0 {
        trace!(target: "engine.graph", channel = channel.index(), "event exhausted its ttl");
        events.destroy(key);
        return true;
    }
    let Some((end_node, end_index)) = end else {
        events.destroy(key);
        return true;
    };
    event.position = Some(PositionRef::Node(end_node));
    event.input_index = end_index;
    if let Some(node) = graph.node_mut(end_node) {
        node.waiting_new_event = false;
    }
    false
}

/// The canonical transformer fan-out: with `k` connectors, replicate the
/// event `k - 1` times (the clones share its timestamp, forming a
/// contiguous run) and aim original-then-clones at connectors `0..k`.
/// Copies facing an empty slot are destroyed; `k == 0` consumes the event
/// outright. Callers mutate the event data *before* broadcasting so every
/// copy carries the post-transform data.
pub fn broadcast_forward(graph: &mut Graph, events: &mut EventList, node: NodeId, key: EventKey) {
    let count = match graph.node(node) {
        Some(n) => n.outputs.len(),
        None => 0,
    };
    if count == 0 {
        events.destroy(key);
        return;
    }
    if count > 1 {
        events.replicate(key, count - 1);
    }
    let mut cursor = Some(key);
    for index in 0..count {
        let Some(current) = cursor else {
            break;
        };
        let next = events.next(current);
        match graph.node(node).and_then(|n| n.outputs.get(index)) {
            Some(channel) => {
                if let Some(event) = events.get_mut(current) {
                    event.position = Some(PositionRef::Channel(channel));
                }
            }
            None => {
                events.destroy(current);
            }
        }
        cursor = next;
    }
}
