//! Event records and the position references they carry.

use core_time::AbsoluteTime;

use crate::modifiers::ModifierSet;

/// Namespaced event code. Kernel input events map to `(ns, type, code)`;
/// synthetic sources pick their own namespaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventCode {
    pub ns: u32,
    pub major: u16,
    pub minor: u16,
}

impl EventCode {
    pub fn new(ns: u32, major: u16, minor: u16) -> Self {
        EventCode { ns, major, minor }
    }
}

/// The payload-carrying part of an event, copied whenever an event is
/// replicated. `ttl` is the remaining channel-hop budget; `priority`
/// selects the dispatch layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventData {
    pub code: EventCode,
    pub ttl: u32,
    pub priority: i32,
    pub payload: i64,
    pub modifiers: ModifierSet,
    pub time: AbsoluteTime,
}

/// Index of a node in the graph arena. Allocated by the graph fabric;
/// opaque everywhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a channel in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(u32);

impl ChannelId {
    pub fn from_index(index: usize) -> Self {
        ChannelId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an event currently sits: parked at a node or traversing a
/// channel. Both are "event positions" to the dispatcher; the uniformity
/// is what lets a channel hop be just another handler invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PositionRef {
    Node(NodeId),
    Channel(ChannelId),
}

/// A live event: data plus list/position bookkeeping. The list pointers
/// themselves live in the [`EventList`](crate::EventList) slots; `position`
/// is a weak reference (the graph owns nodes and channels, the list owns
/// events).
#[derive(Debug)]
pub struct Event {
    pub data: EventData,
    pub position: Option<PositionRef>,
    /// Input slot through which the event last entered its current node.
    pub input_index: usize,
}
