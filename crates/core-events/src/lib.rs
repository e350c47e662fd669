//! Core event model: modifier sets, event records, position references and
//! the process-global (per-engine) time-ordered event list.
//!
//! The event list is the spine of the dispatch loop: every in-flight event
//! lives in exactly one list, ordered by monotonic timestamp with FIFO ties,
//! and is addressed by an [`EventKey`] while handlers move it between graph
//! positions. Position references are the `Node`/`Channel` sum over arena
//! indices allocated by the graph fabric; keeping the reference type next to
//! [`Event`] mirrors the fact that an event's position is part of the event
//! record, not of the graph.

mod event;
mod list;
mod modifiers;

pub use event::{ChannelId, Event, EventCode, EventData, NodeId, PositionRef};
pub use list::{EventKey, EventList, Iter};
pub use modifiers::{MODIFIER_MAX, Modifier, ModifierOperation, ModifierSet};
