//! The event-routing engine core: graph fabric, I/O multiplexer, delay
//! list and the dispatch loop that ties them to the event list.
//!
//! There are no process-wide singletons. An [`Engine`] owns the event
//! list, the graph and the predicate registry; a
//! [`ProcessingState`](dispatch::ProcessingState) owns the descriptor
//! interest lists and the delay list. Both are plain values threaded
//! through every entry point, so one binary (or one test) can host any
//! number of independent engines.

pub mod builder;
pub mod delay;
pub mod dispatch;
pub mod graph;
pub mod io;
pub mod node;
pub mod spec;

pub use builder::{GraphBuildError, build_graph};
pub use delay::DelayList;
pub use dispatch::{ProcessingState, process_events_until, process_io, process_iteration};
pub use graph::{Graph, GraphChannel, GraphNode, SlotArray, broadcast_forward};
pub use io::{IoSubscription, IoSubscriptionList};
pub use node::{DelayCallback, HandleOutcome, IoStatus, NodeBehavior, NodeCtx};
pub use spec::{NodeCreateError, NodeCreateFn, NodeRegistry, NodeSpecification};

use core_events::EventList;
use core_predicate::PredicateRegistry;

/// Everything the dispatcher mutates that is not scheduling state: the
/// global event list, the node/channel arenas, and the predicate registry.
#[derive(Default)]
pub struct Engine {
    pub events: EventList,
    pub graph: Graph,
    pub predicates: PredicateRegistry,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }
}
