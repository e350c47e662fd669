#![allow(dead_code)] // Shared across integration tests; each binary uses a subset.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::AHashMap;
use core_config::{ConstantRegistry, InitEnv, NodeConfig};
use core_engine::{
    Engine, HandleOutcome, NodeBehavior, NodeCtx, NodeSpecification, ProcessingState,
    process_events_until,
};
use core_events::{EventData, EventKey, NodeId, PositionRef};
use core_predicate::PredicateHandle;
use core_time::AbsoluteTime;

/// Shared view into what a [`RecordingSink`] consumed.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Vec<(EventData, usize)>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<EventData> {
        self.log.borrow().iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn payloads(&self) -> Vec<i64> {
        self.log.borrow().iter().map(|(d, _)| d.payload).collect()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }
}

pub struct RecordingSink {
    log: Rc<RefCell<Vec<(EventData, usize)>>>,
}

impl NodeBehavior for RecordingSink {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        let Some(ev) = ctx.events.get(event) else {
            return HandleOutcome::Ignored;
        };
        self.log.borrow_mut().push((ev.data.clone(), ev.input_index));
        ctx.events.destroy(event);
        HandleOutcome::Rewind
    }
}

pub fn recording_sink(engine: &mut Engine) -> (NodeId, Recorder) {
    let recorder = Recorder::default();
    let id = engine.graph.add_node(
        "recording_sink",
        Box::new(RecordingSink {
            log: recorder.log.clone(),
        }),
    );
    (id, recorder)
}

/// Pass-through that counts its invocations; used to observe cycle
/// damping.
pub struct CountingTee {
    count: Rc<Cell<usize>>,
}

impl NodeBehavior for CountingTee {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        self.count.set(self.count.get() + 1);
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

pub fn counting_tee(engine: &mut Engine) -> (NodeId, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    let id = engine.graph.add_node(
        "counting_tee",
        Box::new(CountingTee {
            count: count.clone(),
        }),
    );
    (id, count)
}

/// Instantiate a catalog node from an inline TOML options snippet.
pub fn create_node(engine: &mut Engine, spec: &NodeSpecification, options: &str) -> NodeId {
    let mut names = AHashMap::new();
    create_node_with(engine, spec, options, &mut names)
}

/// Same, with a caller-provided predicate name table (for nodes that
/// reference named predicates).
pub fn create_node_with(
    engine: &mut Engine,
    spec: &NodeSpecification,
    options: &str,
    names: &mut AHashMap<String, PredicateHandle>,
) -> NodeId {
    let text = if options.is_empty() {
        format!("type = \"{}\"\n", spec.name)
    } else {
        format!("type = \"{}\"\n[options]\n{}\n", spec.name, options)
    };
    let config: NodeConfig = toml::from_str(&text).expect("node config snippet");
    let constants = ConstantRegistry::new();
    let mut env = InitEnv {
        constants: &constants,
        predicate_names: names,
        predicates: &mut engine.predicates,
    };
    let behavior = (spec.create)(&config, &mut env).expect("node creation");
    engine.graph.add_node(spec.name, behavior)
}

pub fn event(secs: i64, payload: i64, ttl: u32) -> EventData {
    EventData {
        payload,
        ttl,
        priority: 10,
        time: AbsoluteTime::new(secs, 0),
        ..EventData::default()
    }
}

pub fn inject(engine: &mut Engine, position: PositionRef, data: EventData) -> EventKey {
    let key = engine.events.create(data);
    engine
        .events
        .get_mut(key)
        .expect("freshly created event")
        .position = Some(position);
    key
}

pub fn horizon() -> AbsoluteTime {
    AbsoluteTime::new(1_000_000, 0)
}

/// Re-invoke the sweep until it settles, the way the iteration loop does
/// after every rewind.
pub fn drain(state: &mut ProcessingState, engine: &mut Engine) {
    let mut passes = 0;
    while process_events_until(state, engine, horizon()) {
        passes += 1;
        assert!(passes < 10_000, "dispatch failed to make forward progress");
    }
}
