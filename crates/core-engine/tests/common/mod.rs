#![allow(dead_code)] // Shared across integration tests; each binary uses a subset.

use std::cell::RefCell;
use std::rc::Rc;

use core_engine::{Engine, HandleOutcome, NodeBehavior, NodeCtx};
use core_events::{EventData, EventKey, NodeId};
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

    pub fn entries(&self) -> Vec<(EventData, usize)> {
        self.log.borrow().clone()
    }

    pub fn payloads(&self) -> Vec<i64> {
        self.log.borrow().iter().map(|(d, _)| d.payload).collect()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }
}

/// Sink that logs and destroys everything it receives.
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

/// Pure pass-through transformer: broadcast to all outputs.
pub struct Forward;

impl NodeBehavior for Forward {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

pub fn forward_node(engine: &mut Engine) -> NodeId {
    engine.graph.add_node("forward", Box::new(Forward))
}

pub fn event_at(secs: i64, priority: i32, payload: i64, ttl: u32) -> EventData {
    EventData {
        priority,
        payload,
        ttl,
        time: AbsoluteTime::new(secs, 0),
        ..EventData::default()
    }
}
