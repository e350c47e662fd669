//! Time/count-bounded replay buffer.
//!
//! Events are forwarded on arrival and simultaneously parked in an
//! internal buffer; the events themselves stay in the engine's event list,
//! positioned at this node behind the waiting gate. When the buffer
//! exceeds its length bound or its oldest entry falls out of the time
//! bound, the window "triggers": an optional terminator event is emitted,
//! the window start advances by the configured step (jumping windows step
//! over the whole buffer, sliding ones by a single event, either extended
//! by `additional_step`; stepped-over events are destroyed, and any step
//! remainder consumes that many future arrivals), and the surviving
//! buffer is re-broadcast stamped with the trigger time so the event
//! list's time ordering is preserved.

use ahash::AHashSet;
use std::collections::VecDeque;

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::{EventCode, EventData, EventKey, ModifierSet};
use core_time::RelativeTime;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "window",
    documentation: "Passes events through while copying them into an internal buffer; when the buffer length or time span threshold is met, optionally sends a terminator event, advances the window start by ((is_jumping ? buffer length : 1) + additional_step) events and retransmits the remaining buffered events\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors\n\
                    Option 'is_jumping' (optional): whether to send events at most once\n\
                    Option 'additional_step' (optional): natural number, additional step relative to a regular sliding/jumping window\n\
                    Option 'max_length' (optional): natural number, maximum number of events in a window\n\
                    Option 'max_milliseconds' (optional): natural number, maximum number of milliseconds between the first and the last event in a window\n\
                    Option 'terminator' (optional): event to send after the window fullness condition is met:\n\
                    \tField 'namespace' (optional): set generated event code namespace\n\
                    \tField 'major' (optional): set generated event code major\n\
                    \tField 'minor' (optional): set generated event code minor\n\
                    \tField 'payload' (optional): set generated event payload",
    create,
};

struct TerminatorProto {
    code: EventCode,
    payload: i64,
}

struct Window {
    terminator: Option<TerminatorProto>,
    is_jumping: bool,
    max_time: Option<RelativeTime>,
    max_length: Option<usize>,
    additional_step: usize,
    /// Step remainder once the buffer ran dry: that many upcoming
    /// arrivals are consumed instead of windowed.
    skip_next: usize,
    buffer: VecDeque<EventKey>,
    buffered: AHashSet<EventKey>,
}

impl Window {
    /// Close the current window relative to `base` (the data of the event
    /// that caused the trigger): emit the terminator, advance the start,
    /// replay the survivors at the trigger's timestamp.
    fn trigger(&mut self, ctx: &mut NodeCtx<'_>, base: &EventData) {
        if let Some(proto) = &self.terminator {
            let key = ctx.events.create(EventData {
                code: proto.code,
                payload: proto.payload,
                modifiers: ModifierSet::new(),
                ttl: base.ttl,
                priority: base.priority,
                time: base.time,
            });
            ctx.broadcast_forward(key);
        }

        let mut step = if self.is_jumping { self.buffer.len() } else { 1 };
        step += self.additional_step;
        step = step.max(1);

        while step > 0 {
            let Some(old) = self.buffer.pop_front() else {
                break;
            };
            step -= 1;
            self.buffered.remove(&old);
            ctx.events.destroy(old);
        }
        self.skip_next += step;

        for index in 0..self.buffer.len() {
            let old = self.buffer[index];
            let Some(orig) = ctx.events.get(old) else {
                continue;
            };
            let replay = EventData {
                time: base.time,
                ..orig.data.clone()
            };
            let key = ctx.events.create(replay);
            ctx.broadcast_forward(key);
        }
    }
}

impl NodeBehavior for Window {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        // Buffered events are re-examined whenever a delivery re-opens the
        // gate; they are not new arrivals.
        if self.buffered.contains(&event) {
            return HandleOutcome::Continue;
        }
        let Some(ev) = ctx.events.get(event) else {
            return HandleOutcome::Ignored;
        };
        let base = ev.data.clone();

        if let Some(threshold) = self.max_time {
            while let Some(&oldest) = self.buffer.front() {
                let Some(first) = ctx.events.get(oldest) else {
                    // A buffered key that no longer resolves is stale
                    // bookkeeping; drop it and keep scanning.
                    self.buffer.pop_front();
                    self.buffered.remove(&oldest);
                    continue;
                };
                if base.time - first.data.time <= threshold {
                    break;
                }
                self.trigger(ctx, &base);
            }
        }

        if self.skip_next > 0 {
            self.skip_next -= 1;
            ctx.events.destroy(event);
            ctx.set_waiting(true);
            return HandleOutcome::Rewind;
        }

        // Forward a copy downstream, then park the original here. The copy
        // is created (not replicated) so it lands after any replays the
        // eviction above produced at the same timestamp.
        let copy = ctx.events.create(base.clone());
        ctx.broadcast_forward(copy);
        self.buffer.push_back(event);
        self.buffered.insert(event);

        if let Some(limit) = self.max_length {
            while self.buffer.len() >= limit {
                self.trigger(ctx, &base);
            }
        }

        ctx.set_waiting(true);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let max_length = config.option("max_length").and_then(|value| {
        let length = env.resolve_constant(Some(value));
        (length > 0).then_some(length as usize)
    });
    let max_time = config.option("max_milliseconds").and_then(|value| {
        let millis = env.resolve_constant(Some(value)).max(0);
        Some(RelativeTime::from_millis(millis))
    });
    let terminator = config.option("terminator").map(|setting| TerminatorProto {
        code: EventCode::new(
            env.resolve_constant(setting.get("namespace")) as u32,
            env.resolve_constant(setting.get("major")) as u16,
            env.resolve_constant(setting.get("minor")) as u16,
        ),
        payload: env.resolve_constant(setting.get("payload")),
    });

    Ok(Box::new(Window {
        terminator,
        is_jumping: env.resolve_constant(config.option("is_jumping")) != 0,
        max_time,
        max_length,
        additional_step: env.resolve_constant(config.option("additional_step")).max(0) as usize,
        skip_next: 0,
        buffer: VecDeque::new(),
        buffered: AHashSet::new(),
    }))
}
