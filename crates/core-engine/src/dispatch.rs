//! The dispatch loop: one thread reconciling I/O readiness, due delays and
//! the priority-layered event stream.
//!
//! Each [`process_iteration`] tick: wait (bounded) for I/O, then alternate
//! firing at most one due delay with a priority-layered sweep of the event
//! list, draining readiness with zero-timeout polls between rounds, until
//! neither produced work. Layering guarantee: while priority-`p` events
//! run, no event with higher priority and an admissible timestamp is
//! pending; within a layer, events run in list (time, then FIFO) order.

use core_events::{EventKey, NodeId, PositionRef};
use core_time::{AbsoluteTime, RelativeTime};
use tracing::{trace, warn};

use crate::Engine;
use crate::delay::DelayList;
use crate::graph::handle_channel_event;
use crate::io::IoSubscriptionList;
use crate::node::{HandleOutcome, IoStatus, NodeCtx};

/// Scheduling state threaded through the loop: descriptor interest lists,
/// the delay list, and the per-tick scratch the dispatcher leaves behind.
pub struct ProcessingState {
    pub wait_input: IoSubscriptionList,
    pub wait_output: IoSubscriptionList,
    pub wait_delay: DelayList,
    /// Time the dispatcher has caught up to: the first still-pending
    /// event's timestamp, else the horizon of the last sweep.
    pub reached_time: AbsoluteTime,
    /// Priority layer of the sweep currently (or most recently) running.
    pub pass_priority: i32,
    /// Set when the last sweep stopped at an event beyond its horizon;
    /// makes the next tick poll I/O without blocking.
    pub has_future_events: bool,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingState {
    pub fn new() -> Self {
        ProcessingState {
            wait_input: IoSubscriptionList::new(),
            wait_output: IoSubscriptionList::new(),
            wait_delay: DelayList::new(),
            reached_time: AbsoluteTime::now(),
            pass_priority: 0,
            has_future_events: false,
        }
    }
}

/// Run a node's event handler with its behavior temporarily vacated, so
/// the callback gets unaliased `&mut` access to the whole engine.
fn dispatch_to_node(
    engine: &mut Engine,
    delays: &mut DelayList,
    node: NodeId,
    event: EventKey,
) -> HandleOutcome {
    let Some(mut behavior) = engine
        .graph
        .node_mut(node)
        .and_then(|n| n.behavior.take())
    else {
        return HandleOutcome::Ignored;
    };
    let outcome = behavior.handle_event(
        &mut NodeCtx {
            node,
            events: &mut engine.events,
            graph: &mut engine.graph,
            predicates: &mut engine.predicates,
            delays,
        },
        event,
    );
    if let Some(n) = engine.graph.node_mut(node) {
        n.behavior = Some(behavior);
    }
    outcome
}

fn dispatch_io(
    engine: &mut Engine,
    delays: &mut DelayList,
    node: NodeId,
    fd: std::os::fd::RawFd,
    is_write: bool,
) -> IoStatus {
    let Some(mut behavior) = engine
        .graph
        .node_mut(node)
        .and_then(|n| n.behavior.take())
    else {
        return IoStatus::Continue;
    };
    let status = behavior.handle_io(
        &mut NodeCtx {
            node,
            events: &mut engine.events,
            graph: &mut engine.graph,
            predicates: &mut engine.predicates,
            delays,
        },
        fd,
        is_write,
    );
    if let Some(n) = engine.graph.node_mut(node) {
        n.behavior = Some(behavior);
    }
    status
}

/// Wait up to `timeout` (`None` blocks indefinitely) for readiness on the
/// enabled subscriptions and run the ready callbacks. Callbacks create
/// events; the multiplexer itself never does. Returns `false` when the
/// poll itself failed (callbacks not run).
pub fn process_io(
    state: &mut ProcessingState,
    engine: &mut Engine,
    timeout: Option<RelativeTime>,
) -> bool {
    let mut pollfds: Vec<libc::pollfd> = Vec::new();
    // (is_write, index into the corresponding interest list)
    let mut origins: Vec<(bool, usize)> = Vec::new();
    for (index, sub) in state.wait_input.entries().iter().enumerate() {
        if sub.enabled {
            pollfds.push(libc::pollfd {
                fd: sub.fd,
                events: libc::POLLIN,
                revents: 0,
            });
            origins.push((false, index));
        }
    }
    for (index, sub) in state.wait_output.entries().iter().enumerate() {
        if sub.enabled {
            pollfds.push(libc::pollfd {
                fd: sub.fd,
                events: libc::POLLOUT,
                revents: 0,
            });
            origins.push((true, index));
        }
    }

    let timespec = timeout.map(RelativeTime::to_timespec);
    let timespec_ptr = timespec
        .as_ref()
        .map_or(std::ptr::null(), |ts| ts as *const libc::timespec);
    let pollfd_ptr = if pollfds.is_empty() {
        std::ptr::null_mut()
    } else {
        pollfds.as_mut_ptr()
    };
    // SAFETY: the pollfd buffer outlives the call and nfds matches its
    // length; the timespec (when present) is a live stack value.
    let ready = unsafe {
        libc::ppoll(
            pollfd_ptr,
            pollfds.len() as libc::nfds_t,
            timespec_ptr,
            std::ptr::null(),
        )
    };
    if ready < 0 {
        warn!(
            target: "engine.io",
            errno = std::io::Error::last_os_error().raw_os_error(),
            "poll failed"
        );
        return false;
    }
    if ready == 0 {
        return true;
    }

    for (pollfd, (is_write, index)) in pollfds.iter().zip(origins) {
        if pollfd.revents == 0 {
            continue;
        }
        let sub = if is_write {
            state.wait_output.entries()[index]
        } else {
            state.wait_input.entries()[index]
        };
        // A callback earlier in this pass may have disabled it.
        if !sub.enabled {
            continue;
        }
        let status = dispatch_io(engine, &mut state.wait_delay, sub.owner, sub.fd, is_write);
        if status == IoStatus::Disable {
            let entries = if is_write {
                state.wait_output.entries_mut()
            } else {
                state.wait_input.entries_mut()
            };
            entries[index].enabled = false;
            warn!(target: "engine.io", fd = sub.fd, "subscription disabled");
        }
    }
    true
}

fn process_single_scheduled(
    state: &mut ProcessingState,
    engine: &mut Engine,
    extern_time: AbsoluteTime,
) -> bool {
    let Some(entry) = state.wait_delay.pop_due(extern_time) else {
        return false;
    };
    trace!(target: "engine.dispatch", "firing delayed callback");
    entry.fire(engine, &mut state.wait_delay);
    true
}

/// Priority-layered sweep of the event list, handling every event up to
/// `max_time`. Returns true iff at least one handler did work.
///
/// Public so tests and embedders can drive dispatch without the blocking
/// I/O step of [`process_iteration`].
pub fn process_events_until(
    state: &mut ProcessingState,
    engine: &mut Engine,
    max_time: AbsoluteTime,
) -> bool {
    let mut stable = true;
    let mut next_priority: Option<i32> = None;
    state.has_future_events = false;

    // First scan: the highest outstanding priority within the horizon.
    let mut cursor = engine.events.first();
    while let Some(key) = cursor {
        let event = engine
            .events
            .get(key)
            .expect("event list cursor resolved to a vacant slot");
        if event.data.time > max_time {
            state.has_future_events = true;
            break;
        }
        let priority = event.data.priority;
        next_priority = Some(next_priority.map_or(priority, |p| p.max(priority)));
        cursor = engine.events.next(key);
    }

    while let Some(pass_priority) = next_priority {
        state.pass_priority = pass_priority;
        next_priority = None;

        let mut cursor = engine.events.first();
        'walk: while let Some(key) = cursor {
            let Some(event) = engine.events.get(key) else {
                break 'walk;
            };
            let priority = event.data.priority;
            let time = event.data.time;
            let position = event.position;

            if priority < pass_priority {
                // Feeds the next, lower layer. This happens before the
                // horizon break, so a lower layer seeded by a just-beyond-
                // horizon event costs one empty sweep and nothing else.
                if next_priority.is_none_or(|p| priority > p) {
                    next_priority = Some(priority);
                }
                cursor = engine.events.next(key);
                continue;
            }
            if priority > pass_priority {
                // Cannot occur after the first scan, but skipping is
                // idempotent.
                cursor = engine.events.next(key);
                continue;
            }

            let node = match position {
                None => {
                    cursor = engine.events.next(key);
                    continue;
                }
                Some(PositionRef::Channel(channel)) => {
                    if time > max_time {
                        state.has_future_events = true;
                        break 'walk;
                    }
                    stable = false;
                    if handle_channel_event(&mut engine.graph, &mut engine.events, channel, key) {
                        next_priority = None;
                        break 'walk;
                    }
                    cursor = engine.events.next(key);
                    continue;
                }
                Some(PositionRef::Node(node)) => node,
            };

            match engine.graph.node(node) {
                None => {
                    cursor = engine.events.next(key);
                    continue;
                }
                Some(n) if n.waiting_new_event => {
                    cursor = engine.events.next(key);
                    continue;
                }
                Some(_) => {}
            }
            if time > max_time {
                state.has_future_events = true;
                break 'walk;
            }

            match dispatch_to_node(engine, &mut state.wait_delay, node, key) {
                HandleOutcome::Ignored => {
                    cursor = engine.events.next(key);
                }
                HandleOutcome::Continue => {
                    stable = false;
                    if !engine.events.contains(key) {
                        // Contract violation: the handler destroyed the
                        // event it claimed to have merely advanced. Rewind
                        // instead of walking freed links.
                        warn!(
                            target: "engine.dispatch",
                            node = node.index(),
                            r#type = engine.graph.node(node).map_or("?", |n| n.spec_name),
                            "handler consumed an event but did not request a rewind"
                        );
                        next_priority = None;
                        break 'walk;
                    }
                    cursor = engine.events.next(key);
                }
                HandleOutcome::Rewind => {
                    stable = false;
                    next_priority = None;
                    break 'walk;
                }
            }
        }
    }

    state.reached_time = match engine.events.first() {
        Some(first) => engine
            .events
            .get(first)
            .map(|e| e.data.time)
            .unwrap_or(max_time),
        None => max_time,
    };

    !stable
}

/// One full tick: bounded I/O wait, then the delay/event inner loop.
pub fn process_iteration(state: &mut ProcessingState, engine: &mut Engine) {
    let extern_time = AbsoluteTime::now();

    let timeout = if state.has_future_events {
        Some(RelativeTime::ZERO)
    } else {
        state.wait_delay.next_time().map(|next| {
            let until = next - extern_time;
            if until.is_negative() {
                RelativeTime::ZERO
            } else {
                until
            }
        })
    };

    process_io(state, engine, timeout);

    loop {
        let had_scheduled = process_single_scheduled(state, engine, extern_time);

        // Events between "now" and the next scheduled delay may still run;
        // the horizon only ever moves forward. Full lexicographic compare,
        // seconds before nanoseconds.
        let mut max_event_time = extern_time;
        if let Some(next) = state.wait_delay.next_time() {
            if next > extern_time {
                max_event_time = next;
            }
        }

        let had_events = process_events_until(state, engine, max_event_time);
        if !had_scheduled && !had_events {
            break;
        }
        // Event processing may have unblocked descriptors; drain without
        // blocking before the next round.
        process_io(state, engine, Some(RelativeTime::ZERO));
    }
}
