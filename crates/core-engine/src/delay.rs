//! Timed one-shot callbacks, kept sorted by fire time.

use core_events::PositionRef;
use core_time::AbsoluteTime;

use crate::node::DelayCallback;

pub struct DelayEntry {
    pub time: AbsoluteTime,
    pub target: Option<PositionRef>,
    pub(crate) callback: DelayCallback,
}

impl DelayEntry {
    pub(crate) fn fire(
        self,
        engine: &mut crate::Engine,
        delays: &mut DelayList,
    ) {
        (self.callback)(engine, delays, self.target, self.time);
    }
}

/// Ascending by fire time; records with equal times fire in scheduling
/// order (insertion goes after existing equals).
#[derive(Default)]
pub struct DelayList {
    entries: Vec<DelayEntry>,
}

impl DelayList {
    pub fn new() -> Self {
        DelayList::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_time(&self) -> Option<AbsoluteTime> {
        self.entries.first().map(|e| e.time)
    }

    pub fn schedule(
        &mut self,
        time: AbsoluteTime,
        target: Option<PositionRef>,
        callback: impl FnOnce(&mut crate::Engine, &mut DelayList, Option<PositionRef>, AbsoluteTime)
        + 'static,
    ) {
        let index = self
            .entries
            .iter()
            .position(|e| e.time > time)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            index,
            DelayEntry {
                time,
                target,
                callback: Box::new(callback),
            },
        );
    }

    /// Pop the head if it is due. The dispatch loop calls this once per
    /// inner iteration; "fire exactly one" is what bounds work per tick.
    pub(crate) fn pop_due(&mut self, now: AbsoluteTime) -> Option<DelayEntry> {
        if self.entries.first()?.time <= now {
            Some(self.entries.remove(0))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> impl FnOnce(&mut crate::Engine, &mut DelayList, Option<PositionRef>, AbsoluteTime)
    {
        |_, _, _, _| {}
    }

    #[test]
    fn entries_sort_by_time_with_fifo_ties() {
        let mut delays = DelayList::new();
        let t1 = AbsoluteTime::new(1, 0);
        let t2 = AbsoluteTime::new(2, 0);
        delays.schedule(t2, None, noop());
        delays.schedule(t1, None, noop());
        delays.schedule(t1, Some(PositionRef::Node(core_events::NodeId::from_index(7))), noop());
        assert_eq!(delays.len(), 3);
        assert_eq!(delays.next_time(), Some(t1));
        let first = delays.pop_due(t2).unwrap();
        assert_eq!((first.time, first.target), (t1, None));
        let second = delays.pop_due(t2).unwrap();
        assert!(second.target.is_some(), "equal-time records fire in scheduling order");
        assert_eq!(delays.pop_due(t2).unwrap().time, t2);
        assert!(delays.is_empty());
    }

    #[test]
    fn pop_due_respects_the_deadline() {
        let mut delays = DelayList::new();
        delays.schedule(AbsoluteTime::new(5, 0), None, noop());
        assert!(delays.pop_due(AbsoluteTime::new(4, 999_999_999)).is_none());
        assert!(delays.pop_due(AbsoluteTime::new(5, 0)).is_some());
    }
}
