//! The time-ordered doubly linked event list.
//!
//! Slab storage with a cyclic sentinel at slot 0: every live event occupies
//! one slot whose `prev`/`next` fields link it into a list satisfying the
//! ordering invariant: for neighbours `a -> b`, `a.time <= b.time`.
//! Insertion scans from the tail, so events stamped "now" land in O(1) and
//! equal-time events keep FIFO order. Slots are recycled through a free
//! list; an [`EventKey`] is a plain slot index and becomes dangling once the
//! event is destroyed, which is why handlers must not hoard keys across
//! destruction points they do not control.

use core_time::AbsoluteTime;

use crate::event::{Event, EventData};

const SENTINEL: u32 = 0;

/// Handle to a live event in an [`EventList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventKey(u32);

#[derive(Debug)]
struct Slot {
    prev: u32,
    next: u32,
    event: Option<Event>,
}

#[derive(Debug)]
pub struct EventList {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Default for EventList {
    fn default() -> Self {
        Self::new()
    }
}

impl EventList {
    pub fn new() -> Self {
        EventList {
            slots: vec![Slot {
                prev: SENTINEL,
                next: SENTINEL,
                event: None,
            }],
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, key: EventKey) -> bool {
        self.slots
            .get(key.0 as usize)
            .is_some_and(|s| s.event.is_some())
    }

    pub fn get(&self, key: EventKey) -> Option<&Event> {
        self.slots.get(key.0 as usize)?.event.as_ref()
    }

    pub fn get_mut(&mut self, key: EventKey) -> Option<&mut Event> {
        self.slots.get_mut(key.0 as usize)?.event.as_mut()
    }

    pub fn first(&self) -> Option<EventKey> {
        self.neighbour(self.slots[SENTINEL as usize].next)
    }

    pub fn last(&self) -> Option<EventKey> {
        self.neighbour(self.slots[SENTINEL as usize].prev)
    }

    pub fn next(&self, key: EventKey) -> Option<EventKey> {
        let slot = self.slots.get(key.0 as usize)?;
        slot.event.as_ref()?;
        self.neighbour(slot.next)
    }

    pub fn prev(&self, key: EventKey) -> Option<EventKey> {
        let slot = self.slots.get(key.0 as usize)?;
        slot.event.as_ref()?;
        self.neighbour(slot.prev)
    }

    fn neighbour(&self, idx: u32) -> Option<EventKey> {
        if idx == SENTINEL { None } else { Some(EventKey(idx)) }
    }

    fn slot_time(&self, idx: u32) -> AbsoluteTime {
        self.slots[idx as usize]
            .event
            .as_ref()
            .expect("event list linkage points at a vacant slot")
            .data
            .time
    }

    fn alloc(&mut self, event: Event) -> u32 {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize].event = Some(event);
                idx
            }
            None => {
                self.slots.push(Slot {
                    prev: SENTINEL,
                    next: SENTINEL,
                    event: Some(event),
                });
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn link_after(&mut self, anchor: u32, idx: u32) {
        let anchor_next = self.slots[anchor as usize].next;
        self.slots[idx as usize].prev = anchor;
        self.slots[idx as usize].next = anchor_next;
        self.slots[anchor_next as usize].prev = idx;
        self.slots[anchor as usize].next = idx;
        self.len += 1;
    }

    /// Insert a new event at the unique position preserving the time
    /// ordering invariant, scanning backwards from the tail. The event
    /// starts with no position and input index 0; callers assign both.
    pub fn create(&mut self, data: EventData) -> EventKey {
        let time = data.time;
        let mut anchor = self.slots[SENTINEL as usize].prev;
        while anchor != SENTINEL && self.slot_time(anchor) > time {
            anchor = self.slots[anchor as usize].prev;
        }
        let idx = self.alloc(Event {
            data,
            position: None,
            input_index: 0,
        });
        self.link_after(anchor, idx);
        EventKey(idx)
    }

    /// Convenience for sources: a default event stamped with the current
    /// monotonic time.
    pub fn create_at_now(&mut self) -> EventKey {
        self.create(EventData {
            time: AbsoluteTime::now(),
            ..EventData::default()
        })
    }

    /// Insert `count` copies of `source` directly after it. Replicas share
    /// the source's timestamp (forming a contiguous equal-time run), start
    /// with no position and input index 0, and are laid out in creation
    /// order. Returns the number of replicas created: 0 when `source` is
    /// not a live event.
    pub fn replicate(&mut self, source: EventKey, count: usize) -> usize {
        if !self.contains(source) {
            return 0;
        }
        let mut cursor = source.0;
        for _ in 0..count {
            let data = self.slots[source.0 as usize]
                .event
                .as_ref()
                .expect("source vanished mid-replication")
                .data
                .clone();
            let idx = self.alloc(Event {
                data,
                position: None,
                input_index: 0,
            });
            self.link_after(cursor, idx);
            cursor = idx;
        }
        count
    }

    /// Unlink and free. Returns false when the key was already dead, which
    /// the dispatcher uses to detect handler contract violations.
    pub fn destroy(&mut self, key: EventKey) -> bool {
        let idx = key.0 as usize;
        if key.0 == SENTINEL || self.slots.get(idx).is_none_or(|s| s.event.is_none()) {
            return false;
        }
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        self.slots[prev as usize].next = next;
        self.slots[next as usize].prev = prev;
        self.slots[idx].prev = SENTINEL;
        self.slots[idx].next = SENTINEL;
        self.slots[idx].event = None;
        self.free.push(key.0);
        self.len -= 1;
        true
    }

    /// Drain the whole list head-first. A head that survives its own
    /// destruction means the linkage is corrupt; that is a core bug and
    /// aborts rather than being masked.
    pub fn destroy_all(&mut self) {
        while let Some(first) = self.first() {
            self.destroy(first);
            if self.first() == Some(first) {
                panic!("broken doubly linked event list invariant");
            }
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.first(),
        }
    }
}

pub struct Iter<'a> {
    list: &'a EventList,
    cursor: Option<EventKey>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (EventKey, &'a Event);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let event = self.list.get(key)?;
        self.cursor = self.list.next(key);
        Some((key, event))
    }
}
