//! Descriptor-interest bookkeeping for the multiplexer.

use std::os::fd::RawFd;

use core_events::NodeId;

/// One descriptor a node wants watched. `enabled` flips off on I/O errors
/// (the subscription outlives the failure so indices stay stable).
#[derive(Debug, Clone, Copy)]
pub struct IoSubscription {
    pub fd: RawFd,
    pub owner: NodeId,
    pub enabled: bool,
}

/// Growable interest list; one exists for reads and one for writes.
#[derive(Debug, Default)]
pub struct IoSubscriptionList {
    entries: Vec<IoSubscription>,
}

impl IoSubscriptionList {
    pub fn new() -> Self {
        IoSubscriptionList::default()
    }

    pub fn add(&mut self, fd: RawFd, owner: NodeId) {
        self.entries.push(IoSubscription {
            fd,
            owner,
            enabled: true,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IoSubscription] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [IoSubscription] {
        &mut self.entries
    }
}
