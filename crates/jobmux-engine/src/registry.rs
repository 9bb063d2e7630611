use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jobmux_core::Status;

use crate::cancel::CancelSignal;

/// The registry's per-id record: a [`Status`] plus the cancel action that
/// is present iff the job is `Running`.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct JobContext {
    pub(crate) status: Status,
    pub(crate) cancel: Option<CancelSignal>,
}

impl JobContext {
    pub(crate) fn pending() -> Self {
        Self {
            status: Status::Pending,
            cancel: None,
        }
    }

    pub(crate) fn running(signal: CancelSignal) -> Self {
        Self {
            status: Status::Running,
            cancel: Some(signal),
        }
    }

    pub(crate) fn canceled() -> Self {
        Self {
            status: Status::Canceled,
            cancel: None,
        }
    }
}

/// id -> [`JobContext`], exposing only the atomic primitives spec'd for
/// the registry. Every operation touches at most one shard's lock; there
/// is no coarse lock held across a queue operation.
pub(crate) struct Registry<I> {
    map: DashMap<I, JobContext>,
}

impl<I: Eq + Hash + Clone> Registry<I> {
    pub(crate) fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Inserts `ctx` iff no entry exists for `id`. Returns whether the
    /// insert happened.
    pub(crate) fn insert_if_absent(&self, id: I, ctx: JobContext) -> bool {
        match self.map.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(ctx);
                true
            }
        }
    }

    pub(crate) fn get(&self, id: &I) -> Option<JobContext> {
        self.map.get(id).map(|r| r.value().clone())
    }

    /// Compare-and-swap on the full `(status, cancel)` tuple, holding the
    /// shard's lock for the duration of the compare-then-mutate.
    pub(crate) fn replace_if_equal(&self, id: &I, expected: &JobContext, next: JobContext) -> bool {
        match self.map.get_mut(id) {
            Some(mut entry) if *entry.value() == *expected => {
                *entry.value_mut() = next;
                true
            }
            _ => false,
        }
    }

    /// Removes `id` iff its current context still equals `expected`.
    /// Required because ids are reusable once a job terminates: an
    /// unconditional remove could delete a fresh entry inserted by a
    /// racing resubmission.
    pub(crate) fn remove_if_equal(&self, id: &I, expected: &JobContext) -> bool {
        self.map.remove_if(id, |_, ctx| ctx == expected).is_some()
    }

    pub(crate) fn keys(&self) -> Vec<I> {
        self.map.iter().map(|r| r.key().clone()).collect()
    }

    /// Unconditional remove-all, used only by shutdown.
    pub(crate) fn clear(&self) {
        self.map.clear();
    }
}
