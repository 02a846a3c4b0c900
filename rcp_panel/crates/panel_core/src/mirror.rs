use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::param::{ParamId, ParameterRef};
use crate::scheduler::BatchScheduler;

/// An immutable published list of root parameters.
pub type Snapshot = Rc<[ParameterRef]>;

/// Local copy of the remote root-parameter set.
///
/// Notifications mutate a private working list; the renderer only ever sees
/// snapshots, and a new snapshot is cut each time one of the batch timers
/// fires. Nested parameters are never listed here, they stay reachable
/// through their group.
pub struct ParameterMirror {
    working: Vec<ParameterRef>,
    published: Snapshot,
    scheduler: BatchScheduler,
}

impl ParameterMirror {
    pub fn new(window: Duration) -> Self {
        Self {
            working: Vec::new(),
            published: empty(),
            scheduler: BatchScheduler::new(window),
        }
    }

    pub fn on_added(&mut self, param: ParameterRef, now: Instant) {
        if param.is_root() && !self.contains(param.id()) {
            debug!(id = %param.id(), "root parameter added");
            self.working.push(param);
        }
        self.scheduler.note_addition(now);
    }

    pub fn on_removed(&mut self, param: &ParameterRef, now: Instant) {
        if let Some(pos) = self.working.iter().position(|p| p.id() == param.id()) {
            debug!(id = %param.id(), "root parameter removed");
            self.working.remove(pos);
        }
        self.scheduler.note_removal(now);
    }

    /// Publishes the working list if a batch timer is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.scheduler.poll(now) {
            return false;
        }
        self.published = Rc::from(self.working.as_slice());
        debug!(roots = self.published.len(), "published parameter batch");
        true
    }

    /// Drops every parameter and pending timer, publishing an empty list
    /// immediately.
    pub fn clear(&mut self) {
        self.scheduler.cancel();
        self.working.clear();
        self.published = empty();
    }

    pub fn published(&self) -> Snapshot {
        Rc::clone(&self.published)
    }

    pub fn working_ids(&self) -> Vec<ParamId> {
        self.working.iter().map(|p| p.id()).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.scheduler.is_idle()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    fn contains(&self, id: ParamId) -> bool {
        self.working.iter().any(|p| p.id() == id)
    }
}

fn empty() -> Snapshot {
    Rc::from(Vec::new())
}
