//! Deferred register writes.
//!
//! Some row transfers must happen exactly one tick after the event that
//! triggers them (the seed capture after the first row's rule pass, the
//! restore of the scan-out row after vsync edits, the late re-arm of the
//! opening freeze). They are queued here tagged with the tick on which they
//! fire. Due actions come back in a fixed priority order so that a later
//! action in that order overrides an earlier one writing the same register.

use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};

/// Maximum number of writes that can be in flight at once.
pub const SCHEDULE_CAPACITY: usize = 8;

/// A one-shot row or control transfer.
///
/// Declaration order is application order: `RestoreActive` is applied before
/// `BackcopyTopline`, so a backcopy is never overwritten by a same-tick copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Deferred {
    /// `active_line <= topline`
    RestoreActive,
    /// `topline <= active_line`
    BackcopyTopline,
    /// Re-arm the opening freeze countdown.
    RearmOpening,
}

/// Pending deferred writes, each tagged with its firing tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<(u64, Deferred)>", into = "Vec<(u64, Deferred)>")]
pub struct Schedule {
    pending: FixedVec<(u64, Deferred), SCHEDULE_CAPACITY>,
}

impl Schedule {
    pub fn new() -> Self {
        Schedule { pending: FixedVec::new() }
    }

    /// Queue `action` to fire during tick `at`. Duplicate requests collapse.
    pub fn push(&mut self, at: u64, action: Deferred) {
        if self.pending.iter().any(|&(t, a)| t == at && a == action) {
            return;
        }
        if self.pending.push((at, action)).is_err() {
            log::error!("deferred write queue full, dropping {:?} at tick {}", action, at);
        }
    }

    /// Remove every action due at or before `now`, in application order.
    pub fn take_due(&mut self, now: u64) -> FixedVec<Deferred, SCHEDULE_CAPACITY> {
        let mut due: FixedVec<Deferred, SCHEDULE_CAPACITY> = FixedVec::new();
        if self.pending.iter().all(|&(at, _)| at > now) {
            return due;
        }
        let mut keep: FixedVec<(u64, Deferred), SCHEDULE_CAPACITY> = FixedVec::new();
        for &(at, action) in self.pending.iter() {
            // Both vectors share the source capacity, so these pushes cannot fail.
            if at <= now {
                let _ = due.push(action);
            } else {
                let _ = keep.push((at, action));
            }
        }
        self.pending = keep;
        due.sort_unstable();
        due
    }

    /// Whether `action` is queued for any tick.
    pub fn contains(&self, action: Deferred) -> bool {
        self.pending.iter().any(|&(_, a)| a == action)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl From<Vec<(u64, Deferred)>> for Schedule {
    fn from(entries: Vec<(u64, Deferred)>) -> Self {
        let mut s = Schedule::new();
        for (at, action) in entries {
            s.push(at, action);
        }
        s
    }
}

impl From<Schedule> for Vec<(u64, Deferred)> {
    fn from(s: Schedule) -> Self {
        s.pending.iter().copied().collect()
    }
}
