//! Discrete-event scheduling primitives.
//!
//! The DAMA and Noordwijk subsystems depend on nothing more than the
//! contract below: a monotonic logical clock, cancellable delayed callbacks,
//! and a uniform-integer source. A host simulator supplies its own
//! implementation; [`LogicalClock`] is this crate's own reference
//! implementation, used by its unit and scenario tests and available to
//! callers who don't need anything fancier.
//!
//! Same-tick events run FIFO by posting order: the queue below is a
//! `BTreeMap<Millis, VecDeque<_>>`, which preserves insertion order within a
//! tick the same way `time_driver.rs`'s `BTreeMap<u64, Vec<Waker>>` does for
//! same-tick wakers.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use rand::Rng;
use rand::rngs::ThreadRng;
use serde::Deserialize;

/// Logical time, millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);
    /// Sentinel for "+infinity", used by callers that track a running minimum
    /// and need a starting value no real sample can beat.
    pub const MAX: Millis = Millis(u64::MAX);

    pub fn saturating_add(self, delta: Millis) -> Millis {
        Millis(self.0.saturating_add(delta.0))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl std::ops::Add for Millis {
    type Output = Millis;
    fn add(self, rhs: Millis) -> Millis {
        self.saturating_add(rhs)
    }
}

impl std::ops::Sub for Millis {
    type Output = Millis;
    fn sub(self, rhs: Millis) -> Millis {
        Millis(self.0.saturating_sub(rhs.0))
    }
}

/// A cancellable handle to a scheduled event, returned by `schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// Interfaces the core consumes from a simulation kernel.
///
/// `E` is the event payload type; DAMA and Noordwijk each define their own
/// closed event enum and drive an independent `Simulator<E>` (the two
/// subsystems share only the *kind* of scheduler, not a literal shared
/// instance, so each can be exercised and tested in isolation).
pub trait Simulator<E> {
    /// Current logical time.
    fn now(&self) -> Millis;
    /// Schedule `event` to fire at `now() + delay`. Returns a handle that can
    /// later be passed to `cancel`.
    fn schedule(&mut self, delay: Millis, event: E) -> EventId;
    /// Cancel a previously scheduled event. A no-op if it already fired or
    /// was already cancelled.
    fn cancel(&mut self, id: EventId);
    /// Draw a uniform integer in `[lo, hi]` inclusive.
    fn random_uniform_int(&mut self, lo: i64, hi: i64) -> i64;
}

/// Reference discrete-event scheduler: a plain logical-time event queue,
/// stepped explicitly by the caller. No real-time scaling, no background
/// thread — just enough to run this crate's own tests and to serve a caller
/// that doesn't need anything fancier.
pub struct LogicalClock<E> {
    now: Millis,
    next_id: u64,
    queue: BTreeMap<Millis, VecDeque<(EventId, E)>>,
    cancelled: HashSet<EventId>,
    rng: ThreadRng,
}

impl<E> Default for LogicalClock<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> LogicalClock<E> {
    pub fn new() -> Self {
        LogicalClock {
            now: Millis::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
            cancelled: HashSet::new(),
            rng: rand::thread_rng(),
        }
    }

    /// Pop and return the next non-cancelled event, advancing `now` to its
    /// scheduled time. Returns `None` once the queue is drained.
    pub fn step(&mut self) -> Option<(Millis, E)> {
        loop {
            let &due = self.queue.keys().next()?;
            let bucket = self.queue.get_mut(&due).expect("key just observed");
            let (id, event) = bucket.pop_front().expect("non-empty bucket");
            if bucket.is_empty() {
                self.queue.remove(&due);
            }
            self.now = due;
            if self.cancelled.remove(&id) {
                continue;
            }
            return Some((due, event));
        }
    }

    /// Drain and dispatch every event up to and including `deadline` via
    /// `handler`, in scheduling order. Events that `handler` itself schedules
    /// at or before `deadline` are also dispatched.
    pub fn run_until(&mut self, deadline: Millis, mut handler: impl FnMut(&mut Self, Millis, E)) {
        while let Some(&due) = self.queue.keys().next() {
            if due > deadline {
                break;
            }
            let (at, event) = self.step().expect("peeked a due key");
            handler(self, at, event);
        }
        if self.now < deadline {
            self.now = deadline;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<E> Simulator<E> for LogicalClock<E> {
    fn now(&self) -> Millis {
        self.now
    }

    fn schedule(&mut self, delay: Millis, event: E) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let at = self.now.saturating_add(delay);
        self.queue.entry(at).or_default().push_back((id, event));
        id
    }

    fn cancel(&mut self, id: EventId) {
        self.cancelled.insert(id);
    }

    fn random_uniform_int(&mut self, lo: i64, hi: i64) -> i64 {
        self.rng.gen_range(lo..=hi)
    }
}
