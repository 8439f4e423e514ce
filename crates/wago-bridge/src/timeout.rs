//! Timeout bookkeeping for the guest runtime's sleep scheduling.
//!
//! The guest schedules a wake-up with a millisecond delay and receives an
//! id it can later cancel. Registrations stay live until the guest cancels
//! them: the driving loop fires the earliest deadline, resumes the guest,
//! and only the guest's cancel call retires the id. A fired-but-uncancelled
//! id is how the driver detects a missed wake-up.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

/// Slack added to every deadline so the guest's own clock check sees the
/// deadline as passed when it wakes.
const WAKE_SLACK: Duration = Duration::from_millis(1);

#[derive(Debug, Eq, PartialEq)]
struct TimeoutEntry {
    deadline: Instant,
    id: i32,
}

// Min-heap by deadline.
impl Ord for TimeoutEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimeoutEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending wake-up registrations, ordered by deadline.
///
/// Cancelled ids linger in the heap; [`TimeoutQueue::pop_next`] skips them
/// lazily against the live-id map.
pub struct TimeoutQueue {
    heap: BinaryHeap<TimeoutEntry>,
    active: FxHashMap<i32, Instant>,
    next_id: i32,
}

impl Default for TimeoutQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            active: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Register a wake-up `delay_ms` from now and return its id.
    pub fn schedule(&mut self, delay_ms: i64) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let delay = Duration::from_millis(delay_ms.max(0) as u64) + WAKE_SLACK;
        let deadline = Instant::now() + delay;
        self.active.insert(id, deadline);
        self.heap.push(TimeoutEntry { deadline, id });
        id
    }

    /// Cancel a registration. Unknown or already-cancelled ids are ignored.
    pub fn clear(&mut self, id: i32) {
        self.active.remove(&id);
    }

    /// Whether `id` is still registered (not yet cancelled by the guest).
    pub fn is_scheduled(&self, id: i32) -> bool {
        self.active.contains_key(&id)
    }

    /// Take the earliest live registration off the heap.
    ///
    /// The id stays registered; only [`TimeoutQueue::clear`] retires it.
    pub fn pop_next(&mut self) -> Option<(i32, Instant)> {
        while let Some(entry) = self.heap.pop() {
            // Skip entries cancelled, or superseded by re-registration
            // under the same id, since they were pushed.
            match self.active.get(&entry.id) {
                Some(deadline) if *deadline == entry.deadline => {
                    return Some((entry.id, entry.deadline));
                }
                _ => continue,
            }
        }
        None
    }

    /// Whether any live registration remains.
    pub fn has_pending(&self) -> bool {
        !self.active.is_empty()
    }

    /// Drop every registration; used when the guest exits.
    pub fn clear_all(&mut self) {
        self.heap.clear();
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_from_one() {
        let mut q = TimeoutQueue::new();
        assert_eq!(q.schedule(10), 1);
        assert_eq!(q.schedule(10), 2);
        assert_eq!(q.schedule(10), 3);
    }

    #[test]
    fn pop_orders_by_deadline_not_insertion() {
        let mut q = TimeoutQueue::new();
        let slow = q.schedule(5_000);
        let fast = q.schedule(0);
        let (first, _) = q.pop_next().unwrap();
        assert_eq!(first, fast);
        let (second, _) = q.pop_next().unwrap();
        assert_eq!(second, slow);
    }

    #[test]
    fn pop_keeps_the_id_registered_until_cleared() {
        let mut q = TimeoutQueue::new();
        let id = q.schedule(0);
        q.pop_next().unwrap();
        assert!(q.is_scheduled(id), "firing must not retire the id");
        q.clear(id);
        assert!(!q.is_scheduled(id));
        assert!(!q.has_pending());
    }

    #[test]
    fn cleared_entries_are_skipped() {
        let mut q = TimeoutQueue::new();
        let a = q.schedule(0);
        let b = q.schedule(10);
        q.clear(a);
        let (next, _) = q.pop_next().unwrap();
        assert_eq!(next, b);
        q.clear(b);
        assert!(q.pop_next().is_none());
    }

    #[test]
    fn clearing_twice_is_harmless() {
        let mut q = TimeoutQueue::new();
        let id = q.schedule(1);
        q.clear(id);
        q.clear(id);
        q.clear(999);
        assert!(!q.has_pending());
    }

    #[test]
    fn deadlines_carry_the_wake_slack() {
        let mut q = TimeoutQueue::new();
        let before = Instant::now();
        q.schedule(50);
        let (_, deadline) = q.pop_next().unwrap();
        assert!(deadline >= before + Duration::from_millis(51));
    }
}
