//! Monotonic timeout queue.
//!
//! Ordered multiset of deadlines on a 32-bit millisecond clock with
//! wrap-safe comparison: deadlines are ordered by the signed difference to
//! the queue's current pivot, never by raw unsigned value. Entries with
//! equal deadlines fire in insertion order.
//
// https://github.com/apsteer/apsteer

use log::trace;

struct Entry<K> {
    deadline: u32,
    key: K,
}

/// Signed distance from `now` to `deadline` on the wrapping clock
fn delta(deadline: u32, now: u32) -> i32 {
    deadline.wrapping_sub(now) as i32
}

/// Deadline queue over cloneable entry keys.
///
/// The owner arms a single external sleep from `next_deadline` and calls
/// `expire` on wakeup; expired keys are handed back for dispatch.
pub struct TimeoutQueue<K> {
    entries: Vec<Entry<K>>,
}

impl<K: Clone + PartialEq> TimeoutQueue<K> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_set(&self, key: &K) -> bool {
        self.entries.iter().any(|e| e.key == *key)
    }

    /// Arm `key` to fire `msecs` from `now`, re-inserting if already set
    pub fn set(&mut self, key: K, msecs: u32, now: u32) {
        self.cancel(&key);

        let deadline = now.wrapping_add(msecs);
        let pos = self
            .entries
            .iter()
            .position(|e| delta(e.deadline, now) > delta(deadline, now))
            .unwrap_or_else(|| self.entries.len());

        self.entries.insert(pos, Entry { deadline, key });
    }

    /// Disarm `key`. Idempotent.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.entries.iter().position(|e| e.key == *key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Earliest armed deadline, if any
    pub fn next_deadline(&self) -> Option<u32> {
        self.entries.first().map(|e| e.deadline)
    }

    /// Milliseconds until the earliest deadline (0 if already due)
    pub fn next_delta(&self, now: u32) -> Option<u32> {
        self.next_deadline().map(|d| delta(d, now).max(0) as u32)
    }

    /// Remove and return every entry due at `now`, earliest first
    pub fn expire(&mut self, now: u32) -> Vec<K> {
        let mut fired = Vec::new();

        while let Some(e) = self.entries.first() {
            if delta(e.deadline, now) > 0 {
                break;
            }
            trace!("timeout fired at {} ms", now);
            fired.push(self.entries.remove(0).key);
        }

        fired
    }

    /// Drain the whole queue regardless of deadline
    pub fn flush(&mut self) -> Vec<K> {
        self.entries.drain(..).map(|e| e.key).collect()
    }
}

impl<K: Clone + PartialEq> Default for TimeoutQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
