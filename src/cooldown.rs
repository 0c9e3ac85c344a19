use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Default window between two runs of the same command by the same user.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

/// An expiring set of busy keys.
///
/// A marker is placed when a run starts and expires after a fixed window,
/// whether or not the run succeeded. Expiry is checked lazily against a
/// monotonic clock, so no timer task is involved.
#[derive(Debug)]
pub struct Cooldown<K: Eq + Hash> {
    window: Duration,
    started: DashMap<K, Instant>,
}

impl<K: Eq + Hash> Cooldown<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Mark `key` busy, or return how long it stays busy.
    ///
    /// Expired markers of other keys are dropped first, so the set only
    /// holds keys that are still busy.
    pub fn try_acquire(&self, key: K) -> Result<(), Duration> {
        self.purge_expired();
        let now = Instant::now();
        match self.started.entry(key) {
            Entry::Occupied(mut e) => {
                let elapsed = now.duration_since(*e.get());
                if elapsed < self.window {
                    return Err(self.window - elapsed);
                }
                e.insert(now);
            }
            Entry::Vacant(e) => {
                e.insert(now);
            }
        }
        Ok(())
    }

    /// Remaining busy time for `key`, if any.
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        let started = *self.started.get(key)?;
        self.window.checked_sub(started.elapsed()).filter(|d| !d.is_zero())
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.remaining(key).is_some()
    }

    /// Drop expired markers.
    pub fn purge_expired(&self) {
        let window = self.window;
        self.started.retain(|_, started| started.elapsed() < window);
    }

    /// Number of stored markers, expired or not.
    pub fn len(&self) -> usize {
        self.started.len()
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }
}

impl<K: Eq + Hash> Default for Cooldown<K> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
