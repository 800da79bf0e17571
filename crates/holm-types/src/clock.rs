use std::sync::atomic::{AtomicU64, Ordering};

/// Lamport logical clock for ordering log entries.
///
/// Produces strictly increasing `u64` timestamps without consulting wall-clock
/// time. Safe for concurrent use across threads; all state lives in a single
/// [`AtomicU64`].
///
/// # Clock Rules
///
/// - **Local event**: `counter += 1`, and the new value is the timestamp.
/// - **Receive**: `counter = max(counter, received)`, so the next local
///   timestamp is strictly greater than anything observed from a remote
///   replica.
/// - **Guarantee**: timestamps from one clock never repeat, and a timestamp
///   assigned after observing a remote one is strictly greater than it.
///
/// Two replicas can still assign the same timestamp to concurrent entries;
/// consumers break that tie with the author id.
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    /// Create a clock starting at zero.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Create a clock resuming from a persisted counter value.
    ///
    /// The next [`tick`](Self::tick) returns `counter + 1`.
    pub fn resume(counter: u64) -> Self {
        Self {
            counter: AtomicU64::new(counter),
        }
    }

    /// Advance the clock for a local event and return the new timestamp.
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fold a remotely observed timestamp into the clock.
    ///
    /// After this call, the next [`tick`](Self::tick) returns a value strictly
    /// greater than `remote`.
    pub fn observe(&self, remote: u64) {
        self.counter.fetch_max(remote, Ordering::SeqCst);
    }

    /// The most recently issued (or observed) timestamp.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}
