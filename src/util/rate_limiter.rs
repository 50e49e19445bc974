// Per-client sliding window rate limiter.
//
// Deliberately hand-rolled rather than pulled in from a crate: small,
// purpose-built concurrency primitives are cheap to own outright here.

use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

#[derive(Debug)]
struct Window {
    hits: VecDeque<Instant>,
    last_seen: Instant,
}
impl Window {
    fn new(now: Instant) -> Self {
        Self {
            hits: VecDeque::new(),
            last_seen: now,
        }
    }

    // returns true if the hit is admitted
    fn hit(
        &mut self,
        now: Instant,
        limit: usize,
        window: Duration,
    ) -> bool {
        self.last_seen = now;

        while let Some(&front) = self.hits.front() {
            if now.duration_since(front) > window {
                self.hits.pop_front();
            } else {
                break;
            }
        }

        if self.hits.len() >= limit {
            return false;
        }

        self.hits.push_back(now);
        true
    }
}

#[derive(Debug)]
pub struct RateLimiter<K> {
    limit: usize,
    window: Duration,
    inactive_ttl: Duration,
    windows: Mutex<HashMap<K, Window>>,
}
impl<K> RateLimiter<K>
where
    K: std::hash::Hash + Eq + Clone,
{
    pub fn new(
        limit: usize,
        window: Duration,
        inactive_ttl: Duration,
    ) -> Self {
        Self {
            limit,
            window,
            inactive_ttl,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request attempt for `key`. Returns `true` if it is
    /// admitted, `false` if the client has exceeded its budget for the
    /// current window.
    pub fn admit(
        &self,
        key: &K,
    ) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let entry = windows
            .entry(key.clone())
            .or_insert_with(|| Window::new(now));
        entry.hit(now, self.limit, self.window)
    }

    /// Evicts accounting entries that have been idle longer than
    /// `inactive_ttl`. Intended to be called from a background sweeper.
    pub fn sweep(&self) {
        let now = Instant::now();
        let inactive_ttl = self.inactive_ttl;
        self.windows
            .lock()
            .retain(|_, window| now.duration_since(window.last_seen) <= inactive_ttl);
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.windows.lock().remove(key);
    }

    #[cfg(test)]
    pub fn tracked_count(&self) -> usize {
        self.windows.lock().len()
    }
}

#[cfg(test)]
mod test_rate_limiter {
    use super::RateLimiter;
    use std::time::Duration;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::<u32>::new(3, Duration::from_secs(60), Duration::from_secs(300));

        assert!(limiter.admit(&1));
        assert!(limiter.admit(&1));
        assert!(limiter.admit(&1));
        assert!(!limiter.admit(&1));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::<u32>::new(1, Duration::from_secs(60), Duration::from_secs(300));

        assert!(limiter.admit(&1));
        assert!(limiter.admit(&2));
        assert!(!limiter.admit(&1));
        assert!(!limiter.admit(&2));
    }

    #[test]
    fn sweep_evicts_idle_entries() {
        let limiter = RateLimiter::<u32>::new(5, Duration::from_secs(60), Duration::from_millis(1));

        limiter.admit(&1);
        assert_eq!(limiter.tracked_count(), 1);

        std::thread::sleep(Duration::from_millis(5));
        limiter.sweep();

        assert_eq!(limiter.tracked_count(), 0);
    }
}
