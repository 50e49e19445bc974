// Per-client rate limiting.
//
// Thin named wrapper around `util::rate_limiter::RateLimiter` keyed by
// connection id, plus a background sweeper `Runnable` so idle per-client
// accounting entries get evicted without the caller having to remember to.

use crate::util::{
    async_flag,
    rate_limiter::RateLimiter,
    runtime::{Exited, Runnable},
};
use async_trait::async_trait;
use futures::{future::FutureExt, select};
use std::time::Duration;

pub struct ClientRateLimiter {
    limiter: RateLimiter<uuid::Uuid>,
    sweep_interval: Duration,
}
impl ClientRateLimiter {
    pub fn new(
        limit: usize,
        window: Duration,
        inactive_ttl: Duration,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(limit, window, inactive_ttl),
            sweep_interval: inactive_ttl.max(Duration::from_secs(1)),
        }
    }

    pub fn admit(
        &self,
        connection_id: uuid::Uuid,
    ) -> bool {
        self.limiter.admit(&connection_id)
    }

    pub fn forget(
        &self,
        connection_id: uuid::Uuid,
    ) {
        self.limiter.remove(&connection_id);
    }
}

#[async_trait]
impl Runnable for ClientRateLimiter {
    async fn run(
        &self,
        mut exit_flag: async_flag::Receiver,
    ) -> Exited {
        loop {
            select! {
                () = tokio::time::sleep(self.sweep_interval).fuse() => {
                    self.limiter.sweep();
                },
                () = &mut exit_flag => break,
            }
        }
        Exited
    }
}

#[cfg(test)]
mod test_rate_limit {
    use super::*;

    #[test]
    fn admits_then_rejects_past_the_limit() {
        let limiter = ClientRateLimiter::new(2, Duration::from_secs(60), Duration::from_secs(300));
        let client = uuid::Uuid::new_v4();

        assert!(limiter.admit(client));
        assert!(limiter.admit(client));
        assert!(!limiter.admit(client));
    }

    #[test]
    fn forget_resets_a_client() {
        let limiter = ClientRateLimiter::new(1, Duration::from_secs(60), Duration::from_secs(300));
        let client = uuid::Uuid::new_v4();

        assert!(limiter.admit(client));
        assert!(!limiter.admit(client));
        limiter.forget(client);
        assert!(limiter.admit(client));
    }
}
