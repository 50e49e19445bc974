// CircuitBreaker.
//
// CLOSED -> OPEN -> HALF_OPEN -> CLOSED. Hand-rolled rather than pulled
// from a crate: small concurrency state machines like this are cheap to
// own outright.

use crate::error::{ErrorKind, ServiceError};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant, backoff: Duration },
    HalfOpen { probe_in_flight: bool, backoff: Duration, successes: u32 },
}
impl State {
    fn public(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    recovery_confirmation_threshold: u32,
    max_backoff: Duration,
    state: Mutex<State>,
}
impl CircuitBreaker {
    pub fn new(
        failure_threshold: u32,
        recovery_timeout: Duration,
        recovery_confirmation_threshold: u32,
        max_backoff: Duration,
    ) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            recovery_confirmation_threshold,
            max_backoff,
            state: Mutex::new(State::Closed { consecutive_failures: 0 }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().public()
    }

    /// Call before issuing I/O. `Err(CircuitOpen)` means fail fast, no I/O.
    pub fn try_acquire(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { .. } => Ok(()),
            State::Open { opened_at, backoff } => {
                if opened_at.elapsed() >= *backoff {
                    *state = State::HalfOpen {
                        probe_in_flight: true,
                        backoff: *backoff,
                        successes: 0,
                    };
                    Ok(())
                } else {
                    Err(ServiceError::from_kind(ErrorKind::CircuitOpen))
                }
            }
            State::HalfOpen { probe_in_flight, .. } => {
                if *probe_in_flight {
                    Err(ServiceError::from_kind(ErrorKind::CircuitOpen))
                } else {
                    *probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { consecutive_failures } => *consecutive_failures = 0,
            State::Open { .. } => {
                // a success outside an acquired probe can't happen through
                // try_acquire, but don't let it corrupt state if it does.
            }
            State::HalfOpen { successes, .. } => {
                *successes += 1;
                if *successes >= self.recovery_confirmation_threshold {
                    *state = State::Closed { consecutive_failures: 0 };
                } else if let State::HalfOpen { probe_in_flight, .. } = &mut *state {
                    *probe_in_flight = false;
                }
            }
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { consecutive_failures } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= self.failure_threshold {
                    *state = State::Open {
                        opened_at: Instant::now(),
                        backoff: self.recovery_timeout,
                    };
                }
            }
            State::Open { opened_at, .. } => {
                *opened_at = Instant::now();
            }
            State::HalfOpen { backoff, .. } => {
                let doubled = (*backoff * 2).min(self.max_backoff);
                *state = State::Open {
                    opened_at: Instant::now(),
                    backoff: doubled,
                };
            }
        }
    }
}

#[cfg(test)]
mod test_circuit_breaker {
    use super::{CircuitBreaker, CircuitState};
    use std::time::Duration;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_millis(20), 2, Duration::from_secs(10))
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let breaker = breaker();
        for _ in 0..3 {
            breaker.try_acquire().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let breaker = breaker();
        breaker.try_acquire().unwrap();
        breaker.record_failure();
        breaker.try_acquire().unwrap();
        breaker.record_failure();
        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_requires_confirmation_threshold_successes() {
        let breaker = breaker();
        for _ in 0..3 {
            breaker.try_acquire().unwrap();
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(25));

        breaker.try_acquire().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // a second concurrent probe is rejected while one is in flight.
        assert!(breaker.try_acquire().is_err());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_with_doubled_backoff() {
        let breaker = breaker();
        for _ in 0..3 {
            breaker.try_acquire().unwrap();
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(25));
        breaker.try_acquire().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // backoff doubled to 40ms: still closed at the old 20ms mark.
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire().is_err());
    }
}
