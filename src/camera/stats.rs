// MonitorStats — `GetMonitorStats`.
//
// Plain atomics rather than a `Mutex`-guarded struct: every field is an
// independent counter nobody needs a consistent joint snapshot of, and the
// reconciliation loop increments several of these per enumerated node, so
// lock-free counting keeps the hot path cheap.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    running: AtomicBool,
    cycle_count: AtomicU64,
    probe_attempts: AtomicU64,
    probe_successes: AtomicU64,
    probe_timeouts: AtomicU64,
    probe_parse_errors: AtomicU64,
    probe_command_errors: AtomicU64,
    current_poll_interval_ms: AtomicU64,
    known_device_count: AtomicU32,
    kernel_event_count: AtomicU64,
}
impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(
        &self,
        running: bool,
    ) {
        self.running.store(running, Ordering::Relaxed);
    }
    pub fn record_cycle(&self) {
        self.cycle_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_probe_attempt(&self) {
        self.probe_attempts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_probe_success(&self) {
        self.probe_successes.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_probe_timeout(&self) {
        self.probe_timeouts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_probe_parse_error(&self) {
        self.probe_parse_errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_probe_command_error(&self) {
        self.probe_command_errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_kernel_event(&self) {
        self.kernel_event_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn set_current_poll_interval_ms(
        &self,
        millis: u64,
    ) {
        self.current_poll_interval_ms.store(millis, Ordering::Relaxed);
    }
    pub fn set_known_device_count(
        &self,
        count: u32,
    ) {
        self.known_device_count.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MonitorStats {
        MonitorStats {
            running: self.running.load(Ordering::Relaxed),
            cycle_count: self.cycle_count.load(Ordering::Relaxed),
            probe_attempts: self.probe_attempts.load(Ordering::Relaxed),
            probe_successes: self.probe_successes.load(Ordering::Relaxed),
            probe_timeouts: self.probe_timeouts.load(Ordering::Relaxed),
            probe_parse_errors: self.probe_parse_errors.load(Ordering::Relaxed),
            probe_command_errors: self.probe_command_errors.load(Ordering::Relaxed),
            current_poll_interval_ms: self.current_poll_interval_ms.load(Ordering::Relaxed),
            known_device_count: self.known_device_count.load(Ordering::Relaxed),
            kernel_event_count: self.kernel_event_count.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MonitorStats {
    pub running: bool,
    pub cycle_count: u64,
    pub probe_attempts: u64,
    pub probe_successes: u64,
    pub probe_timeouts: u64,
    pub probe_parse_errors: u64,
    pub probe_command_errors: u64,
    pub current_poll_interval_ms: u64,
    pub known_device_count: u32,
    pub kernel_event_count: u64,
}
