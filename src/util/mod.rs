pub mod async_flag;
pub mod duration_flex;
pub mod logging;
pub mod rate_limiter;
pub mod readiness;
pub mod runtime;
