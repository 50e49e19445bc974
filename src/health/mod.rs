// Health aggregation, consumed by the `get_status`/`get_system_status`
// RPC methods and any outer HTTP health surface that wants to delegate
// to it rather than duplicate the rollup logic.

pub mod api;

pub use api::{HealthApi, HealthSnapshot, OverallStatus};
