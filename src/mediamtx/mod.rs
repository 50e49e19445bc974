// Media-engine HTTP client + controller.

pub mod circuit_breaker;
pub mod client;
pub mod controller;
pub mod model;

pub use circuit_breaker::CircuitState;
pub use client::Client;
pub use controller::{Controller, EngineHealth, EngineMetrics};
pub use model::{Path, Stream, StreamStatus};
