// JSON-RPC-over-WebSocket front door.

pub mod connection;
pub mod dispatch;
pub mod methods;
pub mod protocol;
pub mod registry;
pub mod server;

pub use connection::Connection;
pub use dispatch::{AppState, Registry};
pub use registry::ConnectionRegistry;
