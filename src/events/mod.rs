// Topic-based publish-subscribe event bus.

pub mod bus;
pub mod envelope;
pub mod topic;

pub use bus::Bus;
pub use envelope::Envelope;
pub use topic::Topic;
