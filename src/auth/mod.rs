// Authentication and authorization.

pub mod rate_limit;
pub mod role;
pub mod token;

pub use rate_limit::ClientRateLimiter;
pub use role::{PermissionMatrix, Role};
pub use token::{Claims, TokenService};
