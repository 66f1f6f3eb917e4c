//! Database models split into domain-specific modules.

pub mod admin;
pub mod project;
pub mod session;

pub use admin::*;
pub use project::*;
pub use session::*;
