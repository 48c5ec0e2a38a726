//! API endpoint implementations

pub mod session;

pub use session::SessionEndpoints;
