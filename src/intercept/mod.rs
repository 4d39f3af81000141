//! Interception of HTTP requests made by code under test
//!
//! Requests to registered URLs are answered from snapshots; what happens to
//! the rest is decided by [`UnregisteredPolicy`](crate::config::UnregisteredPolicy).

mod client;
mod interceptor;

pub use client::Client;
pub use interceptor::{Installation, Interceptor};
