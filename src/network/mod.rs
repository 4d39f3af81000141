//! Network layer for Golder
//!
//! The engine only depends on the `Transport` trait; `HttpTransport` is the
//! default implementation used for real fetches.

mod client;
mod request;
mod stub;

pub use client::HttpTransport;
pub use request::{RequestOptions, RequestSpec, Response, Transport};
pub use stub::StubTransport;

/// Default upper bound on a single upstream fetch
pub const FETCH_TIMEOUT_MS: u64 = 30_000;
