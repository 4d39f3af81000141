//! Golder - record-and-replay cache for HTTP requests made by test suites
//!
//! A suite declares named routes. Each route is fetched from the network the
//! first time it is needed (or once its snapshot goes stale), persisted under
//! the suite's folder, and served from that snapshot afterwards.
//!
//! ```no_run
//! use std::sync::Arc;
//! use golder::config::SuiteConfig;
//! use golder::golding::GoldEngine;
//! use golder::intercept::{Client, Interceptor};
//! use golder::network::HttpTransport;
//! use golder::policy::RefreshPolicy;
//! use golder::storage::OsFilesystem;
//!
//! # async fn run() -> golder::Result<()> {
//! let config = SuiteConfig::new("homepage tests", "test/golds").route(
//!     "homepage",
//!     "http://example.com/robots.txt",
//!     Some(RefreshPolicy::Weekly),
//! );
//! let live = Arc::new(HttpTransport::new());
//! let engine = GoldEngine::from_config(&config, Arc::new(OsFilesystem::new()), live.clone()).await?;
//!
//! let client = Client::new(live);
//! let _installation = Interceptor::install(&client, Arc::new(engine), config.unregistered);
//! let body = client.get("http://example.com/robots.txt").await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod golding;
pub mod intercept;
pub mod network;
pub mod policy;
pub mod registry;
pub mod storage;

pub use error::{GolderError, Result, RouteFailure};
