//! HTTP API and configuration for latchdb
//!
//! A thin axum shell over [`latch_engine::Coordinator`]: route parsing,
//! JSON bodies, and the blocking-pool bridge live here; all semantics
//! live in the engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod http;

pub use config::Config;
pub use http::{router, serve, AppContext};
