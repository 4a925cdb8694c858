//! HTTP handlers
//!
//! The axum routes exposed to the browser page: the form, the download
//! endpoint and the log poll.

pub mod page;
pub mod routes;

pub use routes::*;
