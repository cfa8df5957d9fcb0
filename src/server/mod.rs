//! Server module exposing a data adapter over REST
//!
//! [`build_router`] turns any `DataAdapter<Record, Fields>` into an axum
//! router; [`ServerBuilder`] adds tracing, optional CORS and graceful
//! shutdown on top.

pub mod builder;
pub mod rest;

pub use builder::ServerBuilder;
pub use rest::{AppState, SharedAdapter, build_router};
