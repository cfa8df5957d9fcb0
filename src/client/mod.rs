//! Adapters that forward the CRUD contract to a remote service

pub mod http;

pub use http::HttpAdapter;
