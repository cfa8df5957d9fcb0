//! # recordkit
//!
//! One CRUD interface over interchangeable storage backends.
//!
//! ## Features
//!
//! - **Generic contract**: [`DataAdapter`](core::DataAdapter) offers `find`,
//!   `create`, `update`, `remove` and `list` over named tables
//! - **Query language**: MongoDB-style filters (`$ne`, `$in`, `$nin`, `$lt`,
//!   `$lte`, `$gt`, `$gte`, `$search`, `$or`, `$and`) with `$sort`, `$skip`,
//!   `$limit` and `$select`
//! - **File storage**: one JSON file per record, writes serialized per table
//! - **In-memory storage**: for tests and development
//! - **HTTP client**: the same contract against a remote REST service
//! - **REST server**: expose any adapter with axum
//! - **MongoDB storage**: behind the `mongodb_backend` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recordkit::prelude::*;
//! use serde_json::json;
//!
//! let adapter = FileAdapter::new("./database");
//!
//! let alice = adapter
//!     .create(CreateProps::new("users", to_fields(&json!({"name": "alice", "age": 30}))?))
//!     .await?;
//!
//! let adults = adapter
//!     .list(ListProps::new("users").with_query(Query::new().gte("age", 18).sort_desc("age")))
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

#[cfg(feature = "http-client")]
pub mod client;

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`)
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        CreateProps, DataAdapter, FindProps, ListProps, Query, Readable, Record, RemoveProps,
        SortDirection, StoreError, StoreResult, UpdateProps, Writable, WriteGate,
        record::{Fields, to_fields},
    };

    // === Storage ===
    pub use crate::storage::FileAdapter;
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryAdapter;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoAdapter;

    // === Client ===
    #[cfg(feature = "http-client")]
    pub use crate::client::HttpAdapter;

    // === Config ===
    pub use crate::config::{HttpConfig, StoreConfig};

    // === Server ===
    pub use crate::server::{ServerBuilder, build_router};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
