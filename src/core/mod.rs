//! Core module containing the CRUD contract, the query language and the
//! write gate shared by all adapters

pub mod error;
pub mod filter;
pub mod gate;
pub mod params;
pub mod query;
pub mod record;
pub mod service;

pub use error::{ErrorResponse, StoreError, StoreResult};
pub use gate::WriteGate;
pub use query::{Condition, Filter, Operator, Query, SortDirection, SortKey};
pub use record::{Fields, Readable, Record, Writable};
pub use service::{CreateProps, DataAdapter, FindProps, ListProps, RemoveProps, UpdateProps};
