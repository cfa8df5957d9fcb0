//! Storage implementations for different backends

pub mod file;
#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;

pub use file::FileAdapter;
#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryAdapter;
#[cfg(feature = "mongodb_backend")]
pub use mongodb::MongoAdapter;
