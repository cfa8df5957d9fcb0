//! The CRUD contract every adapter implements

use crate::core::error::StoreResult;
use crate::core::query::Query;
use crate::core::record::{Readable, Writable};
use async_trait::async_trait;

/// Props for [`DataAdapter::find`]
#[derive(Debug, Clone, PartialEq)]
pub struct FindProps {
    pub table: String,
    pub id: String,
}

impl FindProps {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }
}

/// Props for [`DataAdapter::create`]
#[derive(Debug, Clone)]
pub struct CreateProps<W> {
    pub table: String,
    pub data: W,
}

impl<W> CreateProps<W> {
    pub fn new(table: impl Into<String>, data: W) -> Self {
        Self {
            table: table.into(),
            data,
        }
    }
}

/// Props for [`DataAdapter::update`]
#[derive(Debug, Clone)]
pub struct UpdateProps<P> {
    pub table: String,
    pub id: String,
    pub data: P,
}

impl<P> UpdateProps<P> {
    pub fn new(table: impl Into<String>, id: impl Into<String>, data: P) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
            data,
        }
    }
}

/// Props for [`DataAdapter::remove`]
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveProps {
    pub table: String,
    pub id: String,
}

impl RemoveProps {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }
}

/// Props for [`DataAdapter::list`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListProps {
    pub table: String,
    pub query: Option<Query>,
}

impl ListProps {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }
}

/// Storage-agnostic CRUD over named tables
///
/// `R` is the record shape handed back by the storage (it carries `id`),
/// `W` the shape clients submit. Any two implementations with the same error
/// semantics are interchangeable:
///
/// - `find`, `update` and `remove` fail with `StoreError::NotFound` when the
///   table or record is absent
/// - `create` always assigns a fresh id
/// - `list` never fails for an empty or never-created table
#[async_trait]
pub trait DataAdapter<R: Readable, W: Writable>: Send + Sync {
    /// Fetch one record by id
    async fn find(&self, props: FindProps) -> StoreResult<R>;

    /// Persist a new record under a freshly assigned id
    async fn create(&self, props: CreateProps<W>) -> StoreResult<R>;

    /// Shallow-merge `data` into an existing record
    async fn update(&self, props: UpdateProps<W::Patch>) -> StoreResult<R>;

    /// Delete a record, returning its state just before deletion
    async fn remove(&self, props: RemoveProps) -> StoreResult<R>;

    /// List the records of a table matching an optional query
    async fn list(&self, props: ListProps) -> StoreResult<Vec<R>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::record::{Fields, Record};
    use std::sync::Arc;

    struct NothingAdapter;

    #[async_trait]
    impl DataAdapter<Record, Fields> for NothingAdapter {
        async fn find(&self, props: FindProps) -> StoreResult<Record> {
            Err(StoreError::not_found(props.table, props.id))
        }

        async fn create(&self, props: CreateProps<Fields>) -> StoreResult<Record> {
            Ok(Record {
                id: "generated".to_string(),
                fields: props.data,
            })
        }

        async fn update(&self, props: UpdateProps<Fields>) -> StoreResult<Record> {
            Err(StoreError::not_found(props.table, props.id))
        }

        async fn remove(&self, props: RemoveProps) -> StoreResult<Record> {
            Err(StoreError::not_found(props.table, props.id))
        }

        async fn list(&self, _props: ListProps) -> StoreResult<Vec<Record>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_adapter_is_object_safe() {
        let adapter: Arc<dyn DataAdapter<Record, Fields>> = Arc::new(NothingAdapter);

        let err = adapter.find(FindProps::new("users", "1")).await.unwrap_err();
        assert!(err.is_not_found());

        let created = adapter
            .create(CreateProps::new("users", Fields::new()))
            .await
            .unwrap();
        assert_eq!(created.id, "generated");

        assert!(adapter.list(ListProps::new("users")).await.unwrap().is_empty());
    }

    #[test]
    fn test_list_props_builder() {
        let props = ListProps::new("users").with_query(Query::new().limit(1));
        assert_eq!(props.table, "users");
        assert_eq!(props.query.unwrap().limit, Some(1));
    }
}
