//! In-memory implementation of DataAdapter for testing and development

use crate::core::error::{StoreError, StoreResult};
use crate::core::filter::apply_query;
use crate::core::record::{
    Fields, Readable, Record, Writable, from_fields, from_listing, merge_fields, new_id,
    to_fields,
    validate_name, with_id,
};
use crate::core::service::{
    CreateProps, DataAdapter, FindProps, ListProps, RemoveProps, UpdateProps,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

type Table = IndexMap<String, Fields>;

/// In-memory adapter implementation
///
/// Useful for testing and development. Tables keep insertion order, so an
/// unsorted `list` returns records in creation order, like the file adapter.
/// Uses RwLock for thread-safe access.
pub struct InMemoryAdapter<R = Record, W = Fields> {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    _marker: PhantomData<fn() -> (R, W)>,
}

impl<R, W> Clone for InMemoryAdapter<R, W> {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            _marker: PhantomData,
        }
    }
}

impl InMemoryAdapter {
    /// Create a new, empty in-memory adapter
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            _marker: PhantomData,
        }
    }
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> InMemoryAdapter<R, W> {
    /// A view over the same tables with other record types
    pub fn typed<R2, W2>(&self) -> InMemoryAdapter<R2, W2> {
        InMemoryAdapter {
            tables: Arc::clone(&self.tables),
            _marker: PhantomData,
        }
    }

    /// Number of records currently held by `table`
    pub fn len(&self, table: &str) -> StoreResult<usize> {
        let tables = self
            .tables
            .read()
            .map_err(|e| StoreError::Internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(tables.get(table).map_or(0, |t| t.len()))
    }

    fn read_record(&self, table: &str, id: &str) -> StoreResult<Fields> {
        let tables = self
            .tables
            .read()
            .map_err(|e| StoreError::Internal(format!("Failed to acquire read lock: {}", e)))?;

        tables
            .get(table)
            .and_then(|t| t.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(table, id))
    }
}

#[async_trait]
impl<R: Readable, W: Writable> DataAdapter<R, W> for InMemoryAdapter<R, W> {
    async fn find(&self, props: FindProps) -> StoreResult<R> {
        from_fields(self.read_record(&props.table, &props.id)?)
    }

    async fn create(&self, props: CreateProps<W>) -> StoreResult<R> {
        validate_name("table", &props.table)?;
        let id = new_id();
        let fields = with_id(to_fields(&props.data)?, &id);

        {
            let mut tables = self.tables.write().map_err(|e| {
                StoreError::Internal(format!("Failed to acquire write lock: {}", e))
            })?;
            tables
                .entry(props.table.clone())
                .or_default()
                .insert(id.clone(), fields.clone());
        }

        tracing::debug!(table = %props.table, id = %id, "created record");
        from_fields(fields)
    }

    async fn update(&self, props: UpdateProps<W::Patch>) -> StoreResult<R> {
        let patch = to_fields(&props.data)?;

        let merged = {
            let mut tables = self.tables.write().map_err(|e| {
                StoreError::Internal(format!("Failed to acquire write lock: {}", e))
            })?;
            let fields = tables
                .get_mut(&props.table)
                .and_then(|t| t.get_mut(&props.id))
                .ok_or_else(|| StoreError::not_found(&props.table, &props.id))?;
            merge_fields(fields, patch);
            fields.clone()
        };

        tracing::debug!(table = %props.table, id = %props.id, "updated record");
        from_fields(merged)
    }

    async fn remove(&self, props: RemoveProps) -> StoreResult<R> {
        let removed = {
            let mut tables = self.tables.write().map_err(|e| {
                StoreError::Internal(format!("Failed to acquire write lock: {}", e))
            })?;
            tables
                .get_mut(&props.table)
                .and_then(|t| t.shift_remove(&props.id))
                .ok_or_else(|| StoreError::not_found(&props.table, &props.id))?
        };

        tracing::debug!(table = %props.table, id = %props.id, "removed record");
        from_fields(removed)
    }

    async fn list(&self, props: ListProps) -> StoreResult<Vec<R>> {
        let records: Vec<Fields> = {
            let tables = self.tables.read().map_err(|e| {
                StoreError::Internal(format!("Failed to acquire read lock: {}", e))
            })?;
            tables
                .get(&props.table)
                .map(|t| t.values().cloned().collect())
                .unwrap_or_default()
        };

        let page = apply_query(records, props.query.as_ref());
        Ok(from_listing(&props.table, page))
    }
}
