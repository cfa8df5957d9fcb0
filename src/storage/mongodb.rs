//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! recordkit = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Each table is a collection of the same name. The record `id` is stored as
//! the document `_id`.
//!
//! # Query translation
//!
//! Queries are pushed down to the server instead of being evaluated in
//! process: the filter tree becomes a native filter document, `$sort`,
//! `$skip`, `$limit` and `$select` become cursor options. `$search` is sent as
//! an escaped, case-insensitive `$regex`. An unsorted listing is ordered by
//! `_id`, which follows creation order for generated ids.
//!
//! Sorting across values of different types follows MongoDB's BSON
//! comparison order, which differs from the in-process evaluator.

use crate::core::error::{StoreError, StoreResult};
use crate::core::query::{Condition, Filter, Operator, Query, SortDirection};
use crate::core::record::{
    Fields, ID_FIELD, Readable, Record, Writable, from_fields, from_listing, new_id, to_fields,
    with_id,
};
use crate::core::service::{
    CreateProps, DataAdapter, FindProps, ListProps, RemoveProps, UpdateProps,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Database;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ReturnDocument;
use serde_json::Value;
use std::marker::PhantomData;

const MONGO_ID: &str = "_id";

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a field map into a BSON Document, renaming `id` → `_id`.
fn fields_to_document(fields: Fields) -> StoreResult<Document> {
    let mut doc = match to_bson(&Value::Object(fields))? {
        Bson::Document(d) => d,
        _ => {
            return Err(StoreError::Serialization {
                message: "expected BSON document, got non-object".to_string(),
            });
        }
    };

    if let Some(id) = doc.remove(ID_FIELD) {
        doc.insert(MONGO_ID, id);
    }

    Ok(doc)
}

/// Convert a BSON Document back into a field map, renaming `_id` → `id`.
fn document_to_fields(mut doc: Document) -> StoreResult<Fields> {
    if let Some(id) = doc.remove(MONGO_ID) {
        doc.insert(ID_FIELD, id);
    }

    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::Serialization {
            message: "expected a JSON object from BSON document".to_string(),
        }),
    }
}

fn to_bson(value: &Value) -> StoreResult<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| StoreError::Serialization {
        message: format!("Failed to convert JSON to BSON: {}", e),
    })
}

fn field_name(field: &str) -> &str {
    if field == ID_FIELD { MONGO_ID } else { field }
}

fn backend_error(action: &'static str, table: &str, err: mongodb::error::Error) -> StoreError {
    StoreError::Io {
        operation: action,
        path: table.to_string(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Query translation
// ---------------------------------------------------------------------------

/// Compile a filter node into a MongoDB filter document
fn compile_filter(filter: &Filter) -> StoreResult<Document> {
    match filter {
        Filter::Field { field, condition } => {
            let target = match condition {
                Condition::Equals(value) => to_bson(value)?,
                Condition::Operators(ops) => {
                    let ops = compile_operators(ops)?;
                    // No recognised operator left: the field is unconstrained
                    if ops.is_empty() {
                        return Ok(Document::new());
                    }
                    Bson::Document(ops)
                }
            };
            let mut doc = Document::new();
            doc.insert(field_name(field), target);
            Ok(doc)
        }
        Filter::And(children) => compile_conjunction(children),
        Filter::Or(children) if children.is_empty() => {
            // An empty disjunction matches nothing
            Ok(doc! { MONGO_ID: { "$in": [] } })
        }
        Filter::Or(children) => {
            let alternatives = children
                .iter()
                .map(|child| compile_filter(child).map(Bson::Document))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(doc! { "$or": alternatives })
        }
    }
}

fn compile_conjunction(children: &[Filter]) -> StoreResult<Document> {
    let mut parts = children
        .iter()
        .map(compile_filter)
        .filter(|part| !matches!(part, Ok(doc) if doc.is_empty()))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(match parts.len() {
        0 => Document::new(),
        1 => parts.remove(0),
        _ => doc! { "$and": parts },
    })
}

fn compile_operators(ops: &[Operator]) -> StoreResult<Document> {
    let mut doc = Document::new();
    for op in ops {
        match op {
            Operator::Search(needle) => {
                doc.insert("$regex", regex::escape(needle));
                doc.insert("$options", "i");
            }
            Operator::In(values) | Operator::Nin(values) => {
                let values = values.iter().map(to_bson).collect::<StoreResult<Vec<_>>>()?;
                doc.insert(op.name(), values);
            }
            Operator::Ne(value)
            | Operator::Lt(value)
            | Operator::Lte(value)
            | Operator::Gt(value)
            | Operator::Gte(value) => {
                doc.insert(op.name(), to_bson(value)?);
            }
        }
    }
    Ok(doc)
}

/// Compile the whole query filter (the implicit top-level conjunction)
fn compile_query_filter(query: &Query) -> StoreResult<Document> {
    compile_conjunction(&query.conditions)
}

/// Sort document; falls back to `_id` so listings follow creation order
fn compile_sort(query: Option<&Query>) -> Document {
    let mut sort = Document::new();
    if let Some(query) = query {
        for key in &query.sort {
            let direction = match key.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            sort.insert(field_name(&key.field), direction);
        }
    }
    if !sort.contains_key(MONGO_ID) {
        sort.insert(MONGO_ID, 1);
    }
    sort
}

/// Projection for `$select`; `_id` is always returned
fn compile_projection(select: &[String]) -> Document {
    let mut projection = doc! { MONGO_ID: 1 };
    for field in select {
        projection.insert(field_name(field), 1);
    }
    projection
}

// ---------------------------------------------------------------------------
// MongoAdapter
// ---------------------------------------------------------------------------

/// Data adapter backed by MongoDB.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use recordkit::storage::MongoAdapter;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let adapter = MongoAdapter::new(client.database("mydb"));
/// let record = adapter.create(CreateProps::new("users", fields)).await?;
/// ```
pub struct MongoAdapter<R = Record, W = Fields> {
    database: Database,
    _marker: PhantomData<fn() -> (R, W)>,
}

impl<R, W> Clone for MongoAdapter<R, W> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            _marker: PhantomData,
        }
    }
}

impl MongoAdapter {
    /// Create a new `MongoAdapter` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            _marker: PhantomData,
        }
    }
}

impl<R, W> MongoAdapter<R, W> {
    /// A view over the same database with other record types
    pub fn typed<R2, W2>(&self) -> MongoAdapter<R2, W2> {
        MongoAdapter {
            database: self.database.clone(),
            _marker: PhantomData,
        }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, table: &str) -> mongodb::Collection<Document> {
        self.database.collection(table)
    }
}

#[async_trait]
impl<R: Readable, W: Writable> DataAdapter<R, W> for MongoAdapter<R, W> {
    async fn find(&self, props: FindProps) -> StoreResult<R> {
        let doc = self
            .collection(&props.table)
            .find_one(doc! { MONGO_ID: &props.id })
            .await
            .map_err(|e| backend_error("find record", &props.table, e))?
            .ok_or_else(|| StoreError::not_found(&props.table, &props.id))?;

        from_fields(document_to_fields(doc)?)
    }

    async fn create(&self, props: CreateProps<W>) -> StoreResult<R> {
        let id = new_id();
        let fields = with_id(to_fields(&props.data)?, &id);
        let doc = fields_to_document(fields.clone())?;

        self.collection(&props.table)
            .insert_one(doc)
            .await
            .map_err(|e| backend_error("create record", &props.table, e))?;

        tracing::debug!(table = %props.table, id = %id, "created record");
        from_fields(fields)
    }

    async fn update(&self, props: UpdateProps<W::Patch>) -> StoreResult<R> {
        let mut patch = to_fields(&props.data)?;
        patch.remove(ID_FIELD);

        let collection = self.collection(&props.table);
        let filter = doc! { MONGO_ID: &props.id };

        // `$set` rejects an empty document
        let doc = if patch.is_empty() {
            collection.find_one(filter).await
        } else {
            let set = fields_to_document(patch)?;
            collection
                .find_one_and_update(filter, doc! { "$set": set })
                .return_document(ReturnDocument::After)
                .await
        }
        .map_err(|e| backend_error("update record", &props.table, e))?
        .ok_or_else(|| StoreError::not_found(&props.table, &props.id))?;

        tracing::debug!(table = %props.table, id = %props.id, "updated record");
        from_fields(document_to_fields(doc)?)
    }

    async fn remove(&self, props: RemoveProps) -> StoreResult<R> {
        let doc = self
            .collection(&props.table)
            .find_one_and_delete(doc! { MONGO_ID: &props.id })
            .await
            .map_err(|e| backend_error("remove record", &props.table, e))?
            .ok_or_else(|| StoreError::not_found(&props.table, &props.id))?;

        tracing::debug!(table = %props.table, id = %props.id, "removed record");
        from_fields(document_to_fields(doc)?)
    }

    async fn list(&self, props: ListProps) -> StoreResult<Vec<R>> {
        let query = props.query.as_ref();
        let filter = match query {
            Some(query) => compile_query_filter(query)?,
            None => Document::new(),
        };

        let mut find = self
            .collection(&props.table)
            .find(filter)
            .sort(compile_sort(query));

        if let Some(query) = query {
            if let Some(skip) = query.skip {
                find = find.skip(skip as u64);
            }
            if let Some(limit) = query.limit {
                if limit == 0 {
                    return Ok(Vec::new());
                }
                find = find.limit(limit as i64);
            }
            if let Some(select) = &query.select {
                find = find.projection(compile_projection(select));
            }
        }

        let docs: Vec<Document> = find
            .await
            .map_err(|e| backend_error("list records", &props.table, e))?
            .try_collect()
            .await
            .map_err(|e| backend_error("collect records", &props.table, e))?;

        let records = docs
            .into_iter()
            .filter_map(|doc| match document_to_fields(doc) {
                Ok(fields) => Some(fields),
                Err(e) => {
                    tracing::warn!(table = %props.table, error = %e, "skipping unconvertible document");
                    None
                }
            })
            .collect();
        Ok(from_listing(&props.table, records))
    }
}
