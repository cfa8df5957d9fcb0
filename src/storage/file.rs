//! File-backed storage adapter.
//!
//! Every record lives in its own JSON file:
//!
//! ```text
//! <root>/<table>/<id>.json
//! ```
//!
//! Tables are directories created lazily on the first write. Reads go
//! straight to the filesystem; writes and deletions are funnelled through a
//! [`WriteGate`] keyed by table name, so two writes to the same table never
//! interleave.
//!
//! # Write protocol
//!
//! A record is first written and synced to a hidden temporary sibling
//! (`.<id>.json.tmp`) and then renamed over its final path. Readers therefore
//! see either the previous or the new version of a record, never a torn one.
//!
//! # Listing
//!
//! `list` reads every `*.json` file of the table in file-name order. Ids are
//! time-ordered UUIDv7 strings, so this is creation order. A file that fails
//! to parse is logged and skipped instead of failing the whole listing.

use crate::config::StoreConfig;
use crate::core::error::{StoreError, StoreResult};
use crate::core::filter::apply_query;
use crate::core::gate::WriteGate;
use crate::core::query::Query;
use crate::core::record::{
    Fields, ID_FIELD, Readable, Record, Writable, from_fields, from_listing, merge_fields, new_id,
    to_fields,
    validate_name, with_id,
};
use crate::core::service::{
    CreateProps, DataAdapter, FindProps, ListProps, RemoveProps, UpdateProps,
};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Extension of record files
pub const RECORD_EXTENSION: &str = "json";

const TEMP_EXTENSION: &str = "tmp";

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn encode_record(fields: &Fields) -> StoreResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(fields)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn decode_record(bytes: &[u8], id: &str) -> StoreResult<Fields> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(mut fields) => {
            if !fields.contains_key(ID_FIELD) {
                fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            }
            Ok(fields)
        }
        _ => Err(StoreError::Serialization {
            message: format!("record file for '{}' does not hold a JSON object", id),
        }),
    }
}

// ---------------------------------------------------------------------------
// FileAdapter
// ---------------------------------------------------------------------------

/// Stores one JSON file per record under a root directory
///
/// `R` and `W` are the readable and writable record types of the
/// [`DataAdapter`] view; they default to the untyped [`Record`] / [`Fields`].
/// Cloning is cheap; clones (and [`FileAdapter::typed`] views) share the same
/// write queues.
///
/// # Example
///
/// ```rust,ignore
/// use recordkit::prelude::*;
///
/// let adapter = FileAdapter::new("./database");
/// let user = adapter.create(CreateProps::new("users", fields)).await?;
///
/// // Same storage and write queues, typed records
/// let typed: FileAdapter<User, NewUser> = adapter.typed();
/// ```
pub struct FileAdapter<R = Record, W = Fields> {
    root: PathBuf,
    gate: WriteGate,
    _marker: PhantomData<fn() -> (R, W)>,
}

impl<R, W> Clone for FileAdapter<R, W> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            gate: self.gate.clone(),
            _marker: PhantomData,
        }
    }
}

impl FileAdapter {
    /// Create an adapter rooted at `root`; nothing is touched on disk yet
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            gate: WriteGate::new(),
            _marker: PhantomData,
        }
    }

    /// Create an adapter rooted at the configured database path
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.database_path.clone())
    }
}

impl<R, W> FileAdapter<R, W> {
    /// A view over the same storage with other record types
    pub fn typed<R2, W2>(&self) -> FileAdapter<R2, W2> {
        FileAdapter {
            root: self.root.clone(),
            gate: self.gate.clone(),
            _marker: PhantomData,
        }
    }

    /// The storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &str) -> StoreResult<PathBuf> {
        validate_name("table", table)?;
        Ok(self.root.join(table))
    }

    fn record_path(&self, table: &str, id: &str) -> StoreResult<PathBuf> {
        validate_name("id", id)?;
        Ok(self
            .table_dir(table)?
            .join(format!("{}.{}", id, RECORD_EXTENSION)))
    }

    // === Untyped operations ===

    /// Read one record
    pub async fn read_record(&self, table: &str, id: &str) -> StoreResult<Fields> {
        let path = self.record_path(table, id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::from_io(e, "read", &path, table, id))?;
        decode_record(&bytes, id)
    }

    /// Read every record of a table in file-name order, skipping corrupt files
    pub async fn read_table(&self, table: &str) -> StoreResult<Vec<Fields>> {
        let dir = self.table_dir(table)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(table = %table, "table directory absent, listing nothing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::from_io(e, "list", &dir, table, "")),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::from_io(e, "list", &dir, table, ""))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let path = dir.join(format!("{}.{}", id, RECORD_EXTENSION));
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(table = %table, id = %id, "record removed while listing");
                    continue;
                }
                Err(e) => return Err(StoreError::from_io(e, "read", &path, table, &id)),
            };
            match decode_record(&bytes, &id) {
                Ok(fields) => records.push(fields),
                Err(e) => {
                    tracing::warn!(
                        table = %table,
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable record file"
                    );
                }
            }
        }

        Ok(records)
    }

    /// Persist `fields` as the record `id`, waiting for the write to land
    pub async fn write_record(&self, table: &str, id: &str, fields: &Fields) -> StoreResult<()> {
        let dir = self.table_dir(table)?;
        let path = self.record_path(table, id)?;
        let temp = dir.join(format!(".{}.{}.{}", id, RECORD_EXTENSION, TEMP_EXTENSION));
        let bytes = encode_record(fields)?;
        let (table_name, record_id) = (table.to_string(), id.to_string());

        self.gate
            .run(table, async move {
                let io = |e: std::io::Error, operation: &'static str| StoreError::Io {
                    operation,
                    path: path.display().to_string(),
                    message: format!("{} ({}/{})", e, table_name, record_id),
                };

                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| io(e, "create table directory"))?;

                let mut file = tokio::fs::File::create(&temp)
                    .await
                    .map_err(|e| io(e, "create"))?;
                file.write_all(&bytes).await.map_err(|e| io(e, "write"))?;
                file.sync_all().await.map_err(|e| io(e, "sync"))?;
                drop(file);

                tokio::fs::rename(&temp, &path)
                    .await
                    .map_err(|e| io(e, "rename"))
            })
            .await
    }

    /// Delete the file of record `id`
    pub async fn delete_record(&self, table: &str, id: &str) -> StoreResult<()> {
        let path = self.record_path(table, id)?;
        let (table_name, record_id) = (table.to_string(), id.to_string());

        self.gate
            .run(table, async move {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| StoreError::from_io(e, "remove", &path, &table_name, &record_id))
            })
            .await
    }

    /// `create` over raw fields
    pub async fn create_fields(&self, table: &str, data: Fields) -> StoreResult<Fields> {
        validate_name("table", table)?;
        let id = new_id();
        let fields = with_id(data, &id);
        self.write_record(table, &id, &fields).await?;
        tracing::debug!(table = %table, id = %id, "created record");
        Ok(fields)
    }

    /// `update` over raw fields
    pub async fn update_fields(&self, table: &str, id: &str, patch: Fields) -> StoreResult<Fields> {
        let mut fields = self.read_record(table, id).await?;
        merge_fields(&mut fields, patch);
        self.write_record(table, id, &fields).await?;
        tracing::debug!(table = %table, id = %id, "updated record");
        Ok(fields)
    }

    /// `remove` over raw fields
    pub async fn remove_fields(&self, table: &str, id: &str) -> StoreResult<Fields> {
        let fields = self.read_record(table, id).await?;
        self.delete_record(table, id).await?;
        tracing::debug!(table = %table, id = %id, "removed record");
        Ok(fields)
    }

    /// `list` over raw fields
    pub async fn list_fields(&self, table: &str, query: Option<&Query>) -> StoreResult<Vec<Fields>> {
        let records = self.read_table(table).await?;
        Ok(apply_query(records, query))
    }
}

#[async_trait]
impl<R: Readable, W: Writable> DataAdapter<R, W> for FileAdapter<R, W> {
    async fn find(&self, props: FindProps) -> StoreResult<R> {
        from_fields(self.read_record(&props.table, &props.id).await?)
    }

    async fn create(&self, props: CreateProps<W>) -> StoreResult<R> {
        let data = to_fields(&props.data)?;
        from_fields(self.create_fields(&props.table, data).await?)
    }

    async fn update(&self, props: UpdateProps<W::Patch>) -> StoreResult<R> {
        let patch = to_fields(&props.data)?;
        from_fields(self.update_fields(&props.table, &props.id, patch).await?)
    }

    async fn remove(&self, props: RemoveProps) -> StoreResult<R> {
        from_fields(self.remove_fields(&props.table, &props.id).await?)
    }

    async fn list(&self, props: ListProps) -> StoreResult<Vec<R>> {
        let records = self.list_fields(&props.table, props.query.as_ref()).await?;
        Ok(from_listing(&props.table, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_record_file_layout() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        let created = adapter
            .create_fields("users", fields(json!({"name": "alice"})))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();

        let path = dir.path().join("users").join(format!("{}.json", id));
        let on_disk: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"name": "alice", "id": id}));
    }

    #[tokio::test]
    async fn test_table_directory_is_created_lazily() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        assert!(adapter.read_table("users").await.unwrap().is_empty());
        assert!(!dir.path().join("users").exists());

        adapter.create_fields("users", Fields::new()).await.unwrap();
        assert!(dir.path().join("users").is_dir());
    }

    #[tokio::test]
    async fn test_corrupt_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        adapter
            .create_fields("users", fields(json!({"name": "alice"})))
            .await
            .unwrap();
        let table = dir.path().join("users");
        std::fs::write(table.join("broken.json"), b"{ not json").unwrap();
        std::fs::write(table.join("array.json"), b"[1, 2]").unwrap();
        std::fs::write(table.join(".pending.json.tmp"), b"{}").unwrap();
        std::fs::write(table.join("notes.txt"), b"ignored").unwrap();

        let records = adapter.read_table("users").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], json!("alice"));
    }

    #[tokio::test]
    async fn test_missing_id_in_file_is_taken_from_name() {
        let dir = TempDir::new().unwrap();
        let table = dir.path().join("users");
        std::fs::create_dir_all(&table).unwrap();
        std::fs::write(table.join("legacy.json"), br#"{"name": "old"}"#).unwrap();

        let adapter = FileAdapter::new(dir.path());
        let record = adapter.read_record("users", "legacy").await.unwrap();
        assert_eq!(record["id"], json!("legacy"));
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        let err = adapter.read_record("../etc", "passwd").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { kind: "table", .. }));

        let err = adapter.read_record("users", "../x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { kind: "id", .. }));
    }

    #[tokio::test]
    async fn test_delete_of_vanished_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        let created = adapter.create_fields("users", Fields::new()).await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        adapter.delete_record("users", &id).await.unwrap();
        let err = adapter.delete_record("users", &id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_other_fields() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        let created = adapter
            .create_fields("users", fields(json!({"name": "alice", "age": 3})))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let updated = adapter
            .update_fields("users", &id, fields(json!({"age": 4, "id": "hijack"})))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(updated),
            json!({"id": id, "name": "alice", "age": 4})
        );
        assert!(adapter.read_record("users", "hijack").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_follows_creation_order() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path());

        for n in 0..5 {
            adapter
                .create_fields("items", fields(json!({"n": n})))
                .await
                .unwrap();
        }

        let listed = adapter.list_fields("items", None).await.unwrap();
        let ns: Vec<i64> = listed.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);
    }
}
