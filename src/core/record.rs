//! Record shapes shared by every adapter
//!
//! Adapters store records as JSON objects that always carry a string `id`.
//! Callers pick their own typed view on top of that:
//!
//! - a **Readable** type is what the storage hands back (it includes `id`)
//! - a **Writable** type is what a client submits on create; its `Patch`
//!   is the partial shape accepted by update
//!
//! [`Record`] and [`Fields`] are the untyped defaults.

use crate::core::error::{StoreError, StoreResult};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use uuid::Uuid;

/// Name of the reserved identifier field
pub const ID_FIELD: &str = "id";

/// A field-name to value mapping, as submitted by clients
pub type Fields = Map<String, Value>;

/// A stored record: its `id` plus every other field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Get a field value, `id` included
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            Some(Value::String(self.id.clone()))
        } else {
            self.fields.get(field).cloned()
        }
    }
}

/// Server-shaped record type returned by adapters
pub trait Readable: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Readable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Client-submitted record type accepted by `create`
///
/// `Patch` is the partial form accepted by `update`. Fields that serialize to
/// nothing (for example `Option` fields with `skip_serializing_if`) are left
/// untouched by the merge.
///
/// ```rust,ignore
/// #[derive(Serialize)]
/// struct NewUser { name: String, age: u32 }
///
/// #[derive(Serialize, Default)]
/// struct UserPatch {
///     #[serde(skip_serializing_if = "Option::is_none")]
///     name: Option<String>,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     age: Option<u32>,
/// }
///
/// impl Writable for NewUser {
///     type Patch = UserPatch;
/// }
/// ```
pub trait Writable: Serialize + Send + Sync + 'static {
    type Patch: Serialize + Send + Sync + 'static;
}

impl Writable for Fields {
    type Patch = Fields;
}

/// Serialize a writable value into a field map
///
/// Fails with `Serialization` if the value is not a JSON object.
pub fn to_fields<T: Serialize + ?Sized>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization {
            message: format!("expected an object, got {}", type_name(&other)),
        }),
    }
}

/// Decode a stored field map (which carries `id`) into a readable type
pub fn from_fields<R: DeserializeOwned>(fields: Fields) -> StoreResult<R> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Decode the records of a listing, skipping the ones that do not fit `R`
///
/// A single malformed record must not hide the rest of the table; each one
/// dropped here is logged with its table and id.
pub fn from_listing<R: DeserializeOwned>(table: &str, records: Vec<Fields>) -> Vec<R> {
    records
        .into_iter()
        .filter_map(|fields| {
            let id = fields
                .get(ID_FIELD)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match from_fields(fields) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(table = %table, id = %id, error = %e, "skipping undecodable record");
                    None
                }
            }
        })
        .collect()
}

/// Build the stored form of a fresh record: submitted data plus `id`
///
/// A client-supplied `id` is discarded; the storage layer owns identifiers.
pub fn with_id(mut data: Fields, id: &str) -> Fields {
    data.remove(ID_FIELD);
    data.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    data
}

/// Shallow-merge `patch` over `existing`
///
/// Submitted fields win, unspecified fields are retained and `id` can never
/// be overwritten. Nested objects are replaced whole, not merged.
pub fn merge_fields(existing: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        if key == ID_FIELD {
            continue;
        }
        existing.insert(key, value);
    }
}

/// Generate a fresh record id
///
/// UUIDv7 ids are time-ordered, so sorting by id follows creation order.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Check that a table name or record id is a single safe path segment
pub fn validate_name(kind: &'static str, value: &str) -> StoreResult<()> {
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]{0,254}$").expect("name regex is valid")
    });

    if regex.is_match(value) {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            kind,
            value: value.to_string(),
        })
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_flattens_fields() {
        let record: Record = serde_json::from_value(json!({"id": "x", "age": 5})).unwrap();
        assert_eq!(record.id, "x");
        assert_eq!(record.get("age"), Some(json!(5)));
        assert_eq!(record.get("id"), Some(json!("x")));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"id": "x", "age": 5})
        );
    }

    #[test]
    fn test_from_listing_skips_records_that_do_not_decode() {
        #[derive(Debug, Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let records = vec![
            fields(json!({"id": "1", "name": "ok"})),
            fields(json!({"id": "2", "name": 5})),
            fields(json!({"id": "3", "name": "also ok"})),
        ];
        let named: Vec<Named> = from_listing("people", records);

        assert_eq!(named.len(), 2);
        assert_eq!(named[0].id, "1");
        assert_eq!(named[1].name, "also ok");
    }

    #[test]
    fn test_with_id_overrides_client_id() {
        let stored = with_id(fields(json!({"id": "forged", "name": "a"})), "real");
        assert_eq!(stored.get("id"), Some(&json!("real")));
        assert_eq!(stored.get("name"), Some(&json!("a")));
    }

    #[test]
    fn test_merge_submitted_fields_win() {
        let mut existing = fields(json!({"id": "1", "name": "a", "age": 3}));
        merge_fields(&mut existing, fields(json!({"age": 4})));
        assert_eq!(Value::Object(existing), json!({"id": "1", "name": "a", "age": 4}));
    }

    #[test]
    fn test_merge_never_touches_id() {
        let mut existing = fields(json!({"id": "1"}));
        merge_fields(&mut existing, fields(json!({"id": "2", "x": true})));
        assert_eq!(existing.get("id"), Some(&json!("1")));
        assert_eq!(existing.get("x"), Some(&json!(true)));
    }

    #[test]
    fn test_merge_replaces_nested_objects() {
        let mut existing = fields(json!({"id": "1", "address": {"city": "Lyon", "zip": "69000"}}));
        merge_fields(&mut existing, fields(json!({"address": {"city": "Paris"}})));
        assert_eq!(existing.get("address"), Some(&json!({"city": "Paris"})));
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(to_fields(&json!([1, 2])).is_err());
        assert!(to_fields(&json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_new_ids_are_unique_and_ordered() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("table", "users").is_ok());
        assert!(validate_name("id", "0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b").is_ok());
        assert!(validate_name("table", "").is_err());
        assert!(validate_name("table", "..").is_err());
        assert!(validate_name("table", "a/b").is_err());
        assert!(validate_name("table", ".hidden").is_err());
    }
}
