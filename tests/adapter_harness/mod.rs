//! Shared test harness for adapter testing
//!
//! Provides helpers for seeding and inspecting untyped records, plus the
//! `adapter_contract_tests!` macro (see [`contract`]).
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod adapter_harness;
//! use adapter_harness::*;
//!
//! adapter_contract_tests!(InMemoryAdapter::new());
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod contract;

use recordkit::core::{CreateProps, DataAdapter, Fields, Record};
use serde_json::Value;

/// Turn a `json!` object literal into a field map
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Create one `{name, age}` record per entry, in order
pub async fn seed_people<A>(adapter: &A, table: &str, people: &[(&str, i64)]) -> Vec<Record>
where
    A: DataAdapter<Record, Fields> + ?Sized,
{
    let mut created = Vec::with_capacity(people.len());
    for (name, age) in people {
        let record = adapter
            .create(CreateProps::new(
                table,
                fields(serde_json::json!({ "name": name, "age": age })),
            ))
            .await
            .unwrap();
        created.push(record);
    }
    created
}

/// The standard fixture: ages 10, 20 and 30
pub async fn seed_ages<A>(adapter: &A, table: &str) -> Vec<Record>
where
    A: DataAdapter<Record, Fields> + ?Sized,
{
    seed_people(adapter, table, &[("a", 10), ("b", 20), ("c", 30)]).await
}

/// Extract the `age` field of every record
pub fn ages(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| {
            r.fields
                .get("age")
                .and_then(Value::as_i64)
                .unwrap_or_else(|| panic!("record {} has no integer age", r.id))
        })
        .collect()
}

/// Extract the `name` field of every record
pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| {
            r.fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
