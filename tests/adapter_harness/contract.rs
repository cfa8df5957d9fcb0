//! Macro-generated test suite for `DataAdapter<Record, Fields>` contract validation.
//!
//! The `adapter_contract_tests!` macro generates a test module that validates
//! any untyped adapter against the full contract: CRUD, the query language
//! and concurrent writes.
//!
//! # Generated Tests
//!
//! ## CRUD
//! - `test_create_then_find`: created and found records are deep-equal
//! - `test_create_assigns_fresh_ids`: client ids are discarded, ids are unique
//! - `test_find_missing`: NotFound for unknown id and unknown table
//! - `test_update_merges_fields`: only submitted fields change, id is kept
//! - `test_update_replaces_nested_values`: nested objects are not deep-merged
//! - `test_update_missing`: NotFound
//! - `test_remove_returns_prior_state`: then find is NotFound
//! - `test_remove_missing`: NotFound
//!
//! ## List
//! - `test_list_empty_table`: never-created table lists as empty
//! - `test_list_creation_order`: unsorted listing follows creation order
//! - `test_list_tables_isolated`
//! - `test_list_gte_filter`, `test_list_sort_limit`, `test_list_skip`,
//!   `test_list_select`, `test_list_or_and`, `test_list_in_nin`,
//!   `test_list_ne_missing_field`, `test_list_search`, `test_list_multi_key_sort`
//!
//! ## Concurrency
//! - `test_concurrent_creates`: parallel creates on one table

/// Generate a full `DataAdapter<Record, Fields>` conformance test suite.
///
/// `$factory` must be an expression that evaluates to a fresh, empty adapter.
/// It is re-evaluated for each test to ensure isolation. For the concurrent
/// test, the adapter must also be `Clone + 'static` (shared state via Arc).
macro_rules! adapter_contract_tests {
    ($factory:expr) => {
        mod adapter_contract_tests {
            use super::*;
            use recordkit::core::{
                CreateProps, DataAdapter, FindProps, ListProps, Query, RemoveProps, StoreError,
                UpdateProps,
            };
            use serde_json::json;
            use std::collections::HashSet;

            // ==================================================================
            // CRUD: Create & Find
            // ==================================================================

            #[tokio::test]
            async fn test_create_then_find() {
                let adapter = $factory;

                let created = adapter
                    .create(CreateProps::new(
                        "users",
                        fields(json!({"name": "alice", "age": 30, "tags": ["a", "b"], "address": {"city": "Paris"}})),
                    ))
                    .await
                    .unwrap();
                assert!(!created.id.is_empty());
                assert_eq!(created.fields["name"], "alice");
                assert_eq!(created.fields["address"]["city"], "Paris");

                let found = adapter
                    .find(FindProps::new("users", created.id.clone()))
                    .await
                    .unwrap();
                assert_eq!(found, created, "find must return what create returned");
            }

            #[tokio::test]
            async fn test_create_assigns_fresh_ids() {
                let adapter = $factory;

                let first = adapter
                    .create(CreateProps::new("users", fields(json!({"id": "mine", "n": 1}))))
                    .await
                    .unwrap();
                let second = adapter
                    .create(CreateProps::new("users", fields(json!({"n": 2}))))
                    .await
                    .unwrap();

                assert_ne!(first.id, "mine", "client-supplied ids are not honoured");
                assert_ne!(first.id, second.id);
            }

            #[tokio::test]
            async fn test_find_missing() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let err = adapter
                    .find(FindProps::new("users", "does-not-exist"))
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::NotFound { .. }), "got {:?}", err);

                let err = adapter
                    .find(FindProps::new("never_created", "does-not-exist"))
                    .await
                    .unwrap_err();
                assert!(err.is_not_found(), "got {:?}", err);
            }

            // ==================================================================
            // CRUD: Update
            // ==================================================================

            #[tokio::test]
            async fn test_update_merges_fields() {
                let adapter = $factory;
                let created = adapter
                    .create(CreateProps::new("users", fields(json!({"f": 1, "g": 2}))))
                    .await
                    .unwrap();

                let updated = adapter
                    .update(UpdateProps::new(
                        "users",
                        created.id.clone(),
                        fields(json!({"f": 9, "id": "hijack"})),
                    ))
                    .await
                    .unwrap();

                assert_eq!(updated.id, created.id, "id is immutable");
                assert_eq!(updated.fields["f"], 9);
                assert_eq!(updated.fields["g"], 2);

                let found = adapter
                    .find(FindProps::new("users", created.id.clone()))
                    .await
                    .unwrap();
                assert_eq!(found, updated, "update must be persisted");
            }

            #[tokio::test]
            async fn test_update_replaces_nested_values() {
                let adapter = $factory;
                let created = adapter
                    .create(CreateProps::new(
                        "users",
                        fields(json!({"address": {"city": "Paris", "zip": "75001"}})),
                    ))
                    .await
                    .unwrap();

                let updated = adapter
                    .update(UpdateProps::new(
                        "users",
                        created.id,
                        fields(json!({"address": {"city": "Lyon"}})),
                    ))
                    .await
                    .unwrap();

                assert_eq!(updated.fields["address"], json!({"city": "Lyon"}));
            }

            #[tokio::test]
            async fn test_update_missing() {
                let adapter = $factory;

                let err = adapter
                    .update(UpdateProps::new("users", "ghost", fields(json!({"f": 1}))))
                    .await
                    .unwrap_err();
                assert!(err.is_not_found(), "got {:?}", err);
            }

            // ==================================================================
            // CRUD: Remove
            // ==================================================================

            #[tokio::test]
            async fn test_remove_returns_prior_state() {
                let adapter = $factory;
                let created = adapter
                    .create(CreateProps::new("users", fields(json!({"name": "bob"}))))
                    .await
                    .unwrap();

                let removed = adapter
                    .remove(RemoveProps::new("users", created.id.clone()))
                    .await
                    .unwrap();
                assert_eq!(removed, created);

                let err = adapter
                    .find(FindProps::new("users", created.id))
                    .await
                    .unwrap_err();
                assert!(err.is_not_found(), "got {:?}", err);

                let all = adapter.list(ListProps::new("users")).await.unwrap();
                assert!(all.is_empty());
            }

            #[tokio::test]
            async fn test_remove_missing() {
                let adapter = $factory;

                let err = adapter
                    .remove(RemoveProps::new("users", "ghost"))
                    .await
                    .unwrap_err();
                assert!(err.is_not_found(), "got {:?}", err);
            }

            // ==================================================================
            // List
            // ==================================================================

            #[tokio::test]
            async fn test_list_empty_table() {
                let adapter = $factory;

                let all = adapter.list(ListProps::new("never_created")).await.unwrap();
                assert!(all.is_empty());

                let filtered = adapter
                    .list(ListProps::new("never_created").with_query(Query::new().gte("age", 1)))
                    .await
                    .unwrap();
                assert!(filtered.is_empty());
            }

            #[tokio::test]
            async fn test_list_creation_order() {
                let adapter = $factory;
                let seeded = seed_people(
                    &adapter,
                    "people",
                    &[("e", 5), ("a", 1), ("d", 4), ("b", 2), ("c", 3)],
                )
                .await;

                let all = adapter.list(ListProps::new("people")).await.unwrap();
                assert_eq!(all, seeded);
            }

            #[tokio::test]
            async fn test_list_tables_isolated() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;
                seed_people(&adapter, "pets", &[("rex", 3)]).await;

                assert_eq!(adapter.list(ListProps::new("users")).await.unwrap().len(), 3);
                assert_eq!(adapter.list(ListProps::new("pets")).await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_list_gte_filter() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let query = Query::from_value(&json!({"age": {"$gte": 15}})).unwrap();
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![20, 30]);
            }

            #[tokio::test]
            async fn test_list_ignores_unknown_operators() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let query = Query::from_value(&json!({"age": {"$exists": true}})).unwrap();
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![10, 20, 30]);

                let query =
                    Query::from_value(&json!({"age": {"$exists": true, "$gt": 15}})).unwrap();
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![20, 30]);
            }

            #[tokio::test]
            async fn test_list_sort_limit() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let query = Query::from_value(&json!({"$sort": {"age": -1}, "$limit": 2})).unwrap();
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![30, 20]);
            }

            #[tokio::test]
            async fn test_list_skip() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().sort_asc("age").skip(1)))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![20, 30]);

                let none = adapter
                    .list(ListProps::new("users").with_query(Query::new().skip(10)))
                    .await
                    .unwrap();
                assert!(none.is_empty());
            }

            #[tokio::test]
            async fn test_list_select() {
                let adapter = $factory;
                let created = seed_people(&adapter, "users", &[("a", 5)]).await;

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().select(["age"])))
                    .await
                    .unwrap();
                assert_eq!(found.len(), 1);
                assert_eq!(found[0].id, created[0].id, "id survives projection");
                assert_eq!(found[0].fields, fields(json!({"age": 5})));
            }

            #[tokio::test]
            async fn test_list_or_and() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let query = Query::from_value(&json!({
                    "$or": [{"name": "a"}, {"age": {"$gt": 25}}]
                }))
                .unwrap();
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(names(&found), vec!["a", "c"]);

                let query = Query::from_value(&json!({
                    "$and": [{"age": {"$gt": 5}}, {"age": {"$lt": 25}}]
                }))
                .unwrap();
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![10, 20]);
            }

            #[tokio::test]
            async fn test_list_in_nin() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().is_in("age", [10, 30])))
                    .await
                    .unwrap();
                assert_eq!(ages(&found), vec![10, 30]);

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().not_in("name", ["a", "b"])))
                    .await
                    .unwrap();
                assert_eq!(names(&found), vec!["c"]);
            }

            #[tokio::test]
            async fn test_list_ne_missing_field() {
                let adapter = $factory;
                seed_ages(&adapter, "users").await;
                adapter
                    .create(CreateProps::new("users", fields(json!({"name": "no-age"}))))
                    .await
                    .unwrap();

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().ne("age", 10)))
                    .await
                    .unwrap();
                assert_eq!(names(&found), vec!["b", "c", "no-age"]);

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().lt("age", 100)))
                    .await
                    .unwrap();
                assert_eq!(found.len(), 3, "a missing field never satisfies $lt");
            }

            #[tokio::test]
            async fn test_list_search() {
                let adapter = $factory;
                seed_people(
                    &adapter,
                    "users",
                    &[("Alice Smith", 1), ("bob", 2), ("MALICE", 3), ("a.b", 4)],
                )
                .await;

                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().search("name", "alice")))
                    .await
                    .unwrap();
                assert_eq!(names(&found), vec!["Alice Smith", "MALICE"]);

                // Needles are literal text, not patterns
                let found = adapter
                    .list(ListProps::new("users").with_query(Query::new().search("name", ".")))
                    .await
                    .unwrap();
                assert_eq!(names(&found), vec!["a.b"]);
            }

            #[tokio::test]
            async fn test_list_multi_key_sort() {
                let adapter = $factory;
                seed_people(
                    &adapter,
                    "users",
                    &[("b", 20), ("a", 30), ("c", 20), ("a", 10)],
                )
                .await;

                let query = Query::new().sort_asc("name").sort_desc("age");
                let found = adapter
                    .list(ListProps::new("users").with_query(query))
                    .await
                    .unwrap();
                assert_eq!(names(&found), vec!["a", "a", "b", "c"]);
                assert_eq!(ages(&found), vec![30, 10, 20, 20]);
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            /// Parallel creates on one table from spawned tasks.
            ///
            /// Requires the adapter to be `Clone + Send + 'static` (Clone shares
            /// the backing store).
            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_creates() {
                let adapter = $factory;

                let handles: Vec<_> = (0..20)
                    .map(|i| {
                        let adapter = adapter.clone();
                        tokio::spawn(async move {
                            adapter
                                .create(CreateProps::new("users", fields(json!({"n": i}))))
                                .await
                        })
                    })
                    .collect();

                let created = tokio::time::timeout(std::time::Duration::from_secs(30), async {
                    futures::future::join_all(handles).await
                })
                .await
                .expect("Concurrent creates timed out after 30s: possible deadlock");

                let ids: HashSet<String> = created
                    .into_iter()
                    .map(|joined| joined.unwrap().unwrap().id)
                    .collect();
                assert_eq!(ids.len(), 20, "every create gets a distinct id");

                for id in &ids {
                    adapter
                        .find(FindProps::new("users", id.clone()))
                        .await
                        .unwrap();
                }
                let all = adapter.list(ListProps::new("users")).await.unwrap();
                assert_eq!(all.len(), 20);
            }
        }
    };
}
