//! REST exposure of a data adapter
//!
//! Routes mirror what [`HttpAdapter`](crate::client::HttpAdapter) sends, so
//! a client adapter pointed at this router round-trips every operation:
//!
//! - `GET    /{table}`       list, query string in flattened bracket form
//! - `POST   /{table}`       create
//! - `GET    /{table}/{id}`  find
//! - `PATCH  /{table}/{id}`  update
//! - `DELETE /{table}/{id}`  remove
//!
//! Errors are rendered by the `IntoResponse` impl of
//! [`StoreError`](crate::core::StoreError). Request bodies must be JSON
//! objects; anything else is rejected by the `Json` extractor.

use crate::core::error::StoreResult;
use crate::core::query::Query as RecordQuery;
use crate::core::record::{Fields, Record};
use crate::core::service::{
    CreateProps, DataAdapter, FindProps, ListProps, RemoveProps, UpdateProps,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;

/// Adapter shared by every handler
pub type SharedAdapter = Arc<dyn DataAdapter<Record, Fields>>;

/// Shared state of the REST handlers
#[derive(Clone)]
pub struct AppState {
    pub adapter: SharedAdapter,
}

/// Build the CRUD and health routes over `adapter`
pub fn build_router(adapter: SharedAdapter) -> Router {
    let state = AppState { adapter };

    Router::new()
        .route("/health", get(health_check))
        .route("/{table}", get(list_records).post(create_record))
        .route(
            "/{table}/{id}",
            get(find_record).patch(update_record).delete(remove_record),
        )
        .with_state(state)
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "recordkit"
    }))
}

async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> StoreResult<Json<Vec<Record>>> {
    let query = RecordQuery::from_params(params)?;
    let props = if query.is_empty() {
        ListProps::new(table)
    } else {
        ListProps::new(table).with_query(query)
    };

    let records = state.adapter.list(props).await?;
    Ok(Json(records))
}

async fn create_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(data): Json<Fields>,
) -> StoreResult<(StatusCode, Json<Record>)> {
    let record = state.adapter.create(CreateProps::new(table, data)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn find_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> StoreResult<Json<Record>> {
    let record = state.adapter.find(FindProps::new(table, id)).await?;
    Ok(Json(record))
}

async fn update_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(data): Json<Fields>,
) -> StoreResult<Json<Record>> {
    let record = state
        .adapter
        .update(UpdateProps::new(table, id, data))
        .await?;
    Ok(Json(record))
}

async fn remove_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> StoreResult<Json<Record>> {
    let record = state.adapter.remove(RemoveProps::new(table, id)).await?;
    Ok(Json(record))
}
