use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use irodori_core::{EntityKind, Record, RecordId};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::{CanonicalStore, Replaced};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: CanonicalStore,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, store: CanonicalStore) -> Self {
        Self { config, store }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/{collection}", get(list_rows).post(create_row))
        .route(
            "/api/{collection}/{id}",
            get(get_row).put(update_row).delete(delete_row),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp_millis(),
    })
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    id: RecordId,
}

async fn list_rows(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Record>>, AppError> {
    let kind = parse_collection(&collection)?;
    Ok(Json(state.store.list(kind)?))
}

async fn get_row(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Record>, AppError> {
    let kind = parse_collection(&collection)?;
    let id = parse_id(&id)?;
    state
        .store
        .get(kind, &id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("{kind} {id}")))
}

async fn create_row(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let kind = parse_collection(&collection)?;
    let record = decode(kind, body)?;
    let id = record.id().clone();
    state
        .store
        .create(record)?
        .map(|record| (StatusCode::CREATED, Json(record)))
        .ok_or_else(|| AppError::conflict(format!("{kind} {id} already exists")))
}

async fn update_row(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Record>, AppError> {
    let kind = parse_collection(&collection)?;
    let id = parse_id(&id)?;
    let record = decode(kind, body)?;
    if record.id() != &id {
        return Err(AppError::bad_request(format!(
            "body id {} does not match path id {id}",
            record.id()
        )));
    }

    match state.store.replace(record)? {
        Some(Replaced::Written(record) | Replaced::Stale(record)) => Ok(Json(record)),
        None => Err(AppError::not_found(format!("{kind} {id}"))),
    }
}

async fn delete_row(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<DeletedResponse>, AppError> {
    let kind = parse_collection(&collection)?;
    let id = parse_id(&id)?;
    if state.store.remove(kind, &id)? {
        Ok(Json(DeletedResponse { id }))
    } else {
        Err(AppError::not_found(format!("{kind} {id}")))
    }
}

fn parse_collection(collection: &str) -> Result<EntityKind, AppError> {
    collection
        .parse()
        .map_err(|_| AppError::not_found(format!("unknown collection '{collection}'")))
}

fn parse_id(id: &str) -> Result<RecordId, AppError> {
    id.parse()
        .map_err(|_| AppError::bad_request("id must not be empty"))
}

fn decode(kind: EntityKind, body: Value) -> Result<Record, AppError> {
    let record = Record::from_payload(kind, body)?;
    let missing = match &record {
        Record::Task(task) => task.title.trim().is_empty().then_some("title"),
        Record::Note(note) => note.title.trim().is_empty().then_some("title"),
        Record::Prompt(prompt) => prompt.title.trim().is_empty().then_some("title"),
        Record::ProjectNote(note) => {
            if !note.task_id.is_valid() {
                Some("task_id")
            } else if note.content.trim().is_empty() {
                Some("content")
            } else {
                None
            }
        }
    };
    match missing {
        Some(field) => Err(AppError::bad_request(format!("{kind} {field} is required"))),
        None => Ok(record),
    }
}
