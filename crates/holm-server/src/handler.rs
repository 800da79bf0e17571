use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use holm_db::{Database, Document};
use holm_types::Cid;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

/// Body of `POST /api/documents`.
#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    /// The document to store.
    pub doc: Value,
    /// Explicit key; generated when absent.
    #[serde(default)]
    pub key: Option<String>,
}

/// Response of `POST /api/documents`.
#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub cid: String,
    pub key: String,
}

/// One document in API responses.
#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub key: String,
    pub cid: String,
    pub value: Value,
}

impl From<Document> for DocumentView {
    fn from(doc: Document) -> Self {
        Self {
            key: doc.key,
            cid: doc.cid.to_hex(),
            value: payload_json(&doc.value),
        }
    }
}

/// Health check payload.
#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

/// `GET /api/documents`: every live document.
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    let documents = state.db.all().await?;
    Ok(Json(
        documents.into_iter().map(DocumentView::from).collect(),
    ))
}

/// `POST /api/documents`: store a document, generating a key when none is
/// given.
pub async fn create_document(
    State(state): State<AppState>,
    Json(body): Json<CreateDocument>,
) -> Result<Json<CreateResponse>, ApiError> {
    let payload = serde_json::to_vec(&body.doc)
        .map_err(|e| ApiError::BadRequest(format!("unserializable document: {e}")))?;
    let result = state.db.put(body.key, &payload).await?;
    Ok(Json(CreateResponse {
        cid: result.cid.to_hex(),
        key: result.key,
    }))
}

/// `GET /api/documents/:cid`: fetch a payload by content id.
///
/// Content-id lookup is distinct from key lookup: it serves any payload the
/// store holds, including superseded document versions.
pub async fn fetch_payload(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cid = Cid::from_hex(&cid)
        .map_err(|_| ApiError::BadRequest(format!("invalid content id: {cid}")))?;
    match state.db.get_by_cid(&cid).await? {
        Some(bytes) => Ok(Json(payload_json(&bytes))),
        None => Err(ApiError::NotFound(format!("payload {cid}"))),
    }
}

/// `GET /v1/health`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `GET /v1/info`: server identity and database counters.
pub async fn info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.db.stats().await?;
    Ok(Json(json!({
        "name": "holm-server",
        "version": env!("CARGO_PKG_VERSION"),
        "author": state.db.author().to_hex(),
        "stats": stats,
    })))
}

/// Decode a stored payload for presentation. Payloads written through the
/// API are JSON; anything else (raw CLI writes) is shown as a string.
fn payload_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
