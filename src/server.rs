//! HTTP API: webhook ingestion, sync trigger, auto-assignment and read-only feeds.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::assign::{self, AssignRequest};
use crate::config::Settings;
use crate::models::TaskStatus;
use crate::storage::Storage;
use crate::sync::{self, SyncContext};
use crate::webhook::{self, SIGNATURE_HEADER};
use crate::{Error, ErrorKind};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Storage handle (wrapped in Mutex for thread safety)
    pub storage: Arc<Mutex<Storage>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(storage: Storage, settings: Settings) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            settings: Arc::new(settings),
        }
    }
}

/// Error returned by handlers, rendered as `{success:false, error, kind}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(Error::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream | ErrorKind::Configuration | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.0.kind();
        if status.is_server_error() {
            tracing::error!(kind = kind.as_str(), error = %self.0, "request failed");
        } else {
            tracing::debug!(kind = kind.as_str(), error = %self.0, "request rejected");
        }

        let body = json!({
            "success": false,
            "error": self.0.public_message(),
            "kind": kind,
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/webhooks/linear",
            post(linear_webhook).get(linear_webhook_info),
        )
        .route("/api/sync", post(trigger_sync))
        .route("/api/agent/assign", post(assign_task).get(suggest_agents))
        .route("/api/tasks", get(get_tasks))
        .route("/api/agents", get(get_agents))
        .route("/api/activities", get(get_activities))
        .route("/api/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl+C.
pub async fn start_server(storage: Storage, settings: Settings) -> crate::Result<()> {
    let addr: SocketAddr = settings.listen_addr().parse().map_err(|e| {
        Error::Configuration(format!("invalid listen address '{}': {}", settings.listen_addr(), e))
    })?;
    if settings.webhook_secret.is_none() {
        tracing::warn!("LINEAR_WEBHOOK_SECRET not set; webhook signatures will not be verified");
    }

    let app = build_router(AppState::new(storage, settings));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "evox listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn linear_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let mut storage = state.storage.lock().await;
    let outcome = webhook::process_webhook(&mut storage, &state.settings, &body, signature)?;
    Ok(Json(outcome.to_json()))
}

async fn linear_webhook_info() -> Json<Value> {
    Json(webhook::describe())
}

async fn trigger_sync(State(state): State<AppState>) -> ApiResult {
    // The tracker call happens without holding the storage lock.
    let ctx = {
        let storage = state.storage.lock().await;
        SyncContext::load(&storage, &state.settings)?
    };
    let page = sync::bulk::fetch_issues(&state.settings).await?;

    let mut storage = state.storage.lock().await;
    let mut summary = sync::run_bulk_sync(&mut storage, &ctx, page.issues)?;
    summary.truncated = page.has_next_page;
    Ok(Json(json!({
        "success": true,
        "total": summary.total,
        "created": summary.created,
        "updated": summary.updated,
        "truncated": summary.truncated,
        "message": summary.message(),
    })))
}

async fn assign_task(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let request: AssignRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("invalid request body: {}", e)))?;

    let assignment = {
        let mut storage = state.storage.lock().await;
        assign::create_and_assign(&mut storage, &request)?
    };
    let response = assignment.notify().await;
    Ok(Json(serde_json::to_value(response).map_err(Error::from)?))
}

#[derive(Debug, Default, Deserialize)]
struct SuggestQuery {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn suggest_agents(
    State(state): State<AppState>,
    query: Result<Query<SuggestQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let storage = state.storage.lock().await;
    let agents = storage.list_agents()?;
    let suggestions = assign::suggest(
        &agents,
        query.title.as_deref().unwrap_or_default(),
        query.description.as_deref().unwrap_or_default(),
    );
    Ok(Json(serde_json::to_value(suggestions).map_err(Error::from)?))
}

#[derive(Debug, Default, Deserialize)]
struct TaskQuery {
    #[serde(default)]
    status: Option<String>,
}

async fn get_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()
        .map_err(Error::Validation)?;

    let storage = state.storage.lock().await;
    let tasks = storage.list_tasks(status)?;
    Ok(Json(json!({ "tasks": tasks })))
}

async fn get_agents(State(state): State<AppState>) -> ApiResult {
    let storage = state.storage.lock().await;
    let agents = storage.list_agents()?;
    Ok(Json(json!({ "agents": agents })))
}

#[derive(Debug, Default, Deserialize)]
struct ActivityQuery {
    #[serde(default)]
    limit: Option<String>,
}

async fn get_activities(
    State(state): State<AppState>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let limit = query
        .limit
        .as_deref()
        .map(|l| {
            l.parse::<usize>()
                .map_err(|_| Error::Validation(format!("invalid limit: {}", l)))
        })
        .transpose()?;

    let storage = state.storage.lock().await;
    let activities = storage.list_activities(limit)?;
    Ok(Json(json!({ "activities": activities })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "commit": crate::GIT_COMMIT,
        "built_at": crate::BUILD_TIMESTAMP,
    }))
}

async fn not_found() -> ApiError {
    ApiError(Error::NotFound("No such route".to_string()))
}
