//! HTTP surface for archiving and browsing threads.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/archive?sub=&id=` | Fetch a live thread and archive it in the background |
//! | `GET`  | `/r/{sub}/{thread_id}` | Render an archived thread (`?from=` selects a continuation page) |
//! | `GET`  | `/` | Latest archives |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Archiving acknowledges immediately: the caller gets a `202` once the
//! duplicate guard passes, and the actual ingestion runs in a background
//! task whose failures are visible only in the logs.
//!
//! Error responses carry a generic message; the underlying detail is
//! appended only when `server.debug` is set.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ArchiveError;
use crate::fetch::{ThreadFetcher, ThreadRequest};
use crate::ingest::Archiver;
use crate::reconstruct;
use crate::templates;

/// Entries shown on the index page.
const LATEST_LIMIT: i64 = 10;

/// Shared state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub archiver: Arc<Archiver>,
    pub fetcher: Arc<dyn ThreadFetcher>,
    pub read: SqlitePool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/archive", post(handle_archive))
        .route("/r/{sub}/{thread_id}", get(handle_view))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    tracing::info!("listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn status_for(err: &ArchiveError) -> StatusCode {
    match err {
        ArchiveError::Duplicate => StatusCode::CONFLICT,
        ArchiveError::Persistence(_) | ArchiveError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ArchiveError::UpstreamStatus(status) => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        ArchiveError::Fetch(_) | ArchiveError::Document(_) => StatusCode::BAD_GATEWAY,
    }
}

fn public_message(err: &ArchiveError) -> &'static str {
    match err {
        ArchiveError::Duplicate => "Thread is already archived.",
        ArchiveError::Persistence(_) => "Error accessing the archive.",
        ArchiveError::UpstreamStatus(_) => "Received unsuccessful response from the content API.",
        ArchiveError::Fetch(_) => "Could not reach the content API.",
        ArchiveError::Document(_) => "Could not parse the thread document.",
        ArchiveError::Task(_) => "Archive task failed.",
    }
}

impl AppState {
    fn app_error(&self, err: ArchiveError) -> AppError {
        let mut message = public_message(&err).to_string();
        if self.config.server.debug {
            message = format!("{}: {}", message, err);
        }
        AppError {
            status: status_for(&err),
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /archive ============

#[derive(Deserialize)]
struct ArchiveParams {
    sub: String,
    id: String,
}

#[derive(Serialize)]
struct AckResponse {
    message: String,
}

/// Fetch the live thread listing, run the duplicate guard, and hand the
/// document to the background archiver. The ticket is dropped: success or
/// failure of the actual write is not surfaced back to this caller.
async fn handle_archive(
    State(state): State<AppState>,
    Query(params): Query<ArchiveParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.sub.is_empty() || params.id.is_empty() {
        return Err(bad_request("sub and id must not be empty"));
    }

    let request = ThreadRequest::root(&params.sub, &params.id);
    let document = state
        .fetcher
        .fetch(&request)
        .await
        .map_err(|err| state.app_error(err))?;

    let ticket = state
        .archiver
        .submit(&params.sub, document)
        .await
        .map_err(|err| state.app_error(err))?;
    drop(ticket);

    Ok((
        StatusCode::ACCEPTED,
        Json(AckResponse {
            message: "Archive accepted.".to_string(),
        }),
    ))
}

// ============ GET /r/{sub}/{thread_id} ============

#[derive(Deserialize)]
struct ViewParams {
    /// Anchor comment id selecting a continuation page.
    #[serde(default)]
    from: String,
}

async fn handle_view(
    State(state): State<AppState>,
    Path((_sub, thread_id)): Path<(String, String)>,
    Query(params): Query<ViewParams>,
) -> Result<Response, AppError> {
    let archive = reconstruct::load_archive(&state.read, &thread_id, &params.from)
        .await
        .map_err(|err| state.app_error(err))?;

    Ok(match archive {
        Some(thread) => Html(templates::render_thread(&thread)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html(templates::render_not_found(&thread_id)),
        )
            .into_response(),
    })
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let links = reconstruct::latest_archives(&state.read, LATEST_LIMIT)
        .await
        .map_err(|err| state.app_error(err))?;

    Ok(Html(templates::render_index(&links)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::{db, migrate};

    struct StubFetcher {
        document: Vec<u8>,
    }

    #[async_trait]
    impl ThreadFetcher for StubFetcher {
        async fn fetch(&self, _request: &ThreadRequest) -> Result<Vec<u8>, ArchiveError> {
            Ok(self.document.clone())
        }
    }

    fn sample_document() -> Vec<u8> {
        serde_json::to_vec(&json!([
            { "data": { "children": [ { "data": {
                "id": "thr001",
                "title": "A thread",
                "selftext_html": "&lt;p&gt;hello&lt;/p&gt;",
                "author": "alice",
                "num_comments": 1,
                "created": 1_700_000_000
            } } ] } },
            { "data": { "children": [
                { "kind": "t1", "data": {
                    "id": "c1",
                    "body_html": "only comment",
                    "author": "bob",
                    "created": 1_700_000_100,
                    "score": 3,
                    "replies": ""
                } }
            ] } }
        ]))
        .unwrap()
    }

    async fn setup_test_app() -> (Router, AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let config: Config = toml::from_str(&format!(
            r#"
            [db]
            path = "{}/archive.sqlite"

            [server]
            bind = "127.0.0.1:0"
            "#,
            dir.path().display()
        ))
        .unwrap();

        let write = db::connect_write(&config).await.unwrap();
        migrate::init_schema(&write).await.unwrap();
        let read = db::connect_read(&config).await.unwrap();

        let fetcher: Arc<dyn ThreadFetcher> = Arc::new(StubFetcher {
            document: sample_document(),
        });
        let archiver = Arc::new(Archiver::new(
            write,
            read.clone(),
            Arc::clone(&fetcher),
            config.archive.max_depth,
        ));

        let state = AppState {
            config: Arc::new(config),
            archiver,
            fetcher,
            read,
        };

        (create_router(state.clone()), state, dir)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _state, _dir) = setup_test_app().await;

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_archive_acknowledges() {
        let (app, _state, _dir) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::post("/archive?sub=rust&id=thr001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_archive_duplicate_conflict() {
        let (app, state, _dir) = setup_test_app().await;

        // Archive once to completion so the guard sees committed rows.
        let ticket = state
            .archiver
            .submit("rust", sample_document())
            .await
            .unwrap();
        ticket.wait().await.unwrap();

        let response = app
            .oneshot(
                Request::post("/archive?sub=rust&id=thr001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_view_renders_archived_thread() {
        let (app, state, _dir) = setup_test_app().await;

        let ticket = state
            .archiver
            .submit("rust", sample_document())
            .await
            .unwrap();
        ticket.wait().await.unwrap();

        let response = app
            .oneshot(Request::get("/r/rust/thr001").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_view_unknown_thread_not_found() {
        let (app, _state, _dir) = setup_test_app().await;

        let response = app
            .oneshot(Request::get("/r/rust/zzz999").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_index_lists_latest() {
        let (app, state, _dir) = setup_test_app().await;

        let ticket = state
            .archiver
            .submit("rust", sample_document())
            .await
            .unwrap();
        ticket.wait().await.unwrap();

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
