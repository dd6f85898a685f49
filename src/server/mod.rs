//! HTTP daemon mode for `pysymindex`.
//!
//! Exposes the same four operations the CLI runs locally, over a
//! small JSON API so a long-lived daemon can keep one project's index
//! warm across many queries:
//!
//! - `POST /v1/query/class` – resolve a class and its dependencies.
//! - `POST /v1/query/function` – resolve a function/method and its
//!   dependencies.
//! - `POST /v1/symbols` – list known classes and functions.
//! - `POST /v1/rebuild` – force a full re-index.
//! - `GET /v1/health` – health check.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::models::{ClassQueryResult, FunctionQueryResult, ListSymbolsResult};
use crate::resolver::DependencyResolver;

type SharedResolver = Arc<Mutex<DependencyResolver>>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        if message.starts_with(crate::store::STORE_BUSY_PREFIX) {
            Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message,
            }
        } else {
            ApiError::internal(message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct QueryClassRequest {
    name: String,
    #[serde(default)]
    file_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryFunctionRequest {
    name: String,
    #[serde(default)]
    file_hint: Option<String>,
    #[serde(default)]
    host_class: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListSymbolsRequest {
    #[serde(default)]
    file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RebuildRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct RebuildResponse {
    status: &'static str,
}

pub fn router(resolver: SharedResolver) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/query/class", post(query_class))
        .route("/v1/query/function", post(query_function))
        .route("/v1/symbols", post(list_symbols))
        .route("/v1/rebuild", post(rebuild))
        .with_state(resolver)
}

/// Runs the HTTP server bound to the provided socket address. Used by
/// the CLI's `serve` subcommand.
pub async fn run(addr: SocketAddr, resolver: SharedResolver) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, resolver).await
}

/// Runs the server on an existing listener, primarily for tests that
/// bind to an ephemeral port.
pub async fn serve_with_listener(listener: TcpListener, resolver: SharedResolver) -> Result<()> {
    let app = router(resolver);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn query_class(
    State(resolver): State<SharedResolver>,
    Json(request): Json<QueryClassRequest>,
) -> Result<Json<ClassQueryResult>, ApiError> {
    let mut resolver = resolver.lock().map_err(|_| ApiError::internal("resolver lock poisoned"))?;
    let result = resolver
        .query_class(&request.name, request.file_hint.as_deref())
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("class not found: {}", request.name)))?;
    Ok(Json(result))
}

async fn query_function(
    State(resolver): State<SharedResolver>,
    Json(request): Json<QueryFunctionRequest>,
) -> Result<Json<FunctionQueryResult>, ApiError> {
    let mut resolver = resolver.lock().map_err(|_| ApiError::internal("resolver lock poisoned"))?;
    let result = resolver
        .query_function(
            &request.name,
            request.file_hint.as_deref(),
            request.host_class.as_deref(),
        )
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("function not found: {}", request.name)))?;
    Ok(Json(result))
}

async fn list_symbols(
    State(resolver): State<SharedResolver>,
    Json(request): Json<ListSymbolsRequest>,
) -> Result<Json<ListSymbolsResult>, ApiError> {
    let mut resolver = resolver.lock().map_err(|_| ApiError::internal("resolver lock poisoned"))?;
    let result = resolver
        .list_symbols(request.file.as_deref())
        .map_err(ApiError::from)?;
    Ok(Json(result))
}

async fn rebuild(
    State(resolver): State<SharedResolver>,
    Json(request): Json<RebuildRequest>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let mut resolver = resolver.lock().map_err(|_| ApiError::internal("resolver lock poisoned"))?;
    resolver.rebuild_index(request.force).map_err(ApiError::from)?;
    Ok(Json(RebuildResponse { status: "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::indexer::ProjectIndexer;
    use axum::response::IntoResponse;
    use std::fs;
    use tempfile::tempdir;

    fn shared_resolver(project: &std::path::Path) -> SharedResolver {
        let cache = AppConfig::with_cache_dir(Some(project.join("cache"))).unwrap();
        let indexer = ProjectIndexer::open(project, &cache.cache_dir).unwrap();
        Arc::new(Mutex::new(DependencyResolver::new(indexer)))
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok_status() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn query_class_endpoint_resolves_dependencies() {
        let project = tempdir().unwrap();
        fs::write(
            project.path().join("widget.py"),
            "class Widget:\n    def run(self):\n        return 1\n",
        )
        .unwrap();

        let resolver = shared_resolver(project.path());
        let Json(result) = query_class(
            State(resolver),
            Json(QueryClassRequest {
                name: "Widget".to_string(),
                file_hint: None,
            }),
        )
        .await
        .expect("class result");

        assert!(result.content.contains("class Widget"));
    }

    #[tokio::test]
    async fn query_class_missing_name_returns_404() {
        let project = tempdir().unwrap();
        fs::write(project.path().join("empty.py"), "").unwrap();

        let resolver = shared_resolver(project.path());
        let err = query_class(
            State(resolver),
            Json(QueryClassRequest {
                name: "Nope".to_string(),
                file_hint: None,
            }),
        )
        .await
        .expect_err("expected 404");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_symbols_endpoint_returns_classes_and_functions() {
        let project = tempdir().unwrap();
        fs::write(
            project.path().join("m.py"),
            "class C:\n    pass\n\n\ndef f():\n    pass\n",
        )
        .unwrap();

        let resolver = shared_resolver(project.path());
        let Json(result) = list_symbols(State(resolver), Json(ListSymbolsRequest::default()))
            .await
            .expect("symbols result");

        assert_eq!(result.classes.len(), 1);
        assert_eq!(result.functions.len(), 1);
    }
}
