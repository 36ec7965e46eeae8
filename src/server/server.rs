use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::catalog::{CatalogError, CatalogService, CatalogStats, LocalCatalog, Payload};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{log_requests, metrics, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub version: String,
    pub catalog: CatalogStats,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug, Default)]
struct TimeParams {
    time: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct WriteParams {
    #[serde(rename = "type")]
    doc_type: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct DeleteParams {
    cascade: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct SearchParams {
    query: Option<String>,
    time: Option<String>,
}

/// Sub-resources addressable below a catalog path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Metadata,
    Children,
    History,
}

/// Splits the wildcard tail of `/catalog/{*rest}` into the catalog path and
/// the trailing resource name. The root is addressed with an empty path, as in
/// `/catalog/metadata`.
fn split_resource(rest: &str) -> Option<(&str, Resource)> {
    let rest = rest.trim_end_matches('/');
    let (path, name) = match rest.rsplit_once('/') {
        Some((path, name)) => (path, name),
        None => ("", rest),
    };
    let resource = match name {
        "metadata" => Resource::Metadata,
        "children" => Resource::Children,
        "history" => Resource::History,
        _ => return None,
    };
    Some((path, resource))
}

/// Parses an RFC 3339 timestamp. Timestamps without an offset are read as UTC.
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("Invalid time {:?}, expected an RFC 3339 timestamp", raw))
}

fn parse_optional_time(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, Response> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => parse_time(raw)
            .map(Some)
            .map_err(|e| (StatusCode::BAD_REQUEST, e).into_response()),
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Conflict { .. } => StatusCode::CONFLICT,
            CatalogError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            CatalogError::Storage(e) => {
                error!("Storage failure: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

fn error_response(err: CatalogError, route: &str) -> Response {
    metrics::record_error(err.kind(), route);
    err.into_response()
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog: state.catalog.stats(),
    };
    Json(stats)
}

async fn search(
    State(catalog): State<GuardedCatalog>,
    Query(params): Query<SearchParams>,
) -> Response {
    let at = match parse_optional_time(params.time.as_deref()) {
        Ok(at) => at,
        Err(response) => return response,
    };
    let query = params.query.unwrap_or_default();
    match catalog.search(&query, at) {
        Ok(hits) => Json(hits).into_response(),
        Err(err) => error_response(err, "/catalog"),
    }
}

async fn get_entry(
    State(catalog): State<GuardedCatalog>,
    Path(rest): Path<String>,
    Query(params): Query<TimeParams>,
) -> Response {
    let Some((path, resource)) = split_resource(&rest) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let route = format!("/catalog/{}", rest);
    let at = match parse_optional_time(params.time.as_deref()) {
        Ok(at) => at,
        Err(response) => return response,
    };

    match resource {
        Resource::Metadata => match catalog.read(path, at) {
            Ok(Some(document)) => Json(document).into_response(),
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(err) => error_response(err, &route),
        },
        Resource::Children => match catalog.ls(path, at) {
            Ok(Some(children)) => Json(children).into_response(),
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(err) => error_response(err, &route),
        },
        Resource::History => match catalog.history(path) {
            Ok(history) if history.is_empty() => StatusCode::NOT_FOUND.into_response(),
            Ok(history) => Json(history).into_response(),
            Err(err) => error_response(err, &route),
        },
    }
}

fn write_entry(
    catalog: &LocalCatalog,
    rest: &str,
    params: WriteParams,
    body: &[u8],
    patch: bool,
) -> Response {
    let Some((path, Resource::Metadata)) = split_resource(rest) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let metadata: Payload = if body.is_empty() {
        Payload::new()
    } else {
        match serde_json::from_slice(body) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Rejected metadata body for {}: {}", path, e);
                return (
                    StatusCode::BAD_REQUEST,
                    format!("Metadata must be a JSON object: {}", e),
                )
                    .into_response();
            }
        }
    };
    let doc_type = params.doc_type.unwrap_or_default();
    match catalog.write(path, &doc_type, metadata, patch) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err, &format!("/catalog/{}", rest)),
    }
}

async fn patch_entry(
    State(catalog): State<GuardedCatalog>,
    Path(rest): Path<String>,
    Query(params): Query<WriteParams>,
    body: Bytes,
) -> Response {
    write_entry(&catalog, &rest, params, &body, true)
}

async fn put_entry(
    State(catalog): State<GuardedCatalog>,
    Path(rest): Path<String>,
    Query(params): Query<WriteParams>,
    body: Bytes,
) -> Response {
    write_entry(&catalog, &rest, params, &body, false)
}

async fn delete_entry(
    State(catalog): State<GuardedCatalog>,
    Path(rest): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Response {
    match catalog.rm(&rest, params.cascade.unwrap_or(true)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err, &format!("/catalog/{}", rest)),
    }
}

async fn delete_root(
    State(catalog): State<GuardedCatalog>,
    Query(params): Query<DeleteParams>,
) -> Response {
    match catalog.rm("/", params.cascade.unwrap_or(true)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err, "/catalog"),
    }
}

pub fn make_app(config: ServerConfig, catalog: GuardedCatalog) -> Router {
    let state = ServerState::new(config, catalog);

    let catalog_routes: Router = Router::new()
        .route("/catalog", get(search).delete(delete_root))
        .route(
            "/catalog/{*rest}",
            get(get_entry)
                .patch(patch_entry)
                .put(put_entry)
                .delete(delete_entry),
        )
        .with_state(state.clone());

    let home_router: Router = Router::new().route("/", get(home)).with_state(state.clone());

    home_router
        .merge(catalog_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

/// Serves the catalog on `config.port` until the listener fails, plus the
/// Prometheus endpoint when `config.metrics_port` is set.
pub async fn run_server(config: ServerConfig, catalog: Arc<LocalCatalog>) -> Result<()> {
    metrics::init_metrics();
    metrics::set_store_stats(&catalog.stats().store);

    if let Some(metrics_port) = config.metrics_port {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
            .await
            .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
        info!("Metrics available on port {}", metrics_port);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, make_metrics_app()).await {
                error!("Metrics server stopped: {}", e);
            }
        });
    }

    let port = config.port;
    let app = make_app(config, catalog);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Catalog server listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
