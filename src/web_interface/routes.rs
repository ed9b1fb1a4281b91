use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use rust_embed::RustEmbed;
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use super::types::{ApiError, ExecuteRequest, RetentionResponse};
use crate::connection_tracking::ConnectionRegistry;
use crate::error_handling::types::ScriptError;
use crate::retention::RetentionManager;
use crate::scripting::ScriptSandbox;

const MAX_SCRIPT_BYTES: u64 = 64 * 1024;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/web/"]
struct Assets;

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(body), status).into_response()
}

fn error_reply(message: impl Into<String>, status: StatusCode) -> Response {
    json_reply(&ApiError::new(message), status)
}

/// Parses the `half` query parameter. Absent or empty means `false`.
///
/// Accepts `1`, `t`, `T`, `true`, `TRUE`, `True` and their false counterparts.
pub fn parse_half_param(raw: Option<&str>) -> Result<bool, String> {
    match raw {
        None | Some("") => Ok(false),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True") => Ok(true),
        Some("0" | "f" | "F" | "false" | "FALSE" | "False") => Ok(false),
        Some(other) => Err(format!("invalid value for 'half': {:?}", other)),
    }
}

pub fn connections_reply(registry: &ConnectionRegistry, half: Option<&str>) -> Response {
    match parse_half_param(half) {
        Ok(include_half) => json_reply(&registry.get_connections(include_half), StatusCode::OK),
        Err(message) => {
            debug!("Rejected /connections query: {}", message);
            error_reply(message, StatusCode::BAD_REQUEST)
        }
    }
}

pub fn retention_reply(retention: &RetentionManager) -> Response {
    let storage_usage_bytes = match retention.storage_usage() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Unable to compute storage usage: {}", e);
            None
        }
    };
    json_reply(
        &RetentionResponse {
            holds: retention.retained_captures(),
            storage_usage_bytes,
            storage_limit_bytes: retention.storage_limit_bytes(),
            ttl_secs: retention.ttl().as_secs(),
        },
        StatusCode::OK,
    )
}

pub fn script_error_status(error: &ScriptError) -> StatusCode {
    match error {
        ScriptError::Runtime(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScriptError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        ScriptError::Busy => StatusCode::TOO_MANY_REQUESTS,
        ScriptError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
        ScriptError::WorkerFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn execute_reply(sandbox: Arc<ScriptSandbox>, request: ExecuteRequest) -> Response {
    match sandbox.execute(&request.script).await {
        Ok(outcome) => json_reply(&outcome, StatusCode::OK),
        Err(e) => error_reply(e.to_string(), script_error_status(&e)),
    }
}

fn asset_reply(path: &str) -> Response {
    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            reply::with_header(file.data.into_owned(), "content-type", mime.to_string())
                .into_response()
        }
        None => error_reply("Not found", StatusCode::NOT_FOUND),
    }
}

/// GET / -> dashboard
pub fn dashboard_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .map(|| asset_reply("index.html"))
}

/// GET /static/<file>
pub fn static_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("static")
        .and(warp::path::tail())
        .and(warp::get())
        .map(|tail: warp::path::Tail| asset_reply(tail.as_str()))
}

/// GET /connections?half=true|false
pub fn connections_route(
    registry: Arc<ConnectionRegistry>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("connections")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .map(move |query: HashMap<String, String>| {
            connections_reply(&registry, query.get("half").map(String::as_str))
        })
}

/// GET /connections/half
pub fn half_connections_route(
    registry: Arc<ConnectionRegistry>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("connections" / "half")
        .and(warp::get())
        .map(move || json_reply(&registry.half_connections(), StatusCode::OK))
}

/// GET /connections/stats
pub fn connection_stats_route(
    registry: Arc<ConnectionRegistry>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("connections" / "stats")
        .and(warp::get())
        .map(move || json_reply(&registry.stats(), StatusCode::OK))
}

/// GET /retention
pub fn retention_route(
    retention: Arc<RetentionManager>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("retention")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(move || {
            let retention = retention.clone();
            async move {
                let reply = tokio::task::spawn_blocking(move || retention_reply(&retention))
                    .await
                    .unwrap_or_else(|e| {
                        error_reply(
                            format!("Retention query failed: {}", e),
                            StatusCode::INTERNAL_SERVER_ERROR,
                        )
                    });
                Ok::<_, Rejection>(reply)
            }
        })
}

/// POST /scripts/execute
pub fn execute_script_route(
    sandbox: Arc<ScriptSandbox>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("scripts" / "execute")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_SCRIPT_BYTES))
        .and(warp::body::json::<ExecuteRequest>())
        .and_then(move |request: ExecuteRequest| {
            let sandbox = sandbox.clone();
            async move { Ok::<_, Rejection>(execute_reply(sandbox, request).await) }
        })
}
