//! HTTP server for the B+ tree.
//!
//! Provides REST API endpoints for:
//! - Creating and closing a tree with a chosen order
//! - Inserts, point lookups and range lookups
//! - Running whole command scripts
//! - Tree visualization export

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::process::exit;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use treesearch::{run_script, Index, ScriptSummary, TreeConfig, TreeError, TreeNode, TreeStats};

const DEFAULT_ADDR: &str = "0.0.0.0:3001";

/// Request to create a tree
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTreeRequest {
    order: Option<usize>,
}

/// Request to insert one value
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutRequest {
    key: f64,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkInsertRequest {
    pairs: Vec<PutRequest>,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    from: f64,
    to: f64,
}

/// Response for point lookups
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    key: f64,
    values: Option<Vec<String>>,
    found: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RangeItem {
    key: f64,
    values: Vec<String>,
}

/// Response for operations that return success/failure
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    success: bool,
    message: String,
}

/// Tree visualization response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeResponse {
    tree: Option<TreeNode>,
    stats: TreeStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptResponse {
    output: Vec<String>,
    summary: ScriptSummary,
}

/// Shared server state
struct AppState {
    index: RwLock<Option<Index>>,
    /// Config used by the next create
    config: RwLock<TreeConfig>,
}

impl AppState {
    fn new() -> Self {
        Self {
            index: RwLock::new(None),
            config: RwLock::new(TreeConfig::default()),
        }
    }
}

type SharedState = Arc<AppState>;
type ApiError = (StatusCode, Json<OperationResponse>);
type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn failure(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(OperationResponse {
            success: false,
            message: message.into(),
        }),
    )
}

fn no_tree() -> ApiError {
    failure(StatusCode::BAD_REQUEST, "No tree open")
}

fn tree_error(e: TreeError) -> ApiError {
    let status = match e {
        TreeError::InvalidKey(_)
        | TreeError::InvalidOrder { .. }
        | TreeError::InvalidCommand { .. }
        | TreeError::MissingOrder
        | TreeError::Json(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, e.to_string())
}

fn ok(message: impl Into<String>) -> Json<OperationResponse> {
    Json(OperationResponse {
        success: true,
        message: message.into(),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treesearch=info,treesearch_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/tree", post(create_tree).get(get_tree).delete(close_tree))
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/stats", get(get_stats))
        .route("/api/kv", post(put_value))
        .route("/api/kv/:key", get(get_value))
        .route("/api/range", get(get_range))
        .route("/api/bulk", post(bulk_insert))
        .route("/api/script", post(run_script_body))
        .layer(cors)
        .with_state(state);

    let addr = std::env::var("TREESEARCH_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            exit(1);
        }
    };

    info!(%addr, "B+ tree server listening");
    info!("  POST   /api/tree      - Create tree (optional order)");
    info!("  GET    /api/tree      - Tree structure and stats");
    info!("  DELETE /api/tree      - Close tree");
    info!("  GET    /api/config    - Get order used for new trees");
    info!("  POST   /api/config    - Set order used for new trees");
    info!("  GET    /api/stats     - Tree statistics");
    info!("  POST   /api/kv        - Insert a key/value pair");
    info!("  GET    /api/kv/:key   - All values for a key");
    info!("  GET    /api/range     - Entries with from <= key <= to");
    info!("  POST   /api/bulk      - Insert many pairs");
    info!("  POST   /api/script    - Run a command script as a new tree");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server stopped");
        exit(1);
    }
}

async fn create_tree(
    State(state): State<SharedState>,
    body: Option<Json<CreateTreeRequest>>,
) -> ApiResult<OperationResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let config = match req.order {
        Some(order) => TreeConfig::new(order).map_err(tree_error)?,
        None => *state.config.read(),
    };

    let index = Index::new(config).map_err(tree_error)?;
    *state.index.write() = Some(index);
    info!(order = config.order, "tree created");
    Ok(ok(format!("Tree created with order {}", config.order)))
}

async fn close_tree(State(state): State<SharedState>) -> Json<OperationResponse> {
    match state.index.write().take() {
        Some(_) => ok("Tree closed"),
        None => Json(OperationResponse {
            success: false,
            message: "No tree open".to_string(),
        }),
    }
}

async fn get_config(State(state): State<SharedState>) -> Json<TreeConfig> {
    Json(*state.config.read())
}

async fn set_config(
    State(state): State<SharedState>,
    Json(config): Json<TreeConfig>,
) -> ApiResult<OperationResponse> {
    config.validate().map_err(tree_error)?;
    *state.config.write() = config;
    Ok(ok(format!("Config updated: order={}", config.order)))
}

async fn get_stats(State(state): State<SharedState>) -> ApiResult<TreeStats> {
    let index = state.index.read();
    let index = index.as_ref().ok_or_else(no_tree)?;
    Ok(Json(index.stats()))
}

async fn get_tree(State(state): State<SharedState>) -> ApiResult<TreeResponse> {
    let index = state.index.read();
    let index = index.as_ref().ok_or_else(no_tree)?;
    Ok(Json(TreeResponse {
        tree: index.export_tree(),
        stats: index.stats(),
    }))
}

async fn put_value(
    State(state): State<SharedState>,
    Json(req): Json<PutRequest>,
) -> ApiResult<OperationResponse> {
    let index = state.index.read();
    let index = index.as_ref().ok_or_else(no_tree)?;
    index.insert(req.key, req.value).map_err(tree_error)?;
    Ok(ok(format!("Inserted key {}", req.key)))
}

async fn get_value(
    State(state): State<SharedState>,
    Path(key): Path<f64>,
) -> ApiResult<LookupResponse> {
    let index = state.index.read();
    let index = index.as_ref().ok_or_else(no_tree)?;
    let values = index.lookup(key).map_err(tree_error)?;
    Ok(Json(LookupResponse {
        key,
        found: values.is_some(),
        values,
    }))
}

async fn get_range(
    State(state): State<SharedState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Vec<RangeItem>> {
    let index = state.index.read();
    let index = index.as_ref().ok_or_else(no_tree)?;
    let items = index
        .range_lookup(range.from, range.to)
        .map_err(tree_error)?
        .into_iter()
        .map(|(key, values)| RangeItem { key, values })
        .collect();
    Ok(Json(items))
}

async fn bulk_insert(
    State(state): State<SharedState>,
    Json(req): Json<BulkInsertRequest>,
) -> ApiResult<OperationResponse> {
    let index = state.index.read();
    let index = index.as_ref().ok_or_else(no_tree)?;
    let mut count = 0;
    for pair in req.pairs {
        if let Err(e) = index.insert(pair.key, pair.value) {
            return Err(failure(
                StatusCode::BAD_REQUEST,
                format!("Bulk insert failed at key {}: {}", pair.key, e),
            ));
        }
        count += 1;
    }
    Ok(ok(format!("Inserted {} key-value pairs", count)))
}

async fn run_script_body(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<ScriptResponse> {
    let mut out = Vec::new();
    let (tree, summary) = run_script(Cursor::new(body), &mut out).map_err(tree_error)?;
    let index = Index::from_tree(tree).map_err(tree_error)?;
    *state.index.write() = Some(index);

    let output = String::from_utf8_lossy(&out)
        .lines()
        .map(str::to_string)
        .collect();
    Ok(Json(ScriptResponse { output, summary }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_error_status() {
        let cases = [
            (TreeError::InvalidKey(f64::NAN), StatusCode::BAD_REQUEST),
            (TreeError::InvalidOrder { order: 2, min: 3 }, StatusCode::BAD_REQUEST),
            (TreeError::invalid_command(4, "bad"), StatusCode::BAD_REQUEST),
            (TreeError::MissingOrder, StatusCode::BAD_REQUEST),
            (TreeError::Uninitialized, StatusCode::INTERNAL_SERVER_ERROR),
            (TreeError::corruption("broken link"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let (status, Json(body)) = tree_error(err);
            assert_eq!(status, expected, "{message}");
            assert!(!body.success);
            assert_eq!(body.message, message);
        }
    }

    #[tokio::test]
    async fn test_script_body_replaces_index() {
        let state = Arc::new(AppState::new());
        let script = Bytes::from_static(b"3\nInsert(1,a)\nInsert(2,b)\nInsert(2,c)\nSearch(2)\nSearch(0,5)\nSearch(9)\n");

        let Json(response) = run_script_body(State(state.clone()), script).await.unwrap();
        assert_eq!(response.output, vec!["b, c", "(1.0,a), (2.0,b), (2.0,c)", "Null"]);
        assert_eq!(response.summary.inserts, 3);
        assert_eq!(response.summary.searches, 2);
        assert_eq!(response.summary.range_searches, 1);

        let index = state.index.read();
        let index = index.as_ref().unwrap();
        assert_eq!(index.config().order, 3);
        assert_eq!(index.lookup(1.0).unwrap(), Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn test_script_body_rejects_malformed_line() {
        let state = Arc::new(AppState::new());
        let script = Bytes::from_static(b"3\nInsert(1,a)\nRemove(1)\n");

        let (status, Json(body)) = run_script_body(State(state.clone()), script)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.starts_with("Line 3:"), "{}", body.message);
        assert!(state.index.read().is_none());
    }
}
