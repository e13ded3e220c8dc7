use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use basket_core::models::{MealSlot, NewManualItem, WeekWindow, validate_manual_item};
use basket_core::present::SortMode;
use basket_core::service::BasketService;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<BasketService>>,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, BasketService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct ListQuery {
    sort: Option<String>,
}

#[derive(Deserialize)]
struct SyncQuery {
    #[serde(default)]
    dry_run: bool,
}

#[derive(Deserialize)]
struct AddItemRequest {
    text: String,
    quantity: Option<f64>,
    unit_code: Option<String>,
}

#[derive(Deserialize)]
struct UpdateItemRequest {
    checked: bool,
}

#[derive(Deserialize)]
struct PlanMealRequest {
    recipe: Option<String>,
    outside: Option<String>,
}

#[derive(Serialize)]
struct ShareResponse {
    week: WeekWindow,
    text: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn parse_week(raw: &str) -> Result<WeekWindow, ApiError> {
    WeekWindow::parse(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid week '{raw}'. Use YYYY-MM-DD")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{raw}'. Use YYYY-MM-DD")))
}

fn parse_meal(raw: &str) -> Result<MealSlot, ApiError> {
    MealSlot::parse(raw).map_err(|e| ApiError::BadRequest(format!("{e}")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_list(
    State(state): State<AppState>,
    Path(week): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let window = parse_week(&week)?;
    let sort = query
        .sort
        .as_deref()
        .map(SortMode::parse)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?
        .unwrap_or_default();

    let view = state.svc().list_view(&window, sort)?;
    let value = serde_json::to_value(view).context("failed to serialize list")?;
    Ok(Json(value))
}

/// A sync pass is blocking SQLite work, so it runs off the async workers.
async fn sync_list(
    State(state): State<AppState>,
    Path(week): Path<String>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let window = parse_week(&week)?;
    let value = tokio::task::spawn_blocking(move || -> anyhow::Result<serde_json::Value> {
        let svc = state.svc();
        let value = if query.dry_run {
            serde_json::to_value(svc.preview_sync(&window)?)
        } else {
            serde_json::to_value(svc.sync_week(&window)?)
        }
        .context("failed to serialize sync result")?;
        Ok(value)
    })
    .await
    .context("sync task failed")??;
    Ok(Json(value))
}

async fn add_item(
    State(state): State<AppState>,
    Path(week): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let window = parse_week(&week)?;
    let item = validate_manual_item(&NewManualItem {
        text: req.text,
        quantity: req.quantity,
        unit_code: req.unit_code,
    })
    .map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let item = state.svc().add_manual_item(&window, &item)?;
    let value = serde_json::to_value(item).context("failed to serialize item")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state.svc();
    if svc.find_item(id)?.is_none() {
        return Err(ApiError::NotFound(format!("Item {id} not found")));
    }
    let item = svc.set_item_checked(id, req.checked)?;
    let value = serde_json::to_value(item).context("failed to serialize item")?;
    Ok(Json(value))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state.svc();
    if svc.find_item(id)?.is_none() {
        return Err(ApiError::NotFound(format!("Item {id} not found")));
    }
    svc.remove_item(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_checked(
    State(state): State<AppState>,
    Path(week): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let window = parse_week(&week)?;
    let removed = state.svc().clear_checked(&window)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn share_list(
    State(state): State<AppState>,
    Path(week): Path<String>,
) -> Result<Json<ShareResponse>, ApiError> {
    let window = parse_week(&week)?;
    let text = state.svc().share_text(&window)?;
    Ok(Json(ShareResponse { week: window, text }))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(week): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let window = parse_week(&week)?;
    let meals = state.svc().week_plan(&window)?;
    Ok(Json(serde_json::json!({ "week": window, "meals": meals })))
}

async fn plan_meal(
    State(state): State<AppState>,
    Path((date, meal)): Path<(String, String)>,
    Json(req): Json<PlanMealRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date(&date)?;
    let meal = parse_meal(&meal)?;
    let svc = state.svc();

    let planned = match (req.recipe.as_deref(), req.outside.as_deref()) {
        (Some(title), None) => {
            if svc.find_recipe(title)?.is_none() {
                return Err(ApiError::NotFound(format!("Recipe '{title}' not found")));
            }
            svc.plan_home_meal(date, meal, Some(title))?
        }
        (None, Some(name)) => svc.plan_outside_meal(date, meal, Some(name))?,
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of recipe or outside".to_string(),
            ));
        }
    };
    let value = serde_json::to_value(planned).context("failed to serialize planned meal")?;
    Ok(Json(value))
}

async fn clear_meal(
    State(state): State<AppState>,
    Path((date, meal)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date(&date)?;
    let meal = parse_meal(&meal)?;
    if state.svc().clear_meal(date, meal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No {meal} planned on {date}")))
    }
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/lists/{week}", get(get_list))
        .route("/api/lists/{week}/sync", post(sync_list))
        .route("/api/lists/{week}/items", post(add_item))
        .route("/api/lists/{week}/clear-checked", post(clear_checked))
        .route("/api/lists/{week}/share", get(share_list))
        .route("/api/items/{id}", patch(update_item).delete(delete_item))
        .route("/api/plans/{week}", get(get_plan))
        .route("/api/plans/{date}/{meal}", put(plan_meal).delete(clear_meal))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/api/health", get(health))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of a key, or a mask when the key is too
/// short to abbreviate safely.
fn key_hint(key: &str) -> String {
    match (key.get(..4), key.get(key.len().saturating_sub(4)..)) {
        (Some(head), Some(tail)) if key.len() > 8 => format!("{head}...{tail}"),
        _ => "****".to_string(),
    }
}

pub async fn start_server(
    svc: BasketService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            key_hint(key)
        );
    } else {
        warn!("authentication disabled (--no-auth), API is open to anyone");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(%bind, "listening with no authentication; any device on the network can access this API");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
