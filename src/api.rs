use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::event::Impact;
use crate::notify::NotificationStore;
use crate::query::{EventsRequest, QueryError, QueryService};
use crate::refresh::RefreshCoordinator;
use crate::store::EventStore;
use crate::watchlist::WatchlistStore;

const SESSION_HEADER: &str = "x-session-id";
const DEFAULT_SESSION: &str = "default";

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub store: Arc<dyn EventStore>,
    pub notifications: Arc<NotificationStore>,
    pub watchlist: Arc<WatchlistStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/events", get(get_events))
        .route("/api/cache/status", get(cache_status))
        .route("/api/admin/cache/refresh", post(admin_refresh))
        .route("/api/admin/cache", delete(admin_clear))
        .route(
            "/api/watchlist/countries",
            get(watchlist_countries).post(watchlist_add_country),
        )
        .route(
            "/api/watchlist/countries/{code}",
            delete(watchlist_remove_country),
        )
        .route(
            "/api/watchlist/events",
            get(watchlist_events).post(watchlist_add_event),
        )
        .route(
            "/api/watchlist/events/{event_id}",
            delete(watchlist_remove_event),
        )
        .route(
            "/api/notifications",
            get(notifications_pending).post(notifications_add),
        )
        .route("/api/notifications/{id}", delete(notifications_remove))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// API-level error envelope. The one distinguished case is a failed
/// cold-start fill: the caller has no data to fall back to, so it gets a
/// retryable 503 instead of a misleading empty list.
pub enum ApiError {
    CacheWarmingUp(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::CacheWarmingUp(details) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "cache warming up, retry shortly",
                details,
            ),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                details,
            ),
        };
        (status, Json(json!({ "error": error, "details": details }))).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Bootstrap(inner) => ApiError::CacheWarmingUp(inner.to_string()),
            QueryError::Store(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsParams {
    date_range: Option<String>,
    timezone: Option<String>,
    countries: Option<String>,
    impacts: Option<String>,
    categories: Option<String>,
    search: Option<String>,
}

impl EventsParams {
    fn into_request(self) -> EventsRequest {
        EventsRequest {
            period: crate::date_range::Period::parse(self.date_range.as_deref().unwrap_or("today")),
            timezone: self.timezone,
            countries: csv(self.countries.as_deref()),
            impacts: csv(self.impacts.as_deref())
                .iter()
                .filter_map(|s| Impact::parse(s))
                .collect(),
            categories: csv(self.categories.as_deref()),
            search: self.search,
        }
    }
}

fn csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

async fn get_events(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let request = params.into_request();
    let events = state.query.get_events(&request).await?;
    Ok(Json(events))
}

async fn cache_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.status())
}

/// Kick off a full sweep in the background; the caller polls
/// /api/cache/status to watch it finish.
async fn admin_refresh(State(state): State<AppState>) -> impl IntoResponse {
    let coordinator = state.coordinator.clone();
    tokio::spawn(async move {
        match coordinator.sweep().await {
            Ok(written) => info!(target: "api", events = written, "manual sweep complete"),
            Err(e) => error!(target: "api", error = %e, "manual sweep failed"),
        }
    });
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "sweep scheduled" })),
    )
}

async fn admin_clear(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .clear()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(target: "api", "event cache cleared");
    Ok(Json(json!({ "status": "cleared" })))
}

// --- watchlist ---

async fn watchlist_countries(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    Json(state.watchlist.countries(&session_id(&headers)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCountryBody {
    country_code: String,
}

async fn watchlist_add_country(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddCountryBody>,
) -> impl IntoResponse {
    Json(
        state
            .watchlist
            .add_country(&session_id(&headers), &body.country_code),
    )
}

async fn watchlist_remove_country(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> impl IntoResponse {
    let removed = state
        .watchlist
        .remove_country(&session_id(&headers), &code);
    Json(json!({ "removed": removed }))
}

async fn watchlist_events(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    Json(state.watchlist.events(&session_id(&headers)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddEventBody {
    event_id: String,
}

async fn watchlist_add_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddEventBody>,
) -> impl IntoResponse {
    Json(
        state
            .watchlist
            .add_event(&session_id(&headers), &body.event_id),
    )
}

async fn watchlist_remove_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    let removed = state
        .watchlist
        .remove_event(&session_id(&headers), &event_id);
    Json(json!({ "removed": removed }))
}

// --- notifications ---

async fn notifications_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    Json(state.notifications.pending(&session_id(&headers)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddNotificationBody {
    event_id: String,
    event_timestamp: DateTime<Utc>,
    minutes_before: i64,
}

async fn notifications_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddNotificationBody>,
) -> impl IntoResponse {
    Json(state.notifications.add(
        &session_id(&headers),
        &body.event_id,
        body.event_timestamp,
        body.minutes_before,
    ))
}

async fn notifications_remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let removed = state.notifications.remove(&session_id(&headers), id);
    Json(json!({ "removed": removed }))
}
