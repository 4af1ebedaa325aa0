use axum::{
    Router,
    routing::{get, post, delete},
    extract::{Path, State, Json},
    http::{header, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::alerts::{Alert, NewAlert};
use crate::api::{status_for, ApiState};
use crate::api::websocket::websocket_handler;
use crate::dashboard::DashboardView;
use crate::error::Error;
use crate::observability::metrics;
use crate::settings::{Settings, SettingsPatch};
use crate::types::ids::AlertId;
use crate::types::market::MarketSnapshot;
use crate::types::signal::Signal;
use crate::types::technical::TechnicalSnapshot;
use crate::types::whale::WhaleTransaction;
use crate::utils::helper::truncate_for_log;

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/market", get(get_market))
        .route("/technical", get(get_technical))
        .route("/whales", get(get_whales))
        .route("/signals", get(get_signals).delete(clear_signals))
        .route("/alerts", get(list_alerts).post(create_alert))
        .route("/alerts/:id/toggle", post(toggle_alert))
        .route("/alerts/:id", delete(delete_alert))
        .route("/settings", get(get_settings).patch(update_settings))
        .route("/settings/reset", post(reset_settings))
        .route("/settings/export", get(export_settings))
        .route("/settings/import", post(import_settings))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    symbol: String,
}

async fn health_check(State(state): State<Arc<ApiState>>) -> Json<Health> {
    Json(Health {
        status: "OK",
        symbol: state.dashboard.symbol().await,
    })
}

async fn get_dashboard(State(state): State<Arc<ApiState>>) -> Json<DashboardView> {
    Json(state.dashboard.view().await)
}

async fn get_market(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<MarketSnapshot>, StatusCode> {
    state.dashboard.market().await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_technical(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<TechnicalSnapshot>, StatusCode> {
    state.dashboard.technical().await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_whales(State(state): State<Arc<ApiState>>) -> Json<Vec<WhaleTransaction>> {
    Json(state.dashboard.whales().await)
}

async fn get_signals(State(state): State<Arc<ApiState>>) -> Json<Vec<Signal>> {
    Json(state.dashboard.signals().await)
}

async fn clear_signals(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.dashboard.clear_signals().await;
    StatusCode::NO_CONTENT
}

async fn list_alerts(State(state): State<Arc<ApiState>>) -> Json<Vec<Alert>> {
    Json(state.dashboard.list_alerts().await)
}

async fn create_alert(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<NewAlert>,
) -> Result<(StatusCode, Json<Alert>), StatusCode> {
    state.dashboard.create_alert(req).await
        .map(|alert| (StatusCode::CREATED, Json(alert)))
        .map_err(|e| {
            tracing::debug!(error = %e, "Alert rejected");
            status_for(&e)
        })
}

fn parse_alert_id(raw: &str) -> Result<AlertId, StatusCode> {
    AlertId::parse(raw).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn toggle_alert(
    State(state): State<Arc<ApiState>>,
    Path(alert_id): Path<String>,
) -> Result<Json<Alert>, StatusCode> {
    let alert_id = parse_alert_id(&alert_id)?;

    state.dashboard.toggle_alert(alert_id).await
        .map(Json)
        .map_err(|e| status_for(&e))
}

async fn delete_alert(
    State(state): State<Arc<ApiState>>,
    Path(alert_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let alert_id = parse_alert_id(&alert_id)?;

    state.dashboard.delete_alert(alert_id).await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| status_for(&e))
}

async fn get_settings(State(state): State<Arc<ApiState>>) -> Json<Settings> {
    Json(state.dashboard.settings().get())
}

async fn update_settings(
    State(state): State<Arc<ApiState>>,
    Json(patch): Json<SettingsPatch>,
) -> Json<Settings> {
    Json(state.dashboard.settings().set(patch))
}

async fn reset_settings(State(state): State<Arc<ApiState>>) -> Json<Settings> {
    Json(state.dashboard.settings().reset())
}

async fn export_settings(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.dashboard.settings().export_to_string(),
    )
}

/// Raw body so malformed documents reach the store and get logged
async fn import_settings(
    State(state): State<Arc<ApiState>>,
    body: String,
) -> Result<Json<Settings>, StatusCode> {
    state.dashboard.settings().try_import(&body)
        .map(Json)
        .map_err(|e: Error| {
            tracing::warn!(error = %e, body = %truncate_for_log(&body, 120), "Settings import rejected");
            status_for(&e)
        })
}

async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
