pub mod admin;
pub mod auth;
pub mod bookings;
pub mod driver;
pub mod extract;
pub mod retry;
pub mod ws;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::models::booking::BookingStatus;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(bookings::router())
        .merge(driver::router())
        .merge(admin::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Browser clients are served from a single known origin.
pub fn cors_layer(allow_origin: &str) -> Result<CorsLayer, AppError> {
    let origin = HeaderValue::from_str(allow_origin)
        .map_err(|err| AppError::Internal(format!("invalid CORS_ALLOW_ORIGIN: {err}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(auth::ACTOR_ID_HEADER),
            HeaderName::from_static(auth::ACTOR_ROLE_HEADER),
        ]))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    bookings: usize,
    by_status: BTreeMap<BookingStatus, usize>,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let by_status = state.fleet.status_distribution().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        bookings: by_status.values().sum(),
        by_status,
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
