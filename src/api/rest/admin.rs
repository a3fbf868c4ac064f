use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, put};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::driver::StatusFilter;
use crate::api::rest::extract::{AppPath, AppQuery};
use crate::api::rest::retry::with_storage_retry;
use crate::engine::fleet::{DailyCount, DailyRevenue, DriverPerformance, FleetSnapshot};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::booking::{Booking, BookingStatus, VehicleClass};
use crate::state::AppState;

const DEFAULT_WINDOW_DAYS: u32 = 7;
const MAX_WINDOW_DAYS: u32 = 3_650;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/bookings", get(list_all_bookings))
        .route("/admin/bookings/:id/complete", put(complete_booking))
        .route("/admin/drivers/active-bookings", get(active_bookings_per_driver))
        .route("/admin/analytics", get(analytics_snapshot))
        .route("/admin/analytics/bookings-over-time", get(bookings_over_time))
        .route("/admin/analytics/revenue-over-time", get(revenue_over_time))
        .route("/admin/analytics/status-distribution", get(status_distribution))
        .route("/admin/analytics/vehicle-classes", get(vehicle_class_distribution))
        .route("/admin/analytics/driver-performance", get(driver_performance))
}

#[derive(Deserialize)]
pub struct WindowQuery {
    pub window_days: Option<u32>,
}

impl WindowQuery {
    fn days(&self) -> Result<u32, AppError> {
        let days = self.window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
        if days > MAX_WINDOW_DAYS {
            return Err(AppError::Validation(format!(
                "window_days must be at most {MAX_WINDOW_DAYS}"
            )));
        }
        Ok(days)
    }
}

#[derive(Serialize)]
pub struct DriverActiveBookings {
    pub driver_id: Uuid,
    pub active_count: usize,
    pub booking_ids: Vec<Uuid>,
}

async fn list_all_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppQuery(filter): AppQuery<StatusFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    actor.require(Role::Admin)?;
    let status = filter.parse()?;

    let store = &state.store;
    let bookings = with_storage_retry(state.retry, "list_all_bookings", move || async move {
        match status {
            Some(status) => store.list_by_status(status).await,
            None => store.list_all().await,
        }
    })
    .await?;

    Ok(Json(bookings))
}

async fn complete_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    actor.require(Role::Admin)?;

    let booking = with_storage_retry(state.retry, "complete_booking", || {
        state.dispatch.complete(id, &actor)
    })
    .await?;

    Ok(Json(booking))
}

async fn active_bookings_per_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DriverActiveBookings>>, AppError> {
    actor.require(Role::Admin)?;

    let active = with_storage_retry(state.retry, "active_bookings_per_driver", || {
        state.fleet.active_bookings_by_driver()
    })
    .await?;

    Ok(Json(
        active
            .into_iter()
            .map(|(driver_id, booking_ids)| DriverActiveBookings {
                driver_id,
                active_count: booking_ids.len(),
                booking_ids,
            })
            .collect(),
    ))
}

async fn analytics_snapshot(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppQuery(query): AppQuery<WindowQuery>,
) -> Result<Json<FleetSnapshot>, AppError> {
    actor.require(Role::Admin)?;
    let days = query.days()?;

    let snapshot =
        with_storage_retry(state.retry, "analytics_snapshot", || state.fleet.snapshot(days))
            .await?;

    Ok(Json(snapshot))
}

async fn bookings_over_time(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppQuery(query): AppQuery<WindowQuery>,
) -> Result<Json<Vec<DailyCount>>, AppError> {
    actor.require(Role::Admin)?;
    let days = query.days()?;

    let series = with_storage_retry(state.retry, "bookings_over_time", || {
        state.fleet.bookings_over_time(days)
    })
    .await?;

    Ok(Json(series))
}

async fn revenue_over_time(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppQuery(query): AppQuery<WindowQuery>,
) -> Result<Json<Vec<DailyRevenue>>, AppError> {
    actor.require(Role::Admin)?;
    let days = query.days()?;

    let series = with_storage_retry(state.retry, "revenue_over_time", || {
        state.fleet.revenue_over_time(days)
    })
    .await?;

    Ok(Json(series))
}

async fn status_distribution(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<BTreeMap<BookingStatus, usize>>, AppError> {
    actor.require(Role::Admin)?;

    let distribution = with_storage_retry(state.retry, "status_distribution", || {
        state.fleet.status_distribution()
    })
    .await?;

    Ok(Json(distribution))
}

async fn vehicle_class_distribution(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<BTreeMap<VehicleClass, usize>>, AppError> {
    actor.require(Role::Admin)?;

    let distribution = with_storage_retry(state.retry, "vehicle_class_distribution", || {
        state.fleet.vehicle_class_distribution()
    })
    .await?;

    Ok(Json(distribution))
}

async fn driver_performance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DriverPerformance>>, AppError> {
    actor.require(Role::Admin)?;

    let performance = with_storage_retry(state.retry, "driver_performance", || {
        state.fleet.driver_performance()
    })
    .await?;

    Ok(Json(performance))
}
