use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::{AppJson, AppPath};
use crate::api::rest::retry::with_storage_retry;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::booking::{Booking, VehicleClass};
use crate::models::location::Location;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_my_bookings))
        .route("/bookings/:id", get(get_booking))
}

/// Every field is optional on the wire so a missing one surfaces as a
/// validation error instead of a deserialisation failure.
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub pickup: Option<LocationInput>,
    pub dropoff: Option<LocationInput>,
    pub vehicle_class: Option<String>,
}

#[derive(Deserialize)]
pub struct LocationInput {
    pub label: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl LocationInput {
    fn into_location(self, field: &str) -> Result<Location, AppError> {
        let label = self
            .label
            .ok_or_else(|| AppError::Validation(format!("{field}.label is required")))?;
        let lat = self
            .lat
            .ok_or_else(|| AppError::Validation(format!("{field}.lat is required")))?;
        let lng = self
            .lng
            .ok_or_else(|| AppError::Validation(format!("{field}.lng is required")))?;
        Ok(Location::new(label, lat, lng))
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppJson(payload): AppJson<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    actor.require(Role::User)?;

    let pickup = required(payload.pickup, "pickup")?.into_location("pickup")?;
    let dropoff = required(payload.dropoff, "dropoff")?.into_location("dropoff")?;
    let vehicle_class: VehicleClass =
        required(payload.vehicle_class, "vehicle_class")?.parse()?;

    // Not retried: an outage reported after the write landed would create a
    // second booking. The client re-lists its bookings before resubmitting.
    let booking = state
        .dispatch
        .submit(&actor, pickup, dropoff, vehicle_class)
        .await?;

    Ok(Json(booking))
}

async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    actor.require(Role::User)?;

    let bookings = with_storage_retry(state.retry, "list_my_bookings", || {
        state.store.list_by_requester(actor.id)
    })
    .await?;

    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = with_storage_retry(state.retry, "get_booking", || state.store.get(id)).await?;

    if !actor.can_view(&booking) {
        return Err(AppError::Forbidden(format!(
            "booking {id} is not visible to this {}",
            actor.role
        )));
    }

    Ok(Json(booking))
}
