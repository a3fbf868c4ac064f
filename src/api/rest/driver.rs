use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, put};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::{AppPath, AppQuery};
use crate::api::rest::retry::with_storage_retry;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::booking::{Booking, BookingStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/driver/bookings", get(list_driver_bookings))
        .route("/driver/bookings/pending", get(list_pending_bookings))
        .route("/driver/bookings/:id/accept", put(claim_booking))
}

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

impl StatusFilter {
    pub fn parse(self) -> Result<Option<BookingStatus>, AppError> {
        self.status.map(|raw| raw.parse()).transpose()
    }
}

async fn list_pending_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    actor.require(Role::Driver)?;

    let pending = with_storage_retry(state.retry, "list_pending", || {
        state.dispatch.list_pending()
    })
    .await?;

    Ok(Json(pending))
}

async fn claim_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    actor.require(Role::Driver)?;

    let state = &state;
    let driver_id = actor.id;
    let mut retrying = false;
    let booking = with_storage_retry(state.retry, "claim_booking", move || {
        let recheck = retrying;
        retrying = true;
        async move {
            // The previous attempt may have committed before the outage was reported.
            if recheck {
                if let Some(booking) = held_by(state, id, driver_id).await? {
                    return Ok(booking);
                }
            }
            state.dispatch.claim(id, driver_id).await
        }
    })
    .await?;

    Ok(Json(booking))
}

async fn held_by(
    state: &AppState,
    id: Uuid,
    driver_id: Uuid,
) -> Result<Option<Booking>, AppError> {
    let booking = state.store.get(id).await?;
    let held = booking.status == BookingStatus::Accepted && booking.driver_id == Some(driver_id);
    Ok(held.then_some(booking))
}

async fn list_driver_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppQuery(filter): AppQuery<StatusFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    actor.require(Role::Driver)?;
    let status = filter.parse()?;

    let bookings = with_storage_retry(state.retry, "list_driver_bookings", || {
        state.store.list_by_driver(actor.id, status)
    })
    .await?;

    Ok(Json(bookings))
}
