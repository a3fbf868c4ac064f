use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::booking::{Booking, BookingDraft, BookingStatus, VehicleClass};
use crate::models::event::{BookingEvent, BookingEventKind};
use crate::models::location::Location;
use crate::observability::metrics::Metrics;
use crate::store::BookingStore;

/// Brokers claims between drivers and the shared pending pool.
///
/// Holds no booking state of its own: every decision is delegated to the
/// store's compare-and-transition, which is what makes a claim race-safe.
#[derive(Clone)]
pub struct DispatchCoordinator {
    store: Arc<dyn BookingStore>,
    events_tx: broadcast::Sender<BookingEvent>,
    metrics: Metrics,
}

impl DispatchCoordinator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        events_tx: broadcast::Sender<BookingEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            events_tx,
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events_tx.subscribe()
    }

    /// Creates a booking on behalf of a requesting user and announces it to drivers.
    pub async fn submit(
        &self,
        requester: &Actor,
        pickup: Location,
        dropoff: Location,
        vehicle_class: VehicleClass,
    ) -> Result<Booking, AppError> {
        requester.require(Role::User)?;

        let start = Instant::now();
        let booking = self
            .store
            .create(BookingDraft {
                requester_id: requester.id,
                pickup,
                dropoff,
                vehicle_class,
            })
            .await?;
        self.observe("submit", start);

        self.metrics
            .bookings_created_total
            .with_label_values(&[booking.vehicle_class.as_str()])
            .inc();
        self.metrics
            .bookings_by_status
            .with_label_values(&[BookingStatus::Pending.as_str()])
            .inc();

        info!(
            booking_id = %booking.id,
            requester_id = %booking.requester_id,
            vehicle_class = %booking.vehicle_class,
            distance_km = booking.distance_km,
            estimated_cost = booking.estimated_cost,
            "booking created"
        );
        self.publish(BookingEventKind::Created, &booking);

        Ok(booking)
    }

    pub async fn list_pending(&self) -> Result<Vec<Booking>, AppError> {
        self.store.list_by_status(BookingStatus::Pending).await
    }

    /// Claims a pending booking for `driver_id`.
    ///
    /// Losing the race is reported as [`AppError::AlreadyClaimed`]; the
    /// caller should re-list pending bookings rather than retry this id.
    pub async fn claim(&self, booking_id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
        let start = Instant::now();
        let result = self
            .store
            .compare_and_transition(
                booking_id,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                Some(driver_id),
            )
            .await;
        self.observe("claim", start);

        match result {
            Ok(booking) => {
                self.metrics.claims_total.with_label_values(&["won"]).inc();
                self.metrics
                    .record_transition(BookingStatus::Pending, BookingStatus::Accepted);
                info!(booking_id = %booking_id, driver_id = %driver_id, "booking claimed");
                self.publish(BookingEventKind::Claimed, &booking);
                Ok(booking)
            }
            Err(AppError::Conflict { actual, .. }) => {
                self.metrics.claims_total.with_label_values(&["lost"]).inc();
                warn!(
                    booking_id = %booking_id,
                    driver_id = %driver_id,
                    status = %actual,
                    "claim lost; booking no longer pending"
                );
                Err(AppError::AlreadyClaimed(booking_id))
            }
            Err(err) => {
                self.metrics.claims_total.with_label_values(&["error"]).inc();
                Err(err)
            }
        }
    }

    /// Marks an accepted booking complete. Only administrators may do this,
    /// and only once the booking has been claimed.
    pub async fn complete(&self, booking_id: Uuid, actor: &Actor) -> Result<Booking, AppError> {
        actor.require(Role::Admin)?;

        let start = Instant::now();
        let result = self
            .store
            .compare_and_transition(
                booking_id,
                BookingStatus::Accepted,
                BookingStatus::Complete,
                None,
            )
            .await;
        self.observe("complete", start);

        match result {
            Ok(booking) => {
                self.metrics
                    .completions_total
                    .with_label_values(&["success"])
                    .inc();
                self.metrics
                    .record_transition(BookingStatus::Accepted, BookingStatus::Complete);
                info!(booking_id = %booking_id, admin_id = %actor.id, "booking completed");
                self.publish(BookingEventKind::Completed, &booking);
                Ok(booking)
            }
            Err(AppError::Conflict { actual, .. }) => {
                self.metrics
                    .completions_total
                    .with_label_values(&["rejected"])
                    .inc();
                warn!(booking_id = %booking_id, status = %actual, "completion rejected");
                Err(AppError::InvalidTransition {
                    id: booking_id,
                    from: actual,
                    to: BookingStatus::Complete,
                })
            }
            Err(err) => {
                self.metrics
                    .completions_total
                    .with_label_values(&["error"])
                    .inc();
                Err(err)
            }
        }
    }

    fn observe(&self, operation: &str, start: Instant) {
        self.metrics
            .dispatch_latency_seconds
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());
    }

    fn publish(&self, kind: BookingEventKind, booking: &Booking) {
        debug_assert_eq!(booking.status, kind.status());
        // No subscribers is not an error.
        let _ = self.events_tx.send(BookingEvent::new(kind, booking.clone()));
    }
}
