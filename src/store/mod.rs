pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingDraft, BookingStatus};

pub use memory::InMemoryBookingStore;

/// The authoritative record of every booking.
///
/// Every method may suspend on I/O in a durable implementation, so callers
/// must not hold unrelated locks across a call. Listings return finite
/// snapshots ordered by creation time ascending; they are not linearizable
/// with concurrent transitions.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Prices the draft, assigns a fresh id and persists it as `pending`.
    async fn create(&self, draft: BookingDraft) -> Result<Booking, AppError>;

    async fn get(&self, id: Uuid) -> Result<Booking, AppError>;

    async fn list_all(&self) -> Result<Vec<Booking>, AppError>;

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, AppError>;

    async fn list_by_driver(
        &self,
        driver_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError>;

    async fn list_by_requester(&self, requester_id: Uuid) -> Result<Vec<Booking>, AppError>;

    /// The single mutation primitive.
    ///
    /// Atomically moves the booking from `expected` to `next` and records
    /// `assign_driver` when given. A status mismatch yields
    /// [`AppError::Conflict`]; an illegal step yields
    /// [`AppError::InvalidTransition`]. Neither mutates anything.
    async fn compare_and_transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        assign_driver: Option<Uuid>,
    ) -> Result<Booking, AppError>;
}
