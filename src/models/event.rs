use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingEventKind {
    Created,
    Claimed,
    Completed,
}

impl BookingEventKind {
    /// Status the booking holds once this event has happened.
    pub fn status(&self) -> BookingStatus {
        match self {
            BookingEventKind::Created => BookingStatus::Pending,
            BookingEventKind::Claimed => BookingStatus::Accepted,
            BookingEventKind::Completed => BookingStatus::Complete,
        }
    }
}

/// Published after the store transition commits, so two transitions of the
/// same booking racing on different tasks may be delivered out of order.
/// Statuses only move forward: for a given booking id, the event whose
/// `booking.status` ranks highest is the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking: Booking,
    pub emitted_at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn new(kind: BookingEventKind, booking: Booking) -> Self {
        Self {
            kind,
            booking,
            emitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BookingEventKind;
    use crate::models::booking::BookingStatus;

    #[test]
    fn event_kinds_rank_in_lifecycle_order() {
        let ranks: Vec<BookingStatus> = [
            BookingEventKind::Created,
            BookingEventKind::Claimed,
            BookingEventKind::Completed,
        ]
        .iter()
        .map(BookingEventKind::status)
        .collect();

        assert_eq!(ranks, BookingStatus::ALL.to_vec());
        assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
