use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Small,
    Medium,
    Large,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Small => "small",
            VehicleClass::Medium => "medium",
            VehicleClass::Large => "large",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown classes are rejected; there is no fallback rate.
impl FromStr for VehicleClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(VehicleClass::Small),
            "medium" => Ok(VehicleClass::Medium),
            "large" => Ok(VehicleClass::Large),
            other => Err(AppError::Validation(format!(
                "unknown vehicle class: {other}, expected small/medium/large"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Complete,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Complete => "complete",
        }
    }

    /// Only the two forward steps exist.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Accepted)
                | (BookingStatus::Accepted, BookingStatus::Complete)
        )
    }

    pub fn has_driver(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "accepted" => Ok(BookingStatus::Accepted),
            "complete" => Ok(BookingStatus::Complete),
            other => Err(AppError::Validation(format!(
                "unknown booking status: {other}, expected pending/accepted/complete"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub pickup: Location,
    pub dropoff: Location,
    pub vehicle_class: VehicleClass,
    pub distance_km: f64,
    pub estimated_cost: f64,
    pub status: BookingStatus,
    pub driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything a requester supplies; the store derives the rest.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub requester_id: Uuid,
    pub pickup: Location,
    pub dropoff: Location,
    pub vehicle_class: VehicleClass,
}

impl BookingDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.requester_id.is_nil() {
            return Err(AppError::Validation("requester id is required".to_string()));
        }
        if self.pickup.label.trim().is_empty() {
            return Err(AppError::Validation("pickup label cannot be empty".to_string()));
        }
        if self.dropoff.label.trim().is_empty() {
            return Err(AppError::Validation("dropoff label cannot be empty".to_string()));
        }
        Ok(())
    }
}
