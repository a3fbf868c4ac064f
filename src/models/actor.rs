use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Unauthorized(format!("unknown role: {other}"))),
        }
    }
}

/// An identity already authenticated upstream. Core operations receive it
/// explicitly and never look at request headers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn require(&self, role: Role) -> Result<&Self, AppError> {
        if self.role == role {
            Ok(self)
        } else {
            Err(AppError::Forbidden(format!(
                "{} role required, actor is {}",
                role, self.role
            )))
        }
    }

    /// Admins see every booking, users their own requests, drivers the
    /// pending pool plus whatever they have claimed.
    pub fn can_view(&self, booking: &Booking) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => booking.requester_id == self.id,
            Role::Driver => {
                booking.status == BookingStatus::Pending || booking.driver_id == Some(self.id)
            }
        }
    }
}
