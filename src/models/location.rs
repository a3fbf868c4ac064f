use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(AppError::InvalidCoordinates(format!(
                "({}, {}) is not a finite coordinate",
                self.lat, self.lng
            )));
        }

        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::InvalidCoordinates(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }

        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::InvalidCoordinates(format!(
                "longitude {} outside [-180, 180]",
                self.lng
            )));
        }

        Ok(())
    }
}

/// A resolved place: coordinates plus the label the requester saw when picking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub label: String,
    #[serde(flatten)]
    pub point: GeoPoint,
}

impl Location {
    pub fn new(label: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            label: label.into(),
            point: GeoPoint::new(lat, lng),
        }
    }
}
