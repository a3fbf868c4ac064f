use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::booking::VehicleClass;
use crate::models::location::GeoPoint;

const DISTANCE_DECIMALS: u32 = 1;
const COST_DECIMALS: u32 = 2;
const MIN_BILLABLE_KM: f64 = 0.05;

pub const DEFAULT_SMALL_RATE: f64 = 5.0;
pub const DEFAULT_MEDIUM_RATE: f64 = 8.0;
pub const DEFAULT_LARGE_RATE: f64 = 12.0;

/// Currency units per kilometre for each vehicle class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            small: DEFAULT_SMALL_RATE,
            medium: DEFAULT_MEDIUM_RATE,
            large: DEFAULT_LARGE_RATE,
        }
    }
}

impl RateTable {
    pub fn rate_for(&self, class: VehicleClass) -> f64 {
        match class {
            VehicleClass::Small => self.small,
            VehicleClass::Medium => self.medium,
            VehicleClass::Large => self.large,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub distance_km: f64,
    pub cost: f64,
}

/// Prices a trip from its endpoints. Stateless apart from the rate table.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    rates: RateTable,
}

impl PricingEngine {
    pub fn new(rates: RateTable) -> Self {
        Self { rates }
    }

    pub fn estimate(
        &self,
        pickup: &GeoPoint,
        dropoff: &GeoPoint,
        class: VehicleClass,
    ) -> Result<Estimate, AppError> {
        pickup.validate()?;
        dropoff.validate()?;

        if pickup == dropoff {
            return Err(AppError::InvalidCoordinates(
                "pickup and dropoff are the same point".to_string(),
            ));
        }

        // Anything under half the 0.1 km resolution would be priced as zero.
        let raw_km = haversine_km(pickup, dropoff);
        if raw_km < MIN_BILLABLE_KM {
            return Err(AppError::InvalidCoordinates(
                "pickup and dropoff are less than 100 m apart".to_string(),
            ));
        }
        let distance = round_half_up(to_decimal(raw_km)?, DISTANCE_DECIMALS);

        let cost = round_half_up(
            distance * to_decimal(self.rates.rate_for(class))?,
            COST_DECIMALS,
        );

        Ok(Estimate {
            distance_km: from_decimal(distance)?,
            cost: from_decimal(cost)?,
        })
    }
}

/// Midpoints round away from zero, so `1.005` becomes `1.01`.
pub fn round_half_up(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Goes through the shortest round-trip text of `value`, so `2.01` is
/// exactly `2.01` rather than the nearest binary fraction.
pub fn to_decimal(value: f64) -> Result<Decimal, AppError> {
    Decimal::from_str(&value.to_string())
        .map_err(|err| AppError::Internal(format!("{value} has no decimal form: {err}")))
}

pub fn from_decimal(value: Decimal) -> Result<f64, AppError> {
    value
        .to_string()
        .parse::<f64>()
        .map_err(|err| AppError::Internal(format!("{value} has no f64 form: {err}")))
}
