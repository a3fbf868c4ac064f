use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::pricing::{from_decimal, round_half_up, to_decimal};
use crate::error::AppError;
use crate::models::booking::{BookingStatus, VehicleClass};
use crate::store::BookingStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub window_days: u32,
    pub bookings_over_time: Vec<DailyCount>,
    pub revenue_over_time: Vec<DailyRevenue>,
    pub status_distribution: BTreeMap<BookingStatus, usize>,
    pub vehicle_class_distribution: BTreeMap<VehicleClass, usize>,
    pub active_bookings_by_driver: BTreeMap<Uuid, Vec<Uuid>>,
    pub driver_performance: Vec<DriverPerformance>,
}

/// Per-driver totals over every booking the driver has claimed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverPerformance {
    pub driver_id: Uuid,
    pub active_bookings: usize,
    pub completed_bookings: usize,
    pub revenue: f64,
}

/// Read-only admin projections.
///
/// Everything is recomputed from the store on each call; nothing is cached.
#[derive(Clone)]
pub struct FleetAggregator {
    store: Arc<dyn BookingStore>,
}

impl FleetAggregator {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Accepted bookings grouped by driver, each list in creation order.
    pub async fn active_bookings_by_driver(&self) -> Result<BTreeMap<Uuid, Vec<Uuid>>, AppError> {
        let accepted = self.store.list_by_status(BookingStatus::Accepted).await?;

        let mut by_driver: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for booking in accepted {
            if let Some(driver_id) = booking.driver_id {
                by_driver.entry(driver_id).or_default().push(booking.id);
            }
        }

        Ok(by_driver)
    }

    pub async fn bookings_over_time(&self, window_days: u32) -> Result<Vec<DailyCount>, AppError> {
        self.bookings_over_time_at(window_days, Utc::now()).await
    }

    /// Bookings per UTC creation day over today and the `window_days - 1`
    /// days before it. Days without bookings are omitted.
    pub async fn bookings_over_time_at(
        &self,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyCount>, AppError> {
        let Some(window) = DayWindow::ending_at(now, window_days) else {
            return Ok(Vec::new());
        };

        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for booking in self.store.list_all().await? {
            let day = booking.created_at.date_naive();
            if window.contains(day) {
                *per_day.entry(day).or_default() += 1;
            }
        }

        Ok(per_day
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }

    pub async fn revenue_over_time(&self, window_days: u32) -> Result<Vec<DailyRevenue>, AppError> {
        self.revenue_over_time_at(window_days, Utc::now()).await
    }

    /// Revenue is recognised on the day a booking completes, so only
    /// `complete` bookings count and they are bucketed by completion date.
    pub async fn revenue_over_time_at(
        &self,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyRevenue>, AppError> {
        let Some(window) = DayWindow::ending_at(now, window_days) else {
            return Ok(Vec::new());
        };

        let mut per_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for booking in self.store.list_by_status(BookingStatus::Complete).await? {
            let Some(completed_at) = booking.completed_at else {
                continue;
            };
            let day = completed_at.date_naive();
            if window.contains(day) {
                *per_day.entry(day).or_default() += to_decimal(booking.estimated_cost)?;
            }
        }

        per_day
            .into_iter()
            .map(|(date, total)| {
                from_decimal(round_half_up(total, 2)).map(|total| DailyRevenue { date, total })
            })
            .collect()
    }

    /// One row per driver who has ever claimed a booking, ordered by driver id.
    pub async fn driver_performance(&self) -> Result<Vec<DriverPerformance>, AppError> {
        #[derive(Default)]
        struct Tally {
            active: usize,
            completed: usize,
            revenue: Decimal,
        }

        let mut tallies: BTreeMap<Uuid, Tally> = BTreeMap::new();
        for status in [BookingStatus::Accepted, BookingStatus::Complete] {
            for booking in self.store.list_by_status(status).await? {
                let Some(driver_id) = booking.driver_id else {
                    continue;
                };
                let tally = tallies.entry(driver_id).or_default();
                if status == BookingStatus::Complete {
                    tally.completed += 1;
                    tally.revenue += to_decimal(booking.estimated_cost)?;
                } else {
                    tally.active += 1;
                }
            }
        }

        tallies
            .into_iter()
            .map(|(driver_id, tally)| {
                from_decimal(round_half_up(tally.revenue, 2)).map(|revenue| DriverPerformance {
                    driver_id,
                    active_bookings: tally.active,
                    completed_bookings: tally.completed,
                    revenue,
                })
            })
            .collect()
    }

    pub async fn vehicle_class_distribution(
        &self,
    ) -> Result<BTreeMap<VehicleClass, usize>, AppError> {
        let mut counts: BTreeMap<VehicleClass, usize> = BTreeMap::new();
        for booking in self.store.list_all().await? {
            *counts.entry(booking.vehicle_class).or_default() += 1;
        }
        Ok(counts)
    }

    pub async fn status_distribution(&self) -> Result<BTreeMap<BookingStatus, usize>, AppError> {
        let mut counts: BTreeMap<BookingStatus, usize> = BTreeMap::new();
        for booking in self.store.list_all().await? {
            *counts.entry(booking.status).or_default() += 1;
        }
        Ok(counts)
    }

    pub async fn snapshot(&self, window_days: u32) -> Result<FleetSnapshot, AppError> {
        let now = Utc::now();
        Ok(FleetSnapshot {
            window_days,
            bookings_over_time: self.bookings_over_time_at(window_days, now).await?,
            revenue_over_time: self.revenue_over_time_at(window_days, now).await?,
            status_distribution: self.status_distribution().await?,
            vehicle_class_distribution: self.vehicle_class_distribution().await?,
            active_bookings_by_driver: self.active_bookings_by_driver().await?,
            driver_performance: self.driver_performance().await?,
        })
    }
}

struct DayWindow {
    first: NaiveDate,
    last: NaiveDate,
}

impl DayWindow {
    fn ending_at(now: DateTime<Utc>, window_days: u32) -> Option<Self> {
        if window_days == 0 {
            return None;
        }

        let last = now.date_naive();
        let first = last
            .checked_sub_days(Days::new(u64::from(window_days - 1)))
            .unwrap_or(NaiveDate::MIN);

        Some(Self { first, last })
    }

    fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }
}
