use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::pricing::PricingEngine;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingDraft, BookingStatus};
use crate::store::BookingStore;

struct Record {
    seq: u64,
    booking: Booking,
}

/// Ordered id sets keyed by a secondary attribute. Values are insertion
/// sequence numbers so iteration follows creation order.
type Index<K> = DashMap<K, BTreeMap<u64, Uuid>>;

/// Sharded in-memory store.
///
/// A transition holds the write lock of the booking's shard only, so claims
/// on unrelated bookings proceed in parallel. Index maps are always locked
/// after the row lock and never the other way round; readers copy ids out of
/// an index before touching rows.
pub struct InMemoryBookingStore {
    pricing: PricingEngine,
    bookings: DashMap<Uuid, Record>,
    by_status: Index<BookingStatus>,
    by_driver: Index<Uuid>,
    by_requester: Index<Uuid>,
    next_seq: AtomicU64,
}

impl InMemoryBookingStore {
    pub fn new(pricing: PricingEngine) -> Self {
        Self {
            pricing,
            bookings: DashMap::new(),
            by_status: DashMap::new(),
            by_driver: DashMap::new(),
            by_requester: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    fn indexed_ids<K>(index: &Index<K>, key: &K) -> Vec<Uuid>
    where
        K: Eq + std::hash::Hash,
    {
        index
            .get(key)
            .map(|ids| ids.values().copied().collect())
            .unwrap_or_default()
    }

    fn load<F>(&self, ids: Vec<Uuid>, keep: F) -> Vec<Booking>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut records: Vec<(u64, Booking)> = ids
            .into_iter()
            .filter_map(|id| {
                self.bookings
                    .get(&id)
                    .filter(|record| keep(&record.booking))
                    .map(|record| (record.seq, record.booking.clone()))
            })
            .collect();

        sort_by_creation(&mut records);
        records.into_iter().map(|(_, booking)| booking).collect()
    }
}

fn sort_by_creation(records: &mut [(u64, Booking)]) {
    records.sort_by(|a, b| {
        a.1.created_at
            .cmp(&b.1.created_at)
            .then_with(|| a.0.cmp(&b.0))
    });
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, draft: BookingDraft) -> Result<Booking, AppError> {
        draft.validate()?;
        let estimate = self.pricing.estimate(
            &draft.pickup.point,
            &draft.dropoff.point,
            draft.vehicle_class,
        )?;

        let booking = Booking {
            id: Uuid::new_v4(),
            requester_id: draft.requester_id,
            pickup: draft.pickup,
            dropoff: draft.dropoff,
            vehicle_class: draft.vehicle_class,
            distance_km: estimate.distance_km,
            estimated_cost: estimate.cost,
            status: BookingStatus::Pending,
            driver_id: None,
            created_at: Utc::now(),
            accepted_at: None,
            completed_at: None,
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = booking.id;
        let requester_id = booking.requester_id;

        // Indexes are written while the row lock is held so a concurrent
        // transition can never observe the row without its index entries.
        let row = self.bookings.entry(id).or_insert(Record {
            seq,
            booking: booking.clone(),
        });
        self.by_status
            .entry(BookingStatus::Pending)
            .or_default()
            .insert(seq, id);
        self.by_requester
            .entry(requester_id)
            .or_default()
            .insert(seq, id);
        drop(row);

        Ok(booking)
    }

    async fn get(&self, id: Uuid) -> Result<Booking, AppError> {
        self.bookings
            .get(&id)
            .map(|record| record.booking.clone())
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))
    }

    async fn list_all(&self) -> Result<Vec<Booking>, AppError> {
        let mut records: Vec<(u64, Booking)> = self
            .bookings
            .iter()
            .map(|entry| (entry.seq, entry.booking.clone()))
            .collect();

        sort_by_creation(&mut records);
        Ok(records.into_iter().map(|(_, booking)| booking).collect())
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, AppError> {
        let ids = Self::indexed_ids(&self.by_status, &status);
        Ok(self.load(ids, |booking| booking.status == status))
    }

    async fn list_by_driver(
        &self,
        driver_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError> {
        let ids = Self::indexed_ids(&self.by_driver, &driver_id);
        Ok(self.load(ids, |booking| {
            booking.driver_id == Some(driver_id)
                && status.is_none_or(|wanted| booking.status == wanted)
        }))
    }

    async fn list_by_requester(&self, requester_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let ids = Self::indexed_ids(&self.by_requester, &requester_id);
        Ok(self.load(ids, |booking| booking.requester_id == requester_id))
    }

    async fn compare_and_transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        assign_driver: Option<Uuid>,
    ) -> Result<Booking, AppError> {
        if !expected.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                id,
                from: expected,
                to: next,
            });
        }

        match (next, assign_driver) {
            (BookingStatus::Accepted, Some(driver)) if driver.is_nil() => {
                return Err(AppError::Validation("driver id cannot be nil".to_string()));
            }
            // Acceptance must name the driver; completion must keep the existing one.
            (BookingStatus::Accepted, None) | (BookingStatus::Complete, Some(_)) => {
                return Err(AppError::InvalidTransition {
                    id,
                    from: expected,
                    to: next,
                });
            }
            _ => {}
        }

        let mut record = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

        let actual = record.booking.status;
        if actual != expected {
            return Err(AppError::Conflict {
                id,
                expected,
                actual,
            });
        }

        let now = Utc::now();
        let seq = record.seq;
        let booking = &mut record.booking;
        booking.status = next;
        match next {
            BookingStatus::Accepted => {
                booking.driver_id = assign_driver;
                booking.accepted_at = Some(now);
            }
            BookingStatus::Complete => booking.completed_at = Some(now),
            BookingStatus::Pending => {}
        }

        if let Some(mut ids) = self.by_status.get_mut(&expected) {
            ids.remove(&seq);
        }
        self.by_status.entry(next).or_default().insert(seq, id);
        if let Some(driver) = assign_driver {
            self.by_driver.entry(driver).or_default().insert(seq, id);
        }

        Ok(record.booking.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::InMemoryBookingStore;
    use crate::engine::pricing::PricingEngine;
    use crate::error::AppError;
    use crate::models::booking::{BookingDraft, BookingStatus, VehicleClass};
    use crate::models::location::Location;
    use crate::store::BookingStore;

    fn store() -> InMemoryBookingStore {
        InMemoryBookingStore::new(PricingEngine::default())
    }

    fn draft(requester: u128, class: VehicleClass) -> BookingDraft {
        BookingDraft {
            requester_id: Uuid::from_u128(requester),
            pickup: Location::new("Alexanderplatz", 52.5219, 13.4132),
            dropoff: Location::new("Tempelhofer Feld", 52.4730, 13.4039),
            vehicle_class: class,
        }
    }

    #[tokio::test]
    async fn created_booking_is_pending_and_priced() {
        let store = store();
        let booking = store.create(draft(1, VehicleClass::Large)).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.driver_id.is_none());
        assert!(booking.distance_km > 0.0);
        let quoted = PricingEngine::default()
            .estimate(
                &booking.pickup.point,
                &booking.dropoff.point,
                VehicleClass::Large,
            )
            .unwrap();
        assert_eq!(booking.distance_km, quoted.distance_km);
        assert_eq!(booking.estimated_cost, quoted.cost);

        let fetched = store.get(booking.id).await.unwrap();
        assert_eq!(fetched.id, booking.id);
        assert_eq!(fetched.estimated_cost, booking.estimated_cost);
    }

    #[tokio::test]
    async fn invalid_drafts_leave_the_store_empty() {
        let store = store();

        let mut blank_label = draft(1, VehicleClass::Small);
        blank_label.pickup.label = "   ".to_string();
        let err = store.create(blank_label).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut nil_requester = draft(0, VehicleClass::Small);
        nil_requester.requester_id = Uuid::nil();
        let err = store.create(nil_requester).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut off_globe = draft(1, VehicleClass::Small);
        off_globe.dropoff = Location::new("Nowhere", 123.0, 0.0);
        let err = store.create(off_globe).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCoordinates(_)));

        assert!(store.is_empty());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = store();
        let missing = Uuid::from_u128(404);

        assert!(matches!(
            store.get(missing).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store
                .compare_and_transition(
                    missing,
                    BookingStatus::Pending,
                    BookingStatus::Accepted,
                    Some(Uuid::from_u128(9)),
                )
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn mismatched_expectation_conflicts_without_mutation() {
        let store = store();
        let booking = store.create(draft(1, VehicleClass::Small)).await.unwrap();

        let err = store
            .compare_and_transition(
                booking.id,
                BookingStatus::Accepted,
                BookingStatus::Complete,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Conflict {
                actual: BookingStatus::Pending,
                ..
            }
        ));
        let unchanged = store.get(booking.id).await.unwrap();
        assert_eq!(unchanged.status, BookingStatus::Pending);
        assert!(unchanged.completed_at.is_none());
    }

    #[tokio::test]
    async fn skipping_acceptance_is_an_invalid_transition() {
        let store = store();
        let booking = store.create(draft(1, VehicleClass::Small)).await.unwrap();

        let err = store
            .compare_and_transition(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Complete,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(
            store.get(booking.id).await.unwrap().status,
            BookingStatus::Pending
        );
    }

    #[tokio::test]
    async fn acceptance_requires_a_driver() {
        let store = store();
        let booking = store.create(draft(1, VehicleClass::Small)).await.unwrap();

        let err = store
            .compare_and_transition(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert!(store.get(booking.id).await.unwrap().driver_id.is_none());
    }

    #[tokio::test]
    async fn transitions_move_bookings_between_status_listings() {
        let store = store();
        let driver = Uuid::from_u128(77);
        let first = store.create(draft(1, VehicleClass::Small)).await.unwrap();
        let second = store.create(draft(2, VehicleClass::Medium)).await.unwrap();

        let accepted = store
            .compare_and_transition(
                first.id,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                Some(driver),
            )
            .await
            .unwrap();
        assert_eq!(accepted.driver_id, Some(driver));
        assert!(accepted.accepted_at.is_some());

        let pending = store.list_by_status(BookingStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);

        let completed = store
            .compare_and_transition(
                first.id,
                BookingStatus::Accepted,
                BookingStatus::Complete,
                None,
            )
            .await
            .unwrap();
        assert_eq!(completed.driver_id, Some(driver));
        assert!(completed.completed_at.is_some());

        assert!(
            store
                .list_by_status(BookingStatus::Accepted)
                .await
                .unwrap()
                .is_empty()
        );
        let done = store.list_by_status(BookingStatus::Complete).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, first.id);
    }

    #[tokio::test]
    async fn listings_follow_creation_order() {
        let store = store();
        let mut created = Vec::new();
        for requester in 1..=5 {
            created.push(store.create(draft(requester, VehicleClass::Small)).await.unwrap().id);
        }

        let pending: Vec<Uuid> = store
            .list_by_status(BookingStatus::Pending)
            .await
            .unwrap()
            .into_iter()
            .map(|booking| booking.id)
            .collect();
        assert_eq!(pending, created);

        let all: Vec<Uuid> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|booking| booking.id)
            .collect();
        assert_eq!(all, created);
    }

    #[tokio::test]
    async fn driver_listing_honours_status_filter() {
        let store = store();
        let driver = Uuid::from_u128(5);
        let a = store.create(draft(1, VehicleClass::Small)).await.unwrap();
        let b = store.create(draft(1, VehicleClass::Small)).await.unwrap();
        store.create(draft(1, VehicleClass::Small)).await.unwrap();

        for id in [a.id, b.id] {
            store
                .compare_and_transition(
                    id,
                    BookingStatus::Pending,
                    BookingStatus::Accepted,
                    Some(driver),
                )
                .await
                .unwrap();
        }
        store
            .compare_and_transition(b.id, BookingStatus::Accepted, BookingStatus::Complete, None)
            .await
            .unwrap();

        assert_eq!(store.list_by_driver(driver, None).await.unwrap().len(), 2);

        let active = store
            .list_by_driver(driver, Some(BookingStatus::Accepted))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);

        assert!(
            store
                .list_by_driver(Uuid::from_u128(6), None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn requester_listing_only_returns_own_bookings() {
        let store = store();
        let mine = store.create(draft(1, VehicleClass::Small)).await.unwrap();
        store.create(draft(2, VehicleClass::Small)).await.unwrap();

        let listed = store.list_by_requester(Uuid::from_u128(1)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_acceptances_have_exactly_one_winner() {
        let store = Arc::new(store());
        let booking = store.create(draft(1, VehicleClass::Medium)).await.unwrap();

        let mut handles = Vec::new();
        for driver in 1..=32u128 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let driver = Uuid::from_u128(driver);
                let outcome = store
                    .compare_and_transition(
                        booking.id,
                        BookingStatus::Pending,
                        BookingStatus::Accepted,
                        Some(driver),
                    )
                    .await;
                (driver, outcome)
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            let (driver, outcome) = handle.await.unwrap();
            match outcome {
                Ok(_) => winners.push(driver),
                Err(AppError::Conflict { actual, .. }) => {
                    assert_eq!(actual, BookingStatus::Accepted)
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = store.get(booking.id).await.unwrap();
        assert_eq!(stored.driver_id, Some(winners[0]));
        assert_eq!(
            store
                .list_by_status(BookingStatus::Accepted)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn driver_is_present_exactly_when_status_requires_one() {
        let store = store();
        let mut ids = Vec::new();
        for requester in 1..=6 {
            ids.push(store.create(draft(requester, VehicleClass::Medium)).await.unwrap().id);
        }

        for (n, id) in ids.iter().enumerate().skip(2) {
            let driver = Uuid::from_u128(100 + n as u128 % 2);
            store
                .compare_and_transition(
                    *id,
                    BookingStatus::Pending,
                    BookingStatus::Accepted,
                    Some(driver),
                )
                .await
                .unwrap();
        }
        for id in &ids[4..] {
            store
                .compare_and_transition(*id, BookingStatus::Accepted, BookingStatus::Complete, None)
                .await
                .unwrap();
        }
        // Rejected attempts must not disturb the invariant either.
        let _ = store
            .compare_and_transition(
                ids[0],
                BookingStatus::Accepted,
                BookingStatus::Complete,
                None,
            )
            .await;
        let _ = store
            .compare_and_transition(
                ids[4],
                BookingStatus::Pending,
                BookingStatus::Accepted,
                Some(Uuid::from_u128(200)),
            )
            .await;

        let bookings = store.list_all().await.unwrap();
        assert_eq!(bookings.len(), 6);
        for booking in &bookings {
            assert_eq!(
                booking.driver_id.is_some(),
                booking.status.has_driver(),
                "booking {} is {} with driver {:?}",
                booking.id,
                booking.status,
                booking.driver_id
            );
        }
        let statuses: Vec<BookingStatus> = bookings.iter().map(|b| b.status).collect();
        assert_eq!(
            statuses,
            vec![
                BookingStatus::Pending,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                BookingStatus::Accepted,
                BookingStatus::Complete,
                BookingStatus::Complete,
            ]
        );
    }
}
