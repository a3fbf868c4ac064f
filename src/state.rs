use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::{Config, RetryPolicy};
use crate::engine::dispatch::DispatchCoordinator;
use crate::engine::fleet::FleetAggregator;
use crate::engine::pricing::PricingEngine;
use crate::models::event::BookingEvent;
use crate::observability::metrics::Metrics;
use crate::store::{BookingStore, InMemoryBookingStore};

pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub dispatch: DispatchCoordinator,
    pub fleet: FleetAggregator,
    pub retry: RetryPolicy,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn BookingStore>, event_buffer_size: usize, retry: RetryPolicy) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel::<BookingEvent>(event_buffer_size);
        let metrics = Metrics::new();

        Self {
            dispatch: DispatchCoordinator::new(store.clone(), events_tx, metrics.clone()),
            fleet: FleetAggregator::new(store.clone()),
            store,
            retry,
            metrics,
        }
    }

    pub fn in_memory(pricing: PricingEngine, event_buffer_size: usize) -> Self {
        Self::new(
            Arc::new(InMemoryBookingStore::new(pricing)),
            event_buffer_size,
            RetryPolicy::default(),
        )
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(InMemoryBookingStore::new(PricingEngine::new(config.rates))),
            config.event_buffer_size,
            config.retry,
        )
    }
}
