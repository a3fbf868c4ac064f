use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::models::booking::BookingStatus;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_created_total: IntCounterVec,
    pub claims_total: IntCounterVec,
    pub completions_total: IntCounterVec,
    pub bookings_by_status: IntGaugeVec,
    pub dispatch_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_created_total = IntCounterVec::new(
            Opts::new("bookings_created_total", "Bookings created by vehicle class"),
            &["vehicle_class"],
        )
        .expect("valid bookings_created_total metric");

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Driver claims by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let completions_total = IntCounterVec::new(
            Opts::new("completions_total", "Booking completions by outcome"),
            &["outcome"],
        )
        .expect("valid completions_total metric");

        let bookings_by_status = IntGaugeVec::new(
            Opts::new("bookings_by_status", "Current number of bookings per status"),
            &["status"],
        )
        .expect("valid bookings_by_status metric");

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch operations in seconds",
            ),
            &["operation"],
        )
        .expect("valid dispatch_latency_seconds metric");

        registry
            .register(Box::new(bookings_created_total.clone()))
            .expect("register bookings_created_total");
        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(completions_total.clone()))
            .expect("register completions_total");
        registry
            .register(Box::new(bookings_by_status.clone()))
            .expect("register bookings_by_status");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");

        for status in BookingStatus::ALL {
            bookings_by_status.with_label_values(&[status.as_str()]).set(0);
        }

        Self {
            registry,
            bookings_created_total,
            claims_total,
            completions_total,
            bookings_by_status,
            dispatch_latency_seconds,
        }
    }

    pub fn record_transition(&self, from: BookingStatus, to: BookingStatus) {
        self.bookings_by_status
            .with_label_values(&[from.as_str()])
            .dec();
        self.bookings_by_status
            .with_label_values(&[to.as_str()])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
