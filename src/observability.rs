use std::net::SocketAddr;

use crate::model::Availability;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability checks answered. Labels: result.
pub const CHECKS_TOTAL: &str = "lockout_checks_total";

/// Histogram: availability check latency in seconds.
pub const CHECK_DURATION_SECONDS: &str = "lockout_check_duration_seconds";

/// Counter: blocked-date window scans.
pub const BLOCKED_DATE_SCANS_TOTAL: &str = "lockout_blocked_date_scans_total";

// ── USE metrics (store utilization) ─────────────────────────────

/// Counter: bookings accepted by the pre-commit sanity check.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "lockout_bookings_confirmed_total";

/// Counter: bookings rejected because capacity was consumed in the interim.
pub const BOOKINGS_REJECTED_TOTAL: &str = "lockout_bookings_rejected_total";

/// Gauge: active cart holds across all sessions.
pub const HOLDS_ACTIVE: &str = "lockout_holds_active";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        tracing::error!("failed to install Prometheus metrics exporter: {e}");
        return;
    }
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a verdict to a short label for metrics.
pub fn availability_label(availability: &Availability) -> &'static str {
    match availability {
        Availability::Unlimited => "unlimited",
        Availability::Finite(_) => "finite",
        Availability::Exhausted => "exhausted",
        Availability::SlotExhausted => "slot_exhausted",
    }
}
