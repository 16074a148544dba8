use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::error::AllocationError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: assignment mutations. Labels: op, status.
pub const MUTATIONS_TOTAL: &str = "capacity_mutations_total";

/// Counter: rejected mutations. Labels: op, reason.
pub const REJECTIONS_TOTAL: &str = "capacity_rejections_total";

// ── USE metrics (state) ─────────────────────────────────────────

/// Gauge: committed assignments held by the store.
pub const ASSIGNMENTS_ACTIVE: &str = "capacity_assignments_active";

/// Histogram: ledger rebuild duration in seconds.
pub const LEDGER_REBUILD_SECONDS: &str = "capacity_ledger_rebuild_seconds";

/// Counter: persisted records left out of a rebuild.
pub const RECORDS_SKIPPED_TOTAL: &str = "capacity_records_skipped_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Count one mutation outcome under `op`.
pub fn record_mutation<T>(op: &'static str, result: &Result<T, AllocationError>) {
    match result {
        Ok(_) => {
            metrics::counter!(MUTATIONS_TOTAL, "op" => op, "status" => "ok").increment(1);
        }
        Err(e) => {
            metrics::counter!(MUTATIONS_TOTAL, "op" => op, "status" => "error").increment(1);
            metrics::counter!(REJECTIONS_TOTAL, "op" => op, "reason" => e.kind_label())
                .increment(1);
        }
    }
}
