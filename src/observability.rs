use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "rota_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "rota_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "rota_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "rota_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "rota_connections_rejected_total";

/// Gauge: number of operating days with a loaded engine.
pub const DAYS_ACTIVE: &str = "rota_days_active";

/// Counter: connections refused because the database name named no usable day.
pub const DAY_RESOLUTION_FAILURES_TOTAL: &str = "rota_day_resolution_failures_total";

// ── Desk metrics ────────────────────────────────────────────────

/// Counter: customer-units bound to a technician. Labels: source
/// (walk_in, flush, reservation, add_on).
pub const ASSIGNMENTS_TOTAL: &str = "rota_assignments_total";

/// Counter: walk-ins that could not be bound on arrival. Labels: reason.
pub const UNASSIGNED_TOTAL: &str = "rota_unassigned_total";

/// Counter: extensions and add-ons applied. Labels: kind.
pub const EXTENSIONS_TOTAL: &str = "rota_extensions_total";

/// Counter: extensions or add-ons refused because they would overlap a commitment.
pub const CONFLICTS_TOTAL: &str = "rota_conflicts_total";

/// Counter: waiting batches and pending reservations reported stale by the ticker.
pub const STALE_ITEMS_TOTAL: &str = "rota_stale_items_total";

/// Gauge: customer-units in the backlog. Labels: day.
pub const WAITING_CUSTOMERS: &str = "rota_waiting_customers";

/// Gauge: reservations not yet fulfilled. Labels: day.
pub const PENDING_RESERVATIONS: &str = "rota_pending_reservations";

// ── Persistence ─────────────────────────────────────────────────

/// Histogram: snapshot write duration in seconds.
pub const SNAPSHOT_WRITE_DURATION_SECONDS: &str = "rota_snapshot_write_duration_seconds";

/// Histogram: snapshot requests coalesced into one write.
pub const SNAPSHOT_WRITE_BATCH_SIZE: &str = "rota_snapshot_write_batch_size";

/// Counter: snapshot writes that failed (the day is left dirty).
pub const SNAPSHOT_FAILURES_TOTAL: &str = "rota_snapshot_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::CheckIn { .. } => "check_in",
        Command::RemoveTechnician { .. } => "remove_technician",
        Command::UpsertService { .. } => "upsert_service",
        Command::RemoveService { .. } => "remove_service",
        Command::Register { .. } => "register",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::DeleteReservation { .. } => "delete_reservation",
        Command::Extend { .. } => "extend",
        Command::AddOn { .. } => "add_on",
        Command::RecordPayment { .. } => "record_payment",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::DeleteWaiting { .. } => "delete_waiting",
        Command::Select { .. } => "select",
        Command::SelectEligible { .. } => "select_eligible",
        Command::Call { .. } => "call",
        Command::Listen { .. } => "listen",
        Command::Unlisten { .. } => "unlisten",
        Command::UnlistenAll => "unlisten_all",
    }
}
