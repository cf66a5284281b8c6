use std::net::SocketAddr;

use crate::sql::Command;

// ── Requests ────────────────────────────────────────────────────

/// Counter: statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "courtbook_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "courtbook_query_duration_seconds";

// ── Bookings ────────────────────────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "courtbook_bookings_created_total";

/// Counter: booking attempts refused for overlap. Labels: stage
/// (`precheck` or `constraint`).
pub const BOOKING_CONFLICTS_TOTAL: &str = "courtbook_booking_conflicts_total";

// ── Resources ───────────────────────────────────────────────────

/// Gauge: open client connections.
pub const CONNECTIONS_ACTIVE: &str = "courtbook_connections_active";

/// Counter: connections accepted.
pub const CONNECTIONS_TOTAL: &str = "courtbook_connections_total";

/// Counter: connections turned away at the connection limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "courtbook_connections_rejected_total";

/// Gauge: tenants with an open store.
pub const TENANTS_ACTIVE: &str = "courtbook_tenants_active";

/// Counter: logins refused before the password check.
pub const AUTH_FAILURES_TOTAL: &str = "courtbook_auth_failures_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "courtbook_wal_flush_duration_seconds";

/// Histogram: records per group commit.
pub const WAL_FLUSH_BATCH_SIZE: &str = "courtbook_wal_flush_batch_size";

/// Serve Prometheus metrics on `port`, if one is configured.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metrics label for a statement.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::CreateDefaultSchedule { .. } => "create_default_schedule",
        Command::SetDailyHours { .. } => "set_daily_hours",
        Command::DeleteSchedule { .. } => "delete_schedule",
        Command::SelectSchedule { .. } => "select_schedule",
        Command::SaveCourt { .. } => "save_court",
        Command::DeleteCourt { .. } => "delete_court",
        Command::SelectCourts { .. } => "select_courts",
        Command::InsertBooking { .. } => "insert_booking",
        Command::UpdateBooking { .. } => "update_booking",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectAvailability { .. } => "select_availability",
    }
}
