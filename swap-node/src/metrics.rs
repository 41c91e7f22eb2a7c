//! Metrics façade (§10), mirroring the teacher's `node/src/metrics/` module
//! family: a Prometheus exporter installed once at startup, plus typed
//! recorder structs wrapping the `metrics` crate's macro-free handles so
//! call sites don't repeat string metric names.

use metrics::{counter, gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

use swap_core::types::Direction;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Installs the Prometheus exporter's HTTP listener once. Safe to call
/// more than once; only the first call takes effect.
pub fn install(listen_addr: std::net::SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()?;
    describe();
    let _ = INSTALLED.set(());
    Ok(())
}

fn describe() {
    metrics::describe_gauge!(
        "swap_in_flight",
        Unit::Count,
        "swaps currently open, labeled by direction and state"
    );
    metrics::describe_counter!("swap_claims_total", Unit::Count, "swaps that reached a claimed state");
    metrics::describe_counter!("swap_refunds_total", Unit::Count, "swaps that reached a refunded state");
    metrics::describe_counter!("swap_burns_total", Unit::Count, "swaps burned after a detected double-spend");
}

fn direction_label(direction: Direction) -> &'static str {
    direction.as_str()
}

pub fn record_in_flight(direction: Direction, state: &str, count: f64) {
    gauge!(
        "swap_in_flight",
        "direction" => direction_label(direction),
        "state" => state.to_string()
    )
    .set(count);
}

pub fn record_claim(direction: Direction) {
    counter!("swap_claims_total", "direction" => direction_label(direction)).increment(1);
}

pub fn record_refund(direction: Direction) {
    counter!("swap_refunds_total", "direction" => direction_label(direction)).increment(1);
}

pub fn record_burn(direction: Direction) {
    counter!("swap_burns_total", "direction" => direction_label(direction)).increment(1);
}
