//! Process-wide Prometheus metrics, registered in the default registry on
//! first use.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, TextEncoder};

pub static SIMULATIONS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("aegis_simulations_created_total", "Total simulations created")
        .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static SIMULATIONS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "aegis_simulations_completed_total",
        "Total simulations that reached full progress",
    )
    .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static SIMULATION_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("aegis_simulation_events_total", "Simulation events appended"),
        &["severity"],
    )
    .expect("valid metric definition");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static ACTIVE_DRIVERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("aegis_active_drivers", "Phase driver tasks currently alive")
        .expect("valid metric definition");
    prometheus::register(Box::new(g.clone())).expect("metric registered once");
    g
});

/// Build info: one series per running version, always 1.
pub static VERSION_INFO: Lazy<IntGaugeVec> = Lazy::new(|| {
    let g = IntGaugeVec::new(
        Opts::new("aegis_version", "Running server version"),
        &["version"],
    )
    .expect("valid metric definition");
    prometheus::register(Box::new(g.clone())).expect("metric registered once");
    g
});

/// Forces registration so `/metrics` lists every series from the start.
pub fn init() {
    VERSION_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1);
    let _ = &*SIMULATIONS_CREATED;
    let _ = &*SIMULATIONS_COMPLETED;
    let _ = &*SIMULATION_EVENTS;
    let _ = &*ACTIVE_DRIVERS;
}

/// Default registry in the Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_registered_series() {
        init();
        SIMULATION_EVENTS.with_label_values(&["info"]).inc();
        let text = render().unwrap();
        assert!(text.contains("aegis_simulations_created_total"));
        assert!(text.contains("aegis_simulation_events_total"));
        assert!(text.contains("aegis_active_drivers"));
        let version = format!("aegis_version{{version=\"{}\"}} 1", env!("CARGO_PKG_VERSION"));
        assert!(text.contains(&version), "{text}");
    }
}
