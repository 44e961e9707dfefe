use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref HEARTBEATS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("deadman_heartbeats_total", "Heartbeats accepted per client"),
        &["client"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_TRIGGERED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "deadman_notifications_total",
            "Down notifications handed to the dispatcher per client"
        ),
        &["client"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATION_FAILURES: IntCounter = IntCounter::new(
        "deadman_notification_failures_total",
        "Notifications dropped because the sender failed"
    )
    .expect("metric can not be created");

    pub static ref CLIENT_DOWN: IntGaugeVec = IntGaugeVec::new(
        Opts::new("deadman_client_down", "1 while the client is considered down"),
        &["client"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(HEARTBEATS_RECEIVED.clone()),
        Box::new(NOTIFICATIONS_TRIGGERED.clone()),
        Box::new(NOTIFICATION_FAILURES.clone()),
        Box::new(CLIENT_DOWN.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Registers the watchdog metrics in [`REGISTRY`], once per process.
pub fn ensure_registered() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

pub(crate) fn encode(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

pub(crate) async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::with_header(
        encode(&registry),
        "Content-Type",
        prometheus::TEXT_FORMAT,
    ))
}
