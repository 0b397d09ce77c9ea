use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};

/// Total `/analyze-event` requests received.
pub static ANALYZE_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("analyze_requests_total", "Total analyze-event requests").unwrap()
});

/// Requests that failed because the event source errored.
pub static ANALYZE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "analyze_failures_total",
        "Analyze-event requests failed by the event source"
    )
    .unwrap()
});

/// Events that survived filtering and were aggregated.
pub static EVENTS_ANALYZED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("events_analyzed_total", "Total events aggregated").unwrap()
});

/// Candles pulled from the market data provider.
pub static CANDLES_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("candles_fetched_total", "Total candles fetched from provider").unwrap()
});

/// End-to-end analyze latency in seconds, fetch included.
pub static ANALYZE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "analyze_latency_seconds",
        "Analyze-event latency in seconds"
    )
    .unwrap()
});

/// Renders the default registry in the Prometheus text format.
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}
