mod aggregator;
mod config;
mod detector;
mod error;
mod metrics;
mod polygon;
mod routes;
mod source;
mod types;

use anyhow::Context;
use clap::Parser;
use config::Opt;
use polygon::PolygonClient;
use source::{EventSource, PolygonEventSource, StaticEventSource};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

/// Structured logging, optionally exported to Jaeger through OpenTelemetry.
fn init_tracing(jaeger: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    if jaeger {
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name("event_stats_service")
            .install_simple()?;
        let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
        subscriber.with(telemetry).init();
    } else {
        subscriber.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let opt = Opt::parse();
    init_tracing(opt.jaeger)?;
    opt.display();

    let source: Arc<dyn EventSource> = match &opt.events_file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read events file {}", path.display()))?;
            let source = StaticEventSource::from_json(&json)?;
            info!(events = source.len(), "loaded events from file");
            Arc::new(source)
        }
        None => {
            let client = PolygonClient::new(
                &opt.polygon_url,
                opt.polygon_api_key.clone(),
                opt.http_timeout(),
            )?;
            Arc::new(PolygonEventSource::new(
                client,
                opt.candle_request(),
                opt.detector(),
            ))
        }
    };

    let (addr, server) = warp::serve(routes::routes(source))
        .try_bind_with_graceful_shutdown(opt.listen_addr(), async {
            let _ = tokio::signal::ctrl_c().await;
        })?;
    info!(%addr, "listening");

    server.await;
    info!("shut down");

    if opt.jaeger {
        opentelemetry::global::shutdown_tracer_provider();
    }
    Ok(())
}
