use crate::detector::DetectorConfig;
use crate::polygon::{CandleRequest, DEFAULT_BASE_URL};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "event_stats_service",
    about = "Historical chart-event statistics over HTTP"
)]
pub struct Opt {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// HTTP port
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// Polygon.io REST base URL
    #[arg(long, env = "POLYGON_URL", default_value = DEFAULT_BASE_URL)]
    pub polygon_url: String,
    /// Polygon.io API key
    #[arg(long, env = "POLYGON_API_KEY", hide_env_values = true)]
    pub polygon_api_key: Option<String>,
    /// Ticker to analyze
    #[arg(long, default_value = "AAPL")]
    pub ticker: String,
    /// Candle size multiplier (e.g. 5 with `minute` = 5-minute bars)
    #[arg(long, default_value_t = 5)]
    pub multiplier: u32,
    /// Candle timespan (minute, hour, day, ...)
    #[arg(long, default_value = "minute")]
    pub timespan: String,
    /// Days of history to fetch
    #[arg(long, default_value_t = 5)]
    pub lookback_days: u64,
    /// Max candles per request
    #[arg(long, default_value_t = 5000)]
    pub limit: u32,
    /// Bars used as support/resistance context
    #[arg(long, default_value_t = 5)]
    pub detector_lookback: usize,
    /// Bars over which an event's outcome is measured
    #[arg(long, default_value_t = 3)]
    pub horizon: usize,
    /// Upstream HTTP timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub http_timeout_secs: u64,
    /// Serve events from a JSON file instead of Polygon
    #[arg(long, env = "EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
    /// Export traces to a local Jaeger agent
    #[arg(long, default_value_t = false)]
    pub jaeger: bool,
}

impl Opt {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn candle_request(&self) -> CandleRequest {
        CandleRequest {
            ticker: self.ticker.to_uppercase(),
            multiplier: self.multiplier,
            timespan: self.timespan.clone(),
            lookback_days: self.lookback_days,
            limit: self.limit,
        }
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            lookback: self.detector_lookback,
            horizon: self.horizon,
            ..DetectorConfig::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn display(&self) {
        info!("event stats service config");
        info!("   listen: {}", self.listen_addr());
        match &self.events_file {
            Some(path) => info!("   source: file {}", path.display()),
            None => info!(
                "   source: polygon {} {}x{} over {} days (api key {})",
                self.ticker,
                self.multiplier,
                self.timespan,
                self.lookback_days,
                if self.polygon_api_key.is_some() { "set" } else { "MISSING" }
            ),
        }
        info!(
            "   detector: lookback={} horizon={}",
            self.detector_lookback, self.horizon
        );
    }
}
