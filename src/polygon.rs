use crate::error::SourceError;
use crate::metrics::CANDLES_FETCHED;
use crate::types::Candle;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// What to ask the aggregates endpoint for.
#[derive(Clone, Debug)]
pub struct CandleRequest {
    pub ticker: String,
    pub multiplier: u32,
    pub timespan: String,
    pub lookback_days: u64,
    pub limit: u32,
}

impl Default for CandleRequest {
    fn default() -> Self {
        Self {
            ticker: "AAPL".into(),
            multiplier: 5,
            timespan: "minute".into(),
            lookback_days: 5,
            limit: 5000,
        }
    }
}

impl CandleRequest {
    /// Inclusive `(from, to)` date window ending at `today`.
    pub fn date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let from = today
            .checked_sub_days(Days::new(self.lookback_days))
            .unwrap_or(today);
        (from, today)
    }

    pub fn url(&self, base_url: &str, from: NaiveDate, to: NaiveDate) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.ticker,
            self.multiplier,
            self.timespan,
            from,
            to
        )
    }
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Option<Vec<Candle>>,
}

/// Decodes an aggregates body. A missing `results` array means no bars.
pub fn parse_aggregates(body: &str) -> Result<Vec<Candle>, SourceError> {
    let response: AggregatesResponse = serde_json::from_str(body)?;
    match response.status.as_deref() {
        Some("ERROR") | Some("NOT_AUTHORIZED") => {
            let detail = response
                .error
                .or(response.message)
                .unwrap_or_else(|| "unknown error".to_string());
            Err(SourceError::Api(detail))
        }
        _ => Ok(response.results.unwrap_or_default()),
    }
}

/// Client for the Polygon.io aggregates (bars) REST endpoint.
#[derive(Clone)]
pub struct PolygonClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PolygonClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    /// Fetches bars oldest-first for the configured window.
    #[tracing::instrument(
        name = "polygon_fetch",
        skip(self, request),
        fields(ticker = %request.ticker, timespan = %request.timespan)
    )]
    pub async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Candle>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SourceError::MissingApiKey)?;

        let (from, to) = request.date_range(Utc::now().date_naive());
        let url = request.url(&self.base_url, from, to);
        let limit = request.limit.to_string();

        // strip the URL from transport errors, it carries the API key
        let response = self
            .client
            .get(&url)
            .query(&[
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", limit.as_str()),
                ("apiKey", api_key),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(e.without_url()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "polygon returned non-success status");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let candles = parse_aggregates(&body)?;
        CANDLES_FETCHED.inc_by(candles.len() as u64);
        info!(%from, %to, candles = candles.len(), "fetched candles");
        Ok(candles)
    }
}
