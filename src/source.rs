use crate::detector::{detect_events, DetectorConfig};
use crate::error::SourceError;
use crate::polygon::{CandleRequest, PolygonClient};
use crate::types::EventItem;
use async_trait::async_trait;
use tracing::info;

/// Supplies freshly detected events for each analysis.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<EventItem>, SourceError>;
}

/// Pulls candles from Polygon and runs them through the detector.
pub struct PolygonEventSource {
    client: PolygonClient,
    request: CandleRequest,
    detector: DetectorConfig,
}

impl PolygonEventSource {
    pub fn new(client: PolygonClient, request: CandleRequest, detector: DetectorConfig) -> Self {
        Self {
            client,
            request,
            detector,
        }
    }
}

#[async_trait]
impl EventSource for PolygonEventSource {
    async fn fetch_events(&self) -> Result<Vec<EventItem>, SourceError> {
        let candles = self.client.fetch_candles(&self.request).await?;
        let events = detect_events(&self.request.ticker, &candles, &self.detector);
        info!(
            ticker = %self.request.ticker,
            candles = candles.len(),
            events = events.len(),
            "events ready"
        );
        Ok(events)
    }
}

/// Fixed, in-memory event list, e.g. loaded once from a JSON file.
pub struct StaticEventSource {
    events: Vec<EventItem>,
}

impl StaticEventSource {
    pub fn new(events: Vec<EventItem>) -> Self {
        Self { events }
    }

    /// Parses a JSON array of events in the camelCase wire format.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn fetch_events(&self) -> Result<Vec<EventItem>, SourceError> {
        Ok(self.events.clone())
    }
}
