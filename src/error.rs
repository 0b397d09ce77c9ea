use thiserror::Error;

/// Failures of the market-data collaborators feeding the aggregator.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("market data API error: {0}")]
    Api(String),

    #[error("failed to decode market data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("POLYGON_API_KEY is not configured")]
    MissingApiKey,
}
