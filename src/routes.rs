use crate::aggregator::analyze_events;
use crate::metrics::{self, ANALYZE_FAILURES, ANALYZE_LATENCY, ANALYZE_REQUESTS, EVENTS_ANALYZED};
use crate::source::EventSource;
use crate::types::PatternKind;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Body returned on any collaborator failure. Internal detail stays in the logs.
pub const ANALYZE_FAILURE_MESSAGE: &str = "Failed to analyze events";

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Pattern label, `all`, or absent.
    pub pattern: Option<String>,
    /// Reserved for fundamental-event filtering; accepted and ignored.
    pub category: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[derive(Serialize)]
struct PatternInfo {
    value: &'static str,
    label: &'static str,
    description: &'static str,
}

fn with_source(
    source: Arc<dyn EventSource>,
) -> impl Filter<Extract = (Arc<dyn EventSource>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&source))
}

async fn analyze_event(
    query: AnalyzeQuery,
    source: Arc<dyn EventSource>,
) -> Result<Response, Infallible> {
    ANALYZE_REQUESTS.inc();
    let timer = ANALYZE_LATENCY.start_timer();

    if let Some(category) = query.category.as_deref() {
        debug!(category, "category filter is reserved, ignoring");
    }

    let response = match source.fetch_events().await {
        Ok(events) => {
            let result = analyze_events(&events, query.pattern.as_deref());
            EVENTS_ANALYZED.inc_by(result.count as u64);
            warp::reply::json(&result).into_response()
        }
        Err(err) => {
            ANALYZE_FAILURES.inc();
            error!(error = %err, "analyze event failed");
            warp::reply::with_status(
                warp::reply::json(&ErrorBody {
                    error: ANALYZE_FAILURE_MESSAGE,
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    };

    timer.observe_duration();
    Ok(response)
}

fn list_patterns() -> Response {
    let patterns: Vec<PatternInfo> = PatternKind::ALL
        .iter()
        .map(|kind| PatternInfo {
            value: kind.label(),
            label: kind.display_name(),
            description: kind.description(),
        })
        .collect();
    warp::reply::json(&patterns).into_response()
}

fn render_metrics() -> Response {
    match metrics::render() {
        Ok((content_type, body)) => {
            warp::reply::with_header(body, "content-type", content_type).into_response()
        }
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /analyze-event?pattern=..&category=..`
pub fn analyze(
    source: Arc<dyn EventSource>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("analyze-event")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<AnalyzeQuery>())
        .and(with_source(source))
        .and_then(analyze_event)
}

/// All HTTP routes served by the binary.
pub fn routes(
    source: Arc<dyn EventSource>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let patterns = warp::path("patterns")
        .and(warp::path::end())
        .and(warp::get())
        .map(list_patterns);
    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .map(render_metrics);
    let healthz = warp::path("healthz")
        .and(warp::path::end())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    analyze(source)
        .or(patterns)
        .or(metrics)
        .or(healthz)
        .with(warp::trace::request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::StaticEventSource;
    use crate::types::{Direction, EventItem, Pattern};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FailingSource;

    #[async_trait]
    impl EventSource for FailingSource {
        async fn fetch_events(&self) -> Result<Vec<EventItem>, SourceError> {
            Err(SourceError::Api("upstream secret detail".into()))
        }
    }

    fn sample_source() -> Arc<dyn EventSource> {
        let events = vec![
            EventItem {
                id: "a".into(),
                pattern: Pattern::Known(PatternKind::Breakout),
                direction: Direction::Up,
                expected_direction: Some(Direction::Up),
                move_percent: 2.5,
                high: 105.0,
                low: 100.0,
            },
            EventItem {
                id: "b".into(),
                pattern: Pattern::Known(PatternKind::Breakout),
                direction: Direction::Down,
                expected_direction: Some(Direction::Up),
                move_percent: -1.0,
                high: 102.0,
                low: 99.0,
            },
            EventItem {
                id: "c".into(),
                pattern: Pattern::Known(PatternKind::Retest),
                direction: Direction::Up,
                expected_direction: None,
                move_percent: 0.5,
                high: 101.0,
                low: 100.0,
            },
        ];
        Arc::new(StaticEventSource::new(events))
    }

    async fn get(source: Arc<dyn EventSource>, path: &str) -> (StatusCode, Value) {
        let res = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&routes(source))
            .await;
        let body = serde_json::from_slice(res.body()).unwrap_or(Value::Null);
        (res.status(), body)
    }

    #[tokio::test]
    async fn test_analyze_event_filters_by_pattern() {
        let (status, body) = get(sample_source(), "/analyze-event?pattern=breakout").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["averageMovePercent"], 0.75);
        assert_eq!(body["averageRange"], 4.0);
        assert_eq!(body["patternReliability"]["overall"], 50.0);
        assert_eq!(
            body["patternReliability"]["byPattern"]["breakout"],
            json!({"count": 2, "reliability": 50.0})
        );
        assert_eq!(body["eventsCountByPattern"], json!({"breakout": 2}));
    }

    #[tokio::test]
    async fn test_analyze_event_without_filter() {
        let (status, all) = get(sample_source(), "/analyze-event?pattern=all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["count"], 3);

        let (_, none) = get(sample_source(), "/analyze-event").await;
        assert_eq!(all, none);
    }

    #[tokio::test]
    async fn test_category_is_ignored() {
        let (_, plain) = get(sample_source(), "/analyze-event?pattern=retest").await;
        let (status, with_category) = get(
            sample_source(),
            "/analyze-event?pattern=retest&category=earnings",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plain, with_category);
        assert_eq!(plain["count"], 1);
    }

    #[tokio::test]
    async fn test_source_failure_is_generic_500() {
        let res = warp::test::request()
            .method("GET")
            .path("/analyze-event")
            .reply(&routes(Arc::new(FailingSource)))
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({"error": "Failed to analyze events"}));
        assert!(!String::from_utf8_lossy(res.body()).contains("secret"));
    }

    #[tokio::test]
    async fn test_repeated_calls_are_byte_identical() {
        let source = sample_source();
        let api = routes(source);
        let first = warp::test::request().path("/analyze-event").reply(&api).await;
        let second = warp::test::request().path("/analyze-event").reply(&api).await;
        assert_eq!(first.body(), second.body());
    }

    #[tokio::test]
    async fn test_patterns_listing() {
        let (status, body) = get(sample_source(), "/patterns").await;
        assert_eq!(status, StatusCode::OK);
        let values: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["value"].as_str().unwrap())
            .collect();
        assert_eq!(
            values,
            vec!["breakout", "head_and_shoulders", "continuation", "retest", "fakeout"]
        );
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let api = routes(sample_source());
        let res = warp::test::request().path("/healthz").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(&res.body()[..], b"OK");

        warp::test::request().path("/analyze-event").reply(&api).await;
        let res = warp::test::request().path("/metrics").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(String::from_utf8_lossy(res.body()).contains("analyze_requests_total"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let res = warp::test::request()
            .path("/nope")
            .reply(&routes(sample_source()))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
