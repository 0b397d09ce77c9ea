use crate::types::{Candle, Direction, EventItem, Pattern, PatternKind};
use tracing::debug;

/// Tuning for the rule-based pattern classifier.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    /// Bars before the signal bar used for support/resistance.
    pub lookback: usize,
    /// Bars after the signal bar over which the outcome is measured.
    pub horizon: usize,
    /// Max distance from the broken level, as a fraction, for a retest.
    pub retest_tolerance: f64,
    /// Max shoulder height mismatch, as a fraction of the head.
    pub shoulder_tolerance: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lookback: 5,
            horizon: 3,
            retest_tolerance: 0.002,
            shoulder_tolerance: 0.01,
        }
    }
}

/// Highest high and lowest low of `bars`.
fn bounds(bars: &[Candle]) -> (f64, f64) {
    bars.iter().fold((f64::MIN, f64::MAX), |(hi, lo), c| {
        (hi.max(c.high), lo.min(c.low))
    })
}

fn within(value: f64, level: f64, tolerance: f64) -> bool {
    (value - level).abs() <= level.abs() * tolerance
}

fn retest(candles: &[Candle], i: usize, config: &DetectorConfig) -> Option<Direction> {
    if i < config.lookback + 1 {
        return None;
    }
    let prev = &candles[i - 1];
    let (resistance, support) = bounds(&candles[i - 1 - config.lookback..i - 1]);
    let c = &candles[i];

    if prev.close > resistance
        && within(c.low, resistance, config.retest_tolerance)
        && c.close > resistance
    {
        return Some(Direction::Up);
    }
    if prev.close < support
        && within(c.high, support, config.retest_tolerance)
        && c.close < support
    {
        return Some(Direction::Down);
    }
    None
}

fn head_and_shoulders(candles: &[Candle], i: usize, config: &DetectorConfig) -> bool {
    if config.lookback < 3 {
        return false;
    }
    let window = &candles[i + 1 - config.lookback..=i];
    let mid = window.len() / 2;
    let head = window[mid].high;
    let left = window[0].high;
    let right = window[window.len() - 1].high;

    let head_is_peak = window
        .iter()
        .enumerate()
        .all(|(j, c)| j == mid || c.high < head);

    head_is_peak && (left - right).abs() <= head * config.shoulder_tolerance
}

/// Labels the bar at `i` with a pattern and the direction that pattern predicts.
fn classify(
    candles: &[Candle],
    i: usize,
    config: &DetectorConfig,
) -> Option<(PatternKind, Direction)> {
    let prior = &candles[i - config.lookback..i];
    let (resistance, support) = bounds(prior);
    let c = &candles[i];

    if c.high > resistance && c.close <= resistance {
        return Some((PatternKind::Fakeout, Direction::Down));
    }
    if c.low < support && c.close >= support {
        return Some((PatternKind::Fakeout, Direction::Up));
    }
    if c.close > resistance {
        return Some((PatternKind::Breakout, Direction::Up));
    }
    if c.close < support {
        return Some((PatternKind::Breakout, Direction::Down));
    }
    if let Some(direction) = retest(candles, i, config) {
        return Some((PatternKind::Retest, direction));
    }
    if head_and_shoulders(candles, i, config) {
        return Some((PatternKind::HeadAndShoulders, Direction::Down));
    }

    let net = prior[prior.len() - 1].close - prior[0].open;
    let body = c.body();
    if net > 0.0 && body > 0.0 {
        Some((PatternKind::Continuation, Direction::Up))
    } else if net < 0.0 && body < 0.0 {
        Some((PatternKind::Continuation, Direction::Down))
    } else {
        None
    }
}

/// Scans oldest-first `candles` and emits one event per classified bar.
///
/// Each event's outcome covers the signal bar and the following `horizon` bars,
/// so the last `horizon` bars never produce an event.
pub fn detect_events(ticker: &str, candles: &[Candle], config: &DetectorConfig) -> Vec<EventItem> {
    if config.lookback == 0
        || config.horizon == 0
        || candles.len() <= config.lookback + config.horizon
    {
        return Vec::new();
    }

    let mut events = Vec::new();
    for i in config.lookback..candles.len() - config.horizon {
        let Some((kind, expected)) = classify(candles, i, config) else {
            continue;
        };

        let entry = candles[i].close;
        let exit = candles[i + config.horizon].close;
        let move_percent = if entry > 0.0 {
            (exit - entry) / entry * 100.0
        } else {
            0.0
        };
        let direction = if move_percent >= 0.0 {
            Direction::Up
        } else {
            Direction::Down
        };

        let window = &candles[i..=i + config.horizon];
        let high = window
            .iter()
            .flat_map(|c| [c.high, c.low])
            .fold(f64::MIN, f64::max);
        let low = window
            .iter()
            .flat_map(|c| [c.high, c.low])
            .fold(f64::MAX, f64::min);

        events.push(EventItem {
            id: format!("{}-{}", ticker, candles[i].timestamp),
            pattern: Pattern::Known(kind),
            direction,
            expected_direction: Some(expected),
            move_percent,
            high,
            low,
        });
    }

    debug!(ticker, candles = candles.len(), events = events.len(), "detected events");
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(idx: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: idx * 300_000,
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    fn flat(n: i64) -> Vec<Candle> {
        (0..n).map(|i| candle(i, 10.0, 10.5, 9.5, 10.0)).collect()
    }

    fn follow(candles: &mut Vec<Candle>, closes: &[f64]) {
        for close in closes {
            let idx = candles.len() as i64;
            let open = candles[candles.len() - 1].close;
            candles.push(candle(idx, open, close + 0.1, close - 0.1, *close));
        }
    }

    fn event_at(events: &[EventItem], idx: i64) -> &EventItem {
        let id = format!("TEST-{}", idx * 300_000);
        events.iter().find(|e| e.id == id).expect("no event at index")
    }

    #[test]
    fn test_breakout_up() {
        let mut candles = flat(5);
        candles.push(candle(5, 10.0, 11.2, 10.0, 11.0));
        follow(&mut candles, &[11.5, 12.0, 12.5]);

        let events = detect_events("TEST", &candles, &DetectorConfig::default());
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.pattern, Pattern::Known(PatternKind::Breakout));
        assert_eq!(e.expected_direction, Some(Direction::Up));
        assert_eq!(e.direction, Direction::Up);
        assert!((e.move_percent - (12.5 - 11.0) / 11.0 * 100.0).abs() < 1e-9);
        assert!((e.high - 12.6).abs() < 1e-9);
        assert_eq!(e.low, 10.0);
    }

    #[test]
    fn test_fakeout_reverses() {
        let mut candles = flat(5);
        candles.push(candle(5, 10.0, 11.0, 9.8, 10.2));
        follow(&mut candles, &[9.8, 9.6, 9.4]);

        let events = detect_events("TEST", &candles, &DetectorConfig::default());
        let e = event_at(&events, 5);
        assert_eq!(e.pattern, Pattern::Known(PatternKind::Fakeout));
        assert_eq!(e.expected_direction, Some(Direction::Down));
        assert_eq!(e.direction, Direction::Down);
        assert!(e.direction_matched());
    }

    #[test]
    fn test_retest_after_breakout() {
        let mut candles = flat(5);
        candles.push(candle(5, 10.0, 11.2, 10.4, 11.0));
        candles.push(candle(6, 10.9, 11.0, 10.5, 10.8));
        follow(&mut candles, &[11.0, 11.3, 11.6]);

        let events = detect_events("TEST", &candles, &DetectorConfig::default());
        assert_eq!(
            event_at(&events, 5).pattern,
            Pattern::Known(PatternKind::Breakout)
        );
        let e = event_at(&events, 6);
        assert_eq!(e.pattern, Pattern::Known(PatternKind::Retest));
        assert_eq!(e.expected_direction, Some(Direction::Up));
    }

    #[test]
    fn test_head_and_shoulders() {
        let mut candles = vec![
            candle(0, 10.2, 10.5, 10.0, 10.3),
            candle(1, 10.3, 10.8, 10.0, 10.5),
            candle(2, 10.5, 11.0, 10.0, 10.8),
            candle(3, 10.8, 11.5, 10.0, 11.0),
            candle(4, 11.0, 11.0, 10.0, 10.6),
            candle(5, 10.6, 10.82, 10.1, 10.3),
        ];
        follow(&mut candles, &[10.1, 9.9, 9.7]);

        let events = detect_events("TEST", &candles, &DetectorConfig::default());
        let e = event_at(&events, 5);
        assert_eq!(e.pattern, Pattern::Known(PatternKind::HeadAndShoulders));
        assert_eq!(e.expected_direction, Some(Direction::Down));
        assert_eq!(e.direction, Direction::Down);
    }

    #[test]
    fn test_continuation() {
        let mut candles = vec![
            candle(0, 10.0, 11.0, 9.9, 10.1),
            candle(1, 10.1, 10.4, 10.0, 10.3),
            candle(2, 10.3, 10.5, 10.2, 10.4),
            candle(3, 10.4, 10.6, 10.3, 10.5),
            candle(4, 10.5, 10.7, 10.4, 10.6),
            candle(5, 10.6, 10.8, 10.5, 10.75),
        ];
        follow(&mut candles, &[10.8, 10.9, 11.0]);

        let events = detect_events("TEST", &candles, &DetectorConfig::default());
        let e = event_at(&events, 5);
        assert_eq!(e.pattern, Pattern::Known(PatternKind::Continuation));
        assert_eq!(e.expected_direction, Some(Direction::Up));
    }

    #[test]
    fn test_quiet_market_has_no_events() {
        let events = detect_events("TEST", &flat(20), &DetectorConfig::default());
        assert!(events.is_empty());
    }

    #[test]
    fn test_too_few_candles() {
        let config = DetectorConfig::default();
        assert!(detect_events("TEST", &flat(8), &config).is_empty());
        assert!(detect_events("TEST", &[], &config).is_empty());

        let zero = DetectorConfig {
            lookback: 0,
            ..config
        };
        assert!(detect_events("TEST", &flat(20), &zero).is_empty());
    }

    #[test]
    fn test_events_keep_range_invariant() {
        let mut candles = flat(5);
        candles.push(candle(5, 10.0, 11.2, 10.4, 11.0));
        candles.push(candle(6, 10.9, 11.0, 10.5, 10.8));
        // malformed bar with high < low must not break the invariant
        candles.push(candle(7, 10.8, 10.0, 11.0, 10.9));
        follow(&mut candles, &[9.0, 8.5, 12.0, 12.5, 12.1]);

        let events = detect_events("TEST", &candles, &DetectorConfig::default());
        assert!(!events.is_empty());
        for e in &events {
            assert!(e.high >= e.low, "{} has high < low", e.id);
            assert!(e.expected_direction.is_some());
        }
    }
}
