use crate::types::{Direction, EventItem, Pattern};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

/// Filter value that disables pattern filtering.
pub const ALL_PATTERNS: &str = "all";

/// Fixed scoring weights reported with every analysis.
pub const WEIGHTS: Weights = Weights {
    avg_move: 0.4,
    avg_range: 0.3,
    pattern_reliability: 0.3,
    explanation: "Weights indicate relative importance when combining metrics into a composite score. Adjust as needed.",
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub avg_move: f64,
    pub avg_range: f64,
    pub pattern_reliability: f64,
    pub explanation: &'static str,
}

/// Small association keyed by pattern, kept in first-seen order.
///
/// Serializes as a JSON object whose keys are pattern labels.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMap<V> {
    entries: Vec<(Pattern, V)>,
}

impl<V> PatternMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the entry for `pattern`, appending `V::default()` on first sight.
    pub fn entry_or_default(&mut self, pattern: Pattern) -> &mut V
    where
        V: Default,
    {
        let idx = match self.entries.iter().position(|(p, _)| *p == pattern) {
            Some(idx) => idx,
            None => {
                self.entries.push((pattern, V::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    pub fn map_values<U>(&self, f: impl Fn(&V) -> U) -> PatternMap<U> {
        PatternMap {
            entries: self.entries.iter().map(|(p, v)| (*p, f(v))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
impl<V> PatternMap<V> {
    pub fn get(&self, pattern: &Pattern) -> Option<&V> {
        self.entries
            .iter()
            .find(|(p, _)| p == pattern)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pattern, &V)> {
        self.entries.iter().map(|(p, v)| (p, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Pattern> {
        self.entries.iter().map(|(p, _)| p)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for PatternMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for PatternMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (pattern, value) in &self.entries {
            map.serialize_entry(pattern.label(), value)?;
        }
        map.end()
    }
}

/// Per-pattern tally. `matches <= count` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternStat {
    pub count: usize,
    pub matches: usize,
}

impl PatternStat {
    pub fn reliability(&self) -> f64 {
        percentage(self.matches, self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternScore {
    pub count: usize,
    pub reliability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReliability {
    pub overall: f64,
    pub by_pattern: PatternMap<PatternScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveMetric {
    pub id: String,
    pub move_percent: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeMetric {
    pub id: String,
    pub range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMetrics {
    pub moves: Vec<MoveMetric>,
    pub ranges: Vec<RangeMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub count: usize,
    pub average_move_percent: f64,
    pub average_range: f64,
    pub pattern_reliability: PatternReliability,
    pub events_count_by_pattern: PatternMap<usize>,
    pub weights: Weights,
    pub raw_metrics: RawMetrics,
}

/// Rounds to `decimals` places with ties going away from zero, so
/// `0.125 -> 0.13` and `-0.125 -> -0.13`.
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    let magnitude = (value.abs() * factor + 0.5).floor() / factor;
    // avoid emitting -0.0
    if magnitude == 0.0 {
        0.0
    } else {
        magnitude.copysign(value)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_half_up(part as f64 / whole as f64 * 100.0, 2)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// True when `filter` selects `pattern`. `None`, `""` and `"all"` select everything.
pub fn matches_filter(pattern: &Pattern, filter: Option<&str>) -> bool {
    match filter {
        None | Some("") | Some(ALL_PATTERNS) => true,
        Some(label) => pattern.label() == label,
    }
}

/// Summarises `events` after applying the optional pattern filter.
///
/// Never fails: an empty selection produces zeroed averages and empty maps.
pub fn analyze_events(events: &[EventItem], pattern_filter: Option<&str>) -> AggregateResult {
    let selected: Vec<&EventItem> = events
        .iter()
        .filter(|e| matches_filter(&e.pattern, pattern_filter))
        .collect();
    let count = selected.len();

    let average_move = mean(selected.iter().map(|e| e.move_percent));
    let average_range = mean(selected.iter().map(|e| e.range()));

    let mut stats: PatternMap<PatternStat> = PatternMap::new();
    let mut total_matches = 0usize;
    for event in &selected {
        let stat = stats.entry_or_default(event.pattern);
        stat.count += 1;
        if event.direction_matched() {
            stat.matches += 1;
            total_matches += 1;
        }
    }

    let by_pattern = stats.map_values(|stat| PatternScore {
        count: stat.count,
        reliability: stat.reliability(),
    });

    let mut events_count_by_pattern: PatternMap<usize> = PatternMap::new();
    for event in &selected {
        *events_count_by_pattern.entry_or_default(event.pattern) += 1;
    }

    let raw_metrics = RawMetrics {
        moves: selected
            .iter()
            .map(|e| MoveMetric {
                id: e.id.clone(),
                move_percent: e.move_percent,
                direction: e.direction,
            })
            .collect(),
        ranges: selected
            .iter()
            .map(|e| RangeMetric {
                id: e.id.clone(),
                range: round_half_up(e.range(), 4),
            })
            .collect(),
    };

    let overall = percentage(total_matches, count);
    debug!(
        filter = pattern_filter.unwrap_or(ALL_PATTERNS),
        count,
        patterns = stats.len(),
        overall,
        "aggregated events"
    );

    AggregateResult {
        count,
        average_move_percent: round_half_up(average_move, 4),
        average_range: round_half_up(average_range, 4),
        pattern_reliability: PatternReliability {
            overall,
            by_pattern,
        },
        events_count_by_pattern,
        weights: WEIGHTS,
        raw_metrics,
    }
}
