use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Chart patterns the detector knows how to label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Breakout,
    HeadAndShoulders,
    Continuation,
    Retest,
    Fakeout,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Breakout,
        PatternKind::HeadAndShoulders,
        PatternKind::Continuation,
        PatternKind::Retest,
        PatternKind::Fakeout,
    ];

    /// Wire label, as used in the `pattern` query parameter.
    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::Breakout => "breakout",
            PatternKind::HeadAndShoulders => "head_and_shoulders",
            PatternKind::Continuation => "continuation",
            PatternKind::Retest => "retest",
            PatternKind::Fakeout => "fakeout",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PatternKind::Breakout => "Breakout Pattern",
            PatternKind::HeadAndShoulders => "Head & Shoulders",
            PatternKind::Continuation => "Continuation Pattern",
            PatternKind::Retest => "Retest Pattern",
            PatternKind::Fakeout => "Fakeout Pattern",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PatternKind::Breakout => "Stock breaks through resistance level",
            PatternKind::HeadAndShoulders => "Reversal pattern formation",
            PatternKind::Continuation => "Trend continues after pause",
            PatternKind::Retest => "Price returns to test support/resistance",
            PatternKind::Fakeout => "False breakout signal",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        PatternKind::ALL.into_iter().find(|k| k.label() == label)
    }
}

/// Pattern attached to an event. Missing or unrecognised labels become `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Pattern {
    Known(PatternKind),
    #[default]
    Unknown,
}

impl Pattern {
    pub const UNKNOWN_LABEL: &'static str = "unknown";

    pub fn label(&self) -> &'static str {
        match self {
            Pattern::Known(kind) => kind.label(),
            Pattern::Unknown => Self::UNKNOWN_LABEL,
        }
    }

    pub fn from_label(label: &str) -> Self {
        PatternKind::from_label(label)
            .map(Pattern::Known)
            .unwrap_or(Pattern::Unknown)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .map(Pattern::from_label)
            .unwrap_or(Pattern::Unknown))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// A detected chart event over a short price window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub id: String,
    #[serde(default)]
    pub pattern: Pattern,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_direction: Option<Direction>,
    pub move_percent: f64,
    pub high: f64,
    pub low: f64,
}

impl EventItem {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// True when the realized direction agrees with the predicted one.
    pub fn direction_matched(&self) -> bool {
        self.expected_direction == Some(self.direction)
    }
}

/// OHLC bar as returned by the Polygon aggregates endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Candle {
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v", default)]
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        self.close - self.open
    }
}
