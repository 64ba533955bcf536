//! Domain types shared across the hours crates.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HoursError;

/// Default first character of a timestamp line.
pub const DEFAULT_TIMESTAMP_MARKER: char = 'T';

/// Default first character of a content line.
pub const DEFAULT_CONTENT_MARKER: char = 'W';

/// Token separators inside a line: ASCII whitespace plus vertical tab.
/// Unicode spaces such as U+00A0 stay part of the token.
pub fn is_token_separator(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0B'
}

/// Split `line` into non-empty tokens on [`is_token_separator`].
pub fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(is_token_separator).filter(|t| !t.is_empty())
}

// ── HourBucket ────────────────────────────────────────────────────────────────

/// Two-character hour key, e.g. `"09"`, taken verbatim from a time token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourBucket(String);

impl HourBucket {
    /// Take the first two characters of a `HH:MM:SS`-style token.
    ///
    /// Returns `None` when the token is shorter than two characters.
    pub fn from_time_token(token: &str) -> Option<Self> {
        let hour: String = token.chars().take(2).collect();
        if hour.chars().count() < 2 {
            return None;
        }
        Some(Self(hour))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for HourBucket {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// One blank-line-delimited block of input lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    lines: Vec<String>,
}

impl Record {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Build a record from a raw text block, splitting on `\n`.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ── ParsedRecord ──────────────────────────────────────────────────────────────

/// What the parser learned from a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Candidate hour from a well-formed timestamp line, if any.
    pub hour: Option<HourBucket>,
    /// Set when a content line held the keyword as a whole token.
    pub contains_keyword: bool,
    /// Set when a timestamp line was seen but could not yield an hour.
    pub malformed_timestamp: bool,
}

impl ParsedRecord {
    /// The bucket this record contributes to, if any.
    pub fn emitted_hour(&self, filter_by_keyword: bool) -> Option<&HourBucket> {
        if filter_by_keyword && !self.contains_keyword {
            return None;
        }
        self.hour.as_ref()
    }
}

// ── AggregatorConfig ──────────────────────────────────────────────────────────

/// Selects between plain hourly counting and keyword-filtered counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub filter_by_keyword: bool,
    pub keyword: String,
    pub timestamp_marker: char,
    pub content_marker: char,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            filter_by_keyword: false,
            keyword: String::new(),
            timestamp_marker: DEFAULT_TIMESTAMP_MARKER,
            content_marker: DEFAULT_CONTENT_MARKER,
        }
    }
}

impl AggregatorConfig {
    /// Count every record that carries a timestamp.
    pub fn unfiltered() -> Self {
        Self::default()
    }

    /// Count only records whose content line contains `keyword` as a token.
    pub fn with_keyword(keyword: impl Into<String>) -> Self {
        Self {
            filter_by_keyword: true,
            keyword: keyword.into(),
            ..Self::default()
        }
    }
}

// ── Histogram ─────────────────────────────────────────────────────────────────

/// Count of emitted records per hour bucket, kept in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Histogram {
    counts: BTreeMap<HourBucket, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one emission for `hour`.
    pub fn increment(&mut self, hour: HourBucket) {
        self.add(hour, 1);
    }

    /// Add `count` to `hour`. Zero counts never create a bucket.
    pub fn add(&mut self, hour: HourBucket, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(hour).or_insert(0) += count;
    }

    /// Key-wise sum of two partial histograms.
    pub fn merge(mut self, other: Histogram) -> Histogram {
        if self.counts.len() < other.counts.len() {
            return other.merge(self);
        }
        for (hour, count) in other.counts {
            self.add(hour, count);
        }
        self
    }

    /// Count for `hour`, zero when unobserved.
    pub fn get(&self, hour: &str) -> u64 {
        self.counts.get(hour).copied().unwrap_or(0)
    }

    /// Sum of all bucket counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Buckets in ascending hour order.
    pub fn iter(&self) -> impl Iterator<Item = (&HourBucket, u64)> {
        self.counts.iter().map(|(hour, count)| (hour, *count))
    }
}

impl FromIterator<HourBucket> for Histogram {
    fn from_iter<I: IntoIterator<Item = HourBucket>>(iter: I) -> Self {
        let mut histogram = Histogram::new();
        histogram.extend(iter);
        histogram
    }
}

impl Extend<HourBucket> for Histogram {
    fn extend<I: IntoIterator<Item = HourBucket>>(&mut self, iter: I) {
        for hour in iter {
            self.increment(hour);
        }
    }
}

// ── OutputFormat ──────────────────────────────────────────────────────────────

/// Serialization used for the final histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `HH<TAB>count`, one bucket per line.
    #[default]
    Tsv,
    /// A single JSON object mapping hour to count.
    Json,
}

impl FromStr for OutputFormat {
    type Err = HoursError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tsv" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            other => Err(HoursError::Config(format!("unknown output format: {other}"))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tsv => f.write_str("tsv"),
            Self::Json => f.write_str("json"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
