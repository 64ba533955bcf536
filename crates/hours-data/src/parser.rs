//! Per-record parsing: hour extraction and keyword matching.

use hours_core::models::{tokens, AggregatorConfig, HourBucket, ParsedRecord, Record};

/// Parse one record under `config`.
///
/// Unfiltered counting stops at the first well-formed timestamp line, so the
/// first timestamp wins. Keyword-filtered counting keeps scanning until a
/// keyword match, so the last timestamp seen before the match wins. A
/// timestamp line that yields no hour is skipped and flagged as malformed.
pub fn parse_record(record: &Record, config: &AggregatorConfig) -> ParsedRecord {
    let mut parsed = ParsedRecord::default();

    for line in record.lines() {
        let Some(marker) = line.chars().next() else {
            continue;
        };

        if marker == config.timestamp_marker {
            match extract_hour(line) {
                Some(hour) => {
                    parsed.hour = Some(hour);
                    if !config.filter_by_keyword {
                        break;
                    }
                }
                None => parsed.malformed_timestamp = true,
            }
        } else if config.filter_by_keyword
            && marker == config.content_marker
            && contains_keyword(line, &config.keyword)
        {
            parsed.contains_keyword = true;
            break;
        }
    }

    parsed
}

/// Hour bucket from a timestamp line: the first two characters of its third
/// ASCII-whitespace-delimited token.
pub fn extract_hour(line: &str) -> Option<HourBucket> {
    tokens(line).nth(2).and_then(HourBucket::from_time_token)
}

/// Whole-token, case-sensitive keyword test.
pub fn contains_keyword(line: &str, keyword: &str) -> bool {
    tokens(line).any(|token| token == keyword)
}
