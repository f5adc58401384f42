use crate::models::{Candle, DataQuality, Timeframe};
use chrono::{DateTime, Duration, Utc};

/// Two consecutive candles further apart than the timeframe allows.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGap {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
    pub gap_minutes: f64,
    pub expected_minutes: f64,
}

impl DataGap {
    pub fn describe(&self) -> String {
        format!(
            "Data gap of {} minutes between {} and {} (expected {} minutes)",
            self.gap_minutes,
            self.after.to_rfc3339(),
            self.before.to_rfc3339(),
            self.expected_minutes
        )
    }
}

pub fn detect_gap(
    previous: &Candle,
    current: &Candle,
    timeframe: Timeframe,
    multiplier: f64,
) -> Option<DataGap> {
    let delta = current.timestamp - previous.timestamp;
    let expected = timeframe.expected_interval();
    let delta_minutes = minutes(delta);
    let expected_minutes = minutes(expected);
    if delta_minutes > expected_minutes * multiplier {
        Some(DataGap {
            after: previous.timestamp,
            before: current.timestamp,
            gap_minutes: delta_minutes,
            expected_minutes,
        })
    } else {
        None
    }
}

/// Scores how completely `candles` cover `[start, end]` at the timeframe's
/// resolution. Duplicate timestamps count once.
pub fn assess_data_quality(
    candles: &[Candle],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeframe: Timeframe,
) -> DataQuality {
    if end <= start {
        return DataQuality::new(0.0);
    }

    let mut observed = 0usize;
    let mut last_seen: Option<DateTime<Utc>> = None;
    for candle in candles
        .iter()
        .filter(|c| c.timestamp >= start && c.timestamp <= end)
    {
        if last_seen != Some(candle.timestamp) {
            observed += 1;
            last_seen = Some(candle.timestamp);
        }
    }

    let interval_ms = timeframe.expected_interval().num_milliseconds() as f64;
    let window_ms = (end - start).num_milliseconds() as f64;
    let expected = (window_ms / interval_ms).ceil().max(1.0);
    let score = (observed as f64 / expected * 100.0).min(100.0);
    DataQuality::new(score)
}

pub(crate) fn minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}
