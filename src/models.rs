use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Trade validity window and the candle resolution implied by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
        }
    }

    /// Spacing between two consecutive candles at this resolution.
    pub fn expected_interval(&self) -> Duration {
        match self {
            Timeframe::FifteenMinutes => Duration::minutes(15),
            Timeframe::OneHour => Duration::hours(1),
            Timeframe::FourHours => Duration::hours(4),
            Timeframe::OneDay => Duration::days(1),
            Timeframe::OneWeek => Duration::weeks(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "15m" => Ok(Timeframe::FifteenMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            "1d" => Ok(Timeframe::OneDay),
            "1w" => Ok(Timeframe::OneWeek),
            other => Err(anyhow!("Unknown timeframe '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetLevel {
    Tp1,
    Tp2,
    Tp3,
}

impl TargetLevel {
    pub const ALL: [TargetLevel; 3] = [TargetLevel::Tp1, TargetLevel::Tp2, TargetLevel::Tp3];

    pub fn label(&self) -> &'static str {
        match self {
            TargetLevel::Tp1 => "TP1",
            TargetLevel::Tp2 => "TP2",
            TargetLevel::Tp3 => "TP3",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TargetLevel::Tp1 => 0,
            TargetLevel::Tp2 => 1,
            TargetLevel::Tp3 => 2,
        }
    }
}

impl fmt::Display for TargetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeProfit {
    pub level: TargetLevel,
    pub price: f64,
    /// Percent of the position closed at this level.
    pub allocation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub symbol: String,
    pub entry_price: f64,
    pub tp1_price: f64,
    pub tp2_price: f64,
    pub tp3_price: f64,
    pub tp1_allocation: f64,
    pub tp2_allocation: f64,
    pub tp3_allocation: f64,
    pub stop_loss_price: f64,
    pub timeframe: Timeframe,
    pub timeframe_hours: f64,
    pub generated_at: DateTime<Utc>,
}

impl TradeSignal {
    pub fn take_profits(&self) -> [TakeProfit; 3] {
        [
            TakeProfit {
                level: TargetLevel::Tp1,
                price: self.tp1_price,
                allocation: self.tp1_allocation,
            },
            TakeProfit {
                level: TargetLevel::Tp2,
                price: self.tp2_price,
                allocation: self.tp2_allocation,
            },
            TakeProfit {
                level: TargetLevel::Tp3,
                price: self.tp3_price,
                allocation: self.tp3_allocation,
            },
        ]
    }

    pub fn total_allocation(&self) -> f64 {
        self.tp1_allocation + self.tp2_allocation + self.tp3_allocation
    }

    /// Length of the validity window. Only meaningful for validated signals.
    pub fn window_length(&self) -> Duration {
        let millis = (self.timeframe_hours * MILLIS_PER_HOUR).round();
        if millis.is_finite() && millis > 0.0 {
            Duration::milliseconds(millis as i64)
        } else {
            Duration::zero()
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.generated_at
            .checked_add_signed(self.window_length())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Completeness/continuity score (0-100) of a candle series for a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataQuality {
    pub score: f64,
}

impl DataQuality {
    pub fn new(score: f64) -> Self {
        Self { score }
    }

    /// NaN never passes.
    pub fn passes(&self, minimum: f64) -> bool {
        self.score.is_finite() && self.score >= minimum
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestStatus {
    CompletedSuccess,
    CompletedFailure,
    Expired,
    IncompleteData,
}

impl BacktestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BacktestStatus::CompletedSuccess => "completed_success",
            BacktestStatus::CompletedFailure => "completed_failure",
            BacktestStatus::Expired => "expired",
            BacktestStatus::IncompleteData => "incomplete_data",
        }
    }
}

impl fmt::Display for BacktestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub status: BacktestStatus,
    pub tp1_hit: bool,
    pub tp1_hit_at: Option<DateTime<Utc>>,
    pub tp2_hit: bool,
    pub tp2_hit_at: Option<DateTime<Utc>>,
    pub tp3_hit: bool,
    pub tp3_hit_at: Option<DateTime<Utc>>,
    pub stop_loss_hit: bool,
    pub stop_loss_hit_at: Option<DateTime<Utc>>,
    pub profit_loss_usd: f64,
    pub profit_loss_percentage: f64,
    pub trade_duration_minutes: f64,
    pub data_quality_score: f64,
    /// Percent of the position not closed by a take-profit: closed at the
    /// stop, or still open when the window ended.
    pub remaining_allocation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_message: Option<String>,
}

impl BacktestResult {
    pub fn incomplete(error_message: impl Into<String>, data_quality_score: f64) -> Self {
        Self {
            status: BacktestStatus::IncompleteData,
            tp1_hit: false,
            tp1_hit_at: None,
            tp2_hit: false,
            tp2_hit_at: None,
            tp3_hit: false,
            tp3_hit_at: None,
            stop_loss_hit: false,
            stop_loss_hit_at: None,
            profit_loss_usd: 0.0,
            profit_loss_percentage: 0.0,
            trade_duration_minutes: 0.0,
            data_quality_score,
            remaining_allocation: 100.0,
            error_message: Some(error_message.into()),
            warning_message: None,
        }
    }
}
