use anyhow::{anyhow, Result};
use std::collections::HashMap;

pub const DEFAULT_MIN_DATA_QUALITY: f64 = 70.0;
pub const DEFAULT_ALLOCATION_TOLERANCE: f64 = 0.01;
pub const DEFAULT_GAP_MULTIPLIER: f64 = 2.0;

pub const MIN_DATA_QUALITY_KEY: &str = "BACKTEST_MIN_DATA_QUALITY";
pub const ALLOCATION_TOLERANCE_KEY: &str = "BACKTEST_ALLOCATION_TOLERANCE";
pub const GAP_MULTIPLIER_KEY: &str = "BACKTEST_GAP_MULTIPLIER";

/// Thresholds applied by the validator, the quality gate and gap detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktestSettings {
    /// Scores below this never reach the chronological scan.
    pub min_data_quality: f64,
    pub allocation_tolerance: f64,
    /// A gap is reported when consecutive candles are further apart than
    /// this many expected intervals.
    pub gap_multiplier: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            min_data_quality: DEFAULT_MIN_DATA_QUALITY,
            allocation_tolerance: DEFAULT_ALLOCATION_TOLERANCE,
            gap_multiplier: DEFAULT_GAP_MULTIPLIER,
        }
    }
}

impl BacktestSettings {
    /// Missing or blank keys fall back to defaults; present keys must parse
    /// and fall inside their range.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let min_data_quality = optional_setting_f64(
            settings,
            MIN_DATA_QUALITY_KEY,
            DEFAULT_MIN_DATA_QUALITY,
            Some(0.0),
            Some(100.0),
        )?;
        let allocation_tolerance = optional_setting_f64(
            settings,
            ALLOCATION_TOLERANCE_KEY,
            DEFAULT_ALLOCATION_TOLERANCE,
            Some(0.0),
            Some(1.0),
        )?;
        let gap_multiplier = optional_setting_f64(
            settings,
            GAP_MULTIPLIER_KEY,
            DEFAULT_GAP_MULTIPLIER,
            Some(1.0),
            None,
        )?;

        Ok(Self {
            min_data_quality,
            allocation_tolerance,
            gap_multiplier,
        })
    }

    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("BACKTEST_"))
            .collect();
        Self::from_settings_map(&settings)
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn optional_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    default: f64,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<f64> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(default);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(anyhow!(
                "Setting {} must be >= {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(value)
}
