use crate::config::BacktestSettings;
use crate::models::{TargetLevel, TradeSignal};
use thiserror::Error;

/// Upper bound on a trade's validity window (ten years).
pub const MAX_TIMEFRAME_HOURS: f64 = 87_600.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a positive number (got {value})")]
    NonPositivePrice { field: &'static str, value: f64 },
    #[error("Allocations must sum to 100% (got {total}%)")]
    AllocationSum { total: f64 },
    #[error("{level} allocation must be between 0% and 100% (got {value}%)")]
    AllocationOutOfRange { level: TargetLevel, value: f64 },
    #[error("{level} price ({price}) must be above {floor_label} ({floor})")]
    TargetOutOfOrder {
        level: TargetLevel,
        price: f64,
        floor_label: &'static str,
        floor: f64,
    },
    #[error("Stop loss price ({stop_loss}) must be below entry price ({entry})")]
    StopLossNotBelowEntry { stop_loss: f64, entry: f64 },
    #[error("Timeframe hours must be a positive number no greater than {max} (got {hours})")]
    InvalidTimeframeHours { hours: f64, max: f64 },
}

type Check = fn(&TradeSignal, &BacktestSettings) -> Result<(), ValidationError>;

/// Evaluated in order; the first failure is reported.
const CHECKS: [Check; 6] = [
    check_prices_positive,
    check_allocation_sum,
    check_allocation_ranges,
    check_target_order,
    check_stop_loss_below_entry,
    check_timeframe_hours,
];

pub fn validate(signal: &TradeSignal) -> Result<(), ValidationError> {
    validate_with(signal, &BacktestSettings::default())
}

pub fn validate_with(
    signal: &TradeSignal,
    settings: &BacktestSettings,
) -> Result<(), ValidationError> {
    CHECKS.iter().try_for_each(|check| check(signal, settings))
}

fn check_prices_positive(signal: &TradeSignal, _: &BacktestSettings) -> Result<(), ValidationError> {
    let prices = [
        ("Entry price", signal.entry_price),
        ("TP1 price", signal.tp1_price),
        ("TP2 price", signal.tp2_price),
        ("TP3 price", signal.tp3_price),
        ("Stop loss price", signal.stop_loss_price),
    ];
    match prices
        .iter()
        .find(|(_, value)| !(value.is_finite() && *value > 0.0))
    {
        Some(&(field, value)) => Err(ValidationError::NonPositivePrice { field, value }),
        None => Ok(()),
    }
}

fn check_allocation_sum(
    signal: &TradeSignal,
    settings: &BacktestSettings,
) -> Result<(), ValidationError> {
    let total = signal.total_allocation();
    if (total - 100.0).abs() <= settings.allocation_tolerance {
        Ok(())
    } else {
        Err(ValidationError::AllocationSum { total })
    }
}

fn check_allocation_ranges(
    signal: &TradeSignal,
    _: &BacktestSettings,
) -> Result<(), ValidationError> {
    for target in signal.take_profits() {
        if !(target.allocation.is_finite() && (0.0..=100.0).contains(&target.allocation)) {
            return Err(ValidationError::AllocationOutOfRange {
                level: target.level,
                value: target.allocation,
            });
        }
    }
    Ok(())
}

fn check_target_order(signal: &TradeSignal, _: &BacktestSettings) -> Result<(), ValidationError> {
    let mut floor_label = "entry price";
    let mut floor = signal.entry_price;
    for target in signal.take_profits() {
        if target.price <= floor {
            return Err(ValidationError::TargetOutOfOrder {
                level: target.level,
                price: target.price,
                floor_label,
                floor,
            });
        }
        floor_label = target.level.label();
        floor = target.price;
    }
    Ok(())
}

fn check_stop_loss_below_entry(
    signal: &TradeSignal,
    _: &BacktestSettings,
) -> Result<(), ValidationError> {
    if signal.stop_loss_price < signal.entry_price {
        Ok(())
    } else {
        Err(ValidationError::StopLossNotBelowEntry {
            stop_loss: signal.stop_loss_price,
            entry: signal.entry_price,
        })
    }
}

fn check_timeframe_hours(
    signal: &TradeSignal,
    _: &BacktestSettings,
) -> Result<(), ValidationError> {
    let hours = signal.timeframe_hours;
    if hours.is_finite() && hours > 0.0 && hours <= MAX_TIMEFRAME_HOURS {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimeframeHours {
            hours,
            max: MAX_TIMEFRAME_HOURS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;
    use chrono::{TimeZone, Utc};

    fn signal() -> TradeSignal {
        TradeSignal {
            symbol: "BTC".to_string(),
            entry_price: 100_000.0,
            tp1_price: 102_000.0,
            tp2_price: 104_000.0,
            tp3_price: 106_000.0,
            tp1_allocation: 30.0,
            tp2_allocation: 40.0,
            tp3_allocation: 30.0,
            stop_loss_price: 98_000.0,
            timeframe: Timeframe::OneHour,
            timeframe_hours: 24.0,
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn accepts_well_formed_signal() {
        assert_eq!(validate(&signal()), Ok(()));
    }

    #[test]
    fn rejects_non_positive_and_non_finite_prices() {
        let mut s = signal();
        s.tp2_price = 0.0;
        assert_eq!(
            validate(&s).unwrap_err().to_string(),
            "TP2 price must be a positive number (got 0)"
        );

        let mut s = signal();
        s.stop_loss_price = f64::NAN;
        assert!(matches!(
            validate(&s),
            Err(ValidationError::NonPositivePrice {
                field: "Stop loss price",
                ..
            })
        ));
    }

    #[test]
    fn allocation_sum_message_names_actual_total() {
        let mut s = signal();
        s.tp3_allocation = 25.0;
        let err = validate(&s).unwrap_err();
        assert_eq!(err, ValidationError::AllocationSum { total: 95.0 });
        assert_eq!(err.to_string(), "Allocations must sum to 100% (got 95%)");
    }

    #[test]
    fn allocation_sum_tolerates_rounding() {
        let mut s = signal();
        s.tp1_allocation = 33.333;
        s.tp2_allocation = 33.333;
        s.tp3_allocation = 33.333;
        assert_eq!(validate(&s), Ok(()));

        s.tp3_allocation = 33.3;
        assert!(matches!(
            validate(&s),
            Err(ValidationError::AllocationSum { .. })
        ));
    }

    #[test]
    fn negative_allocation_is_rejected_even_when_sum_matches() {
        let mut s = signal();
        s.tp1_allocation = -10.0;
        s.tp2_allocation = 80.0;
        assert_eq!(
            validate(&s),
            Err(ValidationError::AllocationOutOfRange {
                level: TargetLevel::Tp1,
                value: -10.0
            })
        );
    }

    #[test]
    fn targets_must_ascend_above_entry() {
        let mut s = signal();
        s.tp1_price = 99_000.0;
        assert_eq!(
            validate(&s).unwrap_err().to_string(),
            "TP1 price (99000) must be above entry price (100000)"
        );

        let mut s = signal();
        s.tp3_price = 104_000.0;
        assert_eq!(
            validate(&s).unwrap_err().to_string(),
            "TP3 price (104000) must be above TP2 (104000)"
        );
    }

    #[test]
    fn stop_loss_must_sit_below_entry() {
        let mut s = signal();
        s.stop_loss_price = 100_000.0;
        assert_eq!(
            validate(&s),
            Err(ValidationError::StopLossNotBelowEntry {
                stop_loss: 100_000.0,
                entry: 100_000.0
            })
        );
    }

    #[test]
    fn timeframe_hours_must_be_positive_and_bounded() {
        let mut s = signal();
        s.timeframe_hours = 0.0;
        assert!(matches!(
            validate(&s),
            Err(ValidationError::InvalidTimeframeHours { .. })
        ));
        s.timeframe_hours = MAX_TIMEFRAME_HOURS + 1.0;
        assert!(validate(&s).is_err());
    }

    #[test]
    fn first_failing_rule_wins() {
        let mut s = signal();
        s.tp3_allocation = 10.0;
        s.stop_loss_price = 120_000.0;
        s.timeframe_hours = -1.0;
        assert!(matches!(
            validate(&s),
            Err(ValidationError::AllocationSum { .. })
        ));
    }

    #[test]
    fn custom_tolerance_is_honoured() {
        let mut s = signal();
        s.tp3_allocation = 29.5;
        let loose = BacktestSettings {
            allocation_tolerance: 1.0,
            ..BacktestSettings::default()
        };
        assert_eq!(validate_with(&s, &loose), Ok(()));
        assert!(validate(&s).is_err());
    }
}
