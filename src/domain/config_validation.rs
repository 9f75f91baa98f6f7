//! Configuration validation.
//!
//! Checks every key before a run and reports the first violation.
//! Numeric keys are read as strings here so that a malformed value is an
//! error rather than a silent fallback to the default.

use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_live_config(config)?;
    validate_logging_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let capital = parse_finite(config, "backtest", "initial_capital", 10_000.0)?;
    if capital <= 0.0 {
        return Err(TraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    validate_dates(config)?;
    validate_symbols(config)?;

    check_choice(config, "backtest", "capital_mode", &["independent", "shared"])?;
    let max = parse_number(config, "backtest", "max_active_positions", 5i64)?;
    if max < 1 {
        return Err(TraderError::invalid(
            "backtest",
            "max_active_positions",
            "max_active_positions must be at least 1",
        ));
    }

    check_choice(config, "backtest", "sizing", &["fixed", "fraction", "all_cash"])?;
    let per_trade = parse_finite(config, "backtest", "investment_per_trade", 1000.0)?;
    if per_trade <= 0.0 {
        return Err(TraderError::invalid(
            "backtest",
            "investment_per_trade",
            "investment_per_trade must be positive",
        ));
    }
    let fraction = parse_finite(config, "backtest", "investment_fraction", 0.2)?;
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(TraderError::invalid(
            "backtest",
            "investment_fraction",
            "investment_fraction must be in (0, 1]",
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    check_choice(config, "strategy", "kind", &["composite", "rsi_only"])?;
    check_choice(config, "strategy", "rsi_smoothing", &["exponential", "simple"])?;

    check_min_int(config, "rsi_period", 14, 1)?;
    check_min_int(config, "macd_fast", 12, 1)?;
    check_min_int(config, "macd_signal", 9, 1)?;
    check_min_int(config, "trend_period", 200, 1)?;
    check_min_int(config, "bollinger_period", 20, 2)?;

    let fast = parse_number(config, "strategy", "macd_fast", 12i64)?;
    let slow = parse_number(config, "strategy", "macd_slow", 26i64)?;
    if slow <= fast {
        return Err(TraderError::invalid(
            "strategy",
            "macd_slow",
            "macd_slow must be greater than macd_fast",
        ));
    }

    let oversold = parse_finite(config, "strategy", "rsi_oversold", 30.0)?;
    let overbought = parse_finite(config, "strategy", "rsi_overbought", 70.0)?;
    for (key, value) in [("rsi_oversold", oversold), ("rsi_overbought", overbought)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(TraderError::invalid(
                "strategy",
                key,
                format!("{} must be between 0 and 100", key),
            ));
        }
    }
    if oversold >= overbought {
        return Err(TraderError::invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }

    let stddev = parse_finite(config, "strategy", "bollinger_stddev", 2.0)?;
    if stddev <= 0.0 {
        return Err(TraderError::invalid(
            "strategy",
            "bollinger_stddev",
            "bollinger_stddev must be positive",
        ));
    }
    Ok(())
}

pub fn validate_live_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let quantity = parse_finite(config, "live", "order_quantity", 1.0)?;
    if quantity <= 0.0 {
        return Err(TraderError::invalid(
            "live",
            "order_quantity",
            "order_quantity must be positive",
        ));
    }
    check_choice(config, "live", "order_type", &["market", "limit"])?;
    let offset = parse_finite(config, "live", "limit_offset_pct", 0.0)?;
    if !(0.0..100.0).contains(&offset) {
        return Err(TraderError::invalid(
            "live",
            "limit_offset_pct",
            "limit_offset_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

pub fn validate_logging_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    check_choice(config, "logging", "level", &LOG_LEVELS)?;
    check_choice(config, "logging", "format", &["text", "json"])?;
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    if start >= end {
        return Err(TraderError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, TraderError> {
    match value {
        None => Err(TraderError::missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            TraderError::invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let symbols = config.get_string("backtest", "symbols");
    let symbol = config.get_string("backtest", "symbol");

    match (symbols, symbol) {
        (Some(s), _) if !s.trim().is_empty() => Ok(()),
        (None, Some(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(TraderError::missing("backtest", "symbol")),
    }
}

/// Parses `[section] key`, or returns `default` when it is absent.
pub fn parse_number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            TraderError::invalid(section, key, format!("'{}' is not a valid number", raw))
        }),
    }
}

/// Like `parse_number`, but rejects NaN and infinities.
fn parse_finite(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    let value: f64 = parse_number(config, section, key, default)?;
    if !value.is_finite() {
        return Err(TraderError::invalid(
            section,
            key,
            format!("{} must be a finite number", key),
        ));
    }
    Ok(value)
}

fn check_min_int(
    config: &dyn ConfigPort,
    key: &str,
    default: i64,
    min: i64,
) -> Result<(), TraderError> {
    let value = parse_number(config, "strategy", key, default)?;
    if value < min {
        return Err(TraderError::invalid(
            "strategy",
            key,
            format!("{} must be at least {}", key, min),
        ));
    }
    Ok(())
}

fn check_choice(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), TraderError> {
    match config.get_string(section, key) {
        Some(v) if !allowed.contains(&v.trim().to_lowercase().as_str()) => {
            Err(TraderError::invalid(
                section,
                key,
                format!("expected one of: {}", allowed.join(", ")),
            ))
        }
        _ => Ok(()),
    }
}
