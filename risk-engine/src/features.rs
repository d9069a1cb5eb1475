//! Feature engineering for the fraud model
//!
//! The model is trained on two raw inputs, amount and hour of day, plus the
//! derived columns below. Scoring and training must agree on these exactly.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Hour of day (0-23) as written in an ISO-8601 timestamp
///
/// A trailing `Z` is stripped and the remaining wall-clock time is used as
/// is. Explicit offsets are kept as local time, not converted to UTC.
pub fn hour_of_day(timestamp: &str) -> Option<u32> {
    let trimmed = timestamp.trim();
    let naive = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(parsed.hour());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|parsed| parsed.naive_local().hour())
}

/// Model input row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Raw amount
    pub amount: f64,
    /// Hour of day (0-23)
    pub hour: u32,
    /// ln(1 + amount)
    pub log_amount: f64,
    /// sin(2π·hour/24)
    pub hour_sin: f64,
    /// cos(2π·hour/24)
    pub hour_cos: f64,
    /// amount · hour/23
    pub amount_x_hour: f64,
}

impl FeatureVector {
    /// Build the feature row; `None` for negative or non-finite amounts or hour > 23
    pub fn new(amount: f64, hour: u32) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 || hour > 23 {
            return None;
        }

        let h = f64::from(hour);
        Some(Self {
            amount,
            hour,
            log_amount: amount.ln_1p(),
            hour_sin: (2.0 * PI * h / 24.0).sin(),
            hour_cos: (2.0 * PI * h / 24.0).cos(),
            amount_x_hour: amount * (h / 23.0),
        })
    }
}
