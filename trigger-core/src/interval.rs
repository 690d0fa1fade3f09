//! Candle interval definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Fixed-duration candle intervals supported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
}

impl CandleInterval {
    /// Duration of one bar in milliseconds
    pub fn to_millis(&self) -> i64 {
        match self {
            CandleInterval::OneMinute => MINUTE_MS,
            CandleInterval::ThreeMinutes => 3 * MINUTE_MS,
            CandleInterval::FiveMinutes => 5 * MINUTE_MS,
            CandleInterval::FifteenMinutes => 15 * MINUTE_MS,
            CandleInterval::ThirtyMinutes => 30 * MINUTE_MS,
            CandleInterval::OneHour => HOUR_MS,
            CandleInterval::TwoHours => 2 * HOUR_MS,
            CandleInterval::FourHours => 4 * HOUR_MS,
            CandleInterval::EightHours => 8 * HOUR_MS,
            CandleInterval::TwelveHours => 12 * HOUR_MS,
            CandleInterval::OneDay => DAY_MS,
            CandleInterval::ThreeDays => 3 * DAY_MS,
            CandleInterval::OneWeek => 7 * DAY_MS,
        }
    }

    /// Wire representation (`"1m"`, `"4h"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::ThreeMinutes => "3m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::ThirtyMinutes => "30m",
            CandleInterval::OneHour => "1h",
            CandleInterval::TwoHours => "2h",
            CandleInterval::FourHours => "4h",
            CandleInterval::EightHours => "8h",
            CandleInterval::TwelveHours => "12h",
            CandleInterval::OneDay => "1d",
            CandleInterval::ThreeDays => "3d",
            CandleInterval::OneWeek => "1w",
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(CandleInterval::OneMinute),
            "3m" => Ok(CandleInterval::ThreeMinutes),
            "5m" => Ok(CandleInterval::FiveMinutes),
            "15m" => Ok(CandleInterval::FifteenMinutes),
            "30m" => Ok(CandleInterval::ThirtyMinutes),
            "1h" => Ok(CandleInterval::OneHour),
            "2h" => Ok(CandleInterval::TwoHours),
            "4h" => Ok(CandleInterval::FourHours),
            "8h" => Ok(CandleInterval::EightHours),
            "12h" => Ok(CandleInterval::TwelveHours),
            "1d" => Ok(CandleInterval::OneDay),
            "3d" => Ok(CandleInterval::ThreeDays),
            "1w" => Ok(CandleInterval::OneWeek),
            other => Err(format!("Unsupported interval: {}", other)),
        }
    }
}
