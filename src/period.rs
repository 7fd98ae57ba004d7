// src/period.rs

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// The three granularities every statistic is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Year,
    Quarter,
    Month,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Year, Timeframe::Quarter, Timeframe::Month];

    pub fn name(self) -> &'static str {
        match self {
            Timeframe::Year => "year",
            Timeframe::Quarter => "quarter",
            Timeframe::Month => "month",
        }
    }
}

/// Period keys for one timestamp, one per timeframe. Always produced together:
/// a record is never counted under "year" but skipped under "month".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodKeys {
    pub year: String,
    pub quarter: String,
    pub month: String,
}

impl PeriodKeys {
    pub fn get(&self, tf: Timeframe) -> &str {
        match tf {
            Timeframe::Year => &self.year,
            Timeframe::Quarter => &self.quarter,
            Timeframe::Month => &self.month,
        }
    }
}

/// Parse an ISO 8601 timestamp from the backup. A value with fewer than 10
/// characters has no date component and is rejected; everything derived from
/// it is skipped. Timestamps with an offset (or trailing "Z") parse as full
/// datetimes, bare dates as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.len() < 10 {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

/// Derive the (year, quarter, month) keys for a timestamp. Quarter is
/// 1-indexed: ((month - 1) / 3) + 1. All key formats are zero-padded so
/// lexicographic order is chronological order.
pub fn period_keys(dt: &DateTime<Utc>) -> PeriodKeys {
    let year = dt.year();
    let month = dt.month();
    let quarter = (month - 1) / 3 + 1;
    PeriodKeys {
        year: format!("{year:04}"),
        quarter: format!("{year:04}-Q{quarter}"),
        month: format!("{year:04}-{month:02}"),
    }
}
