//! HRRR analysis retrieval.
//!
//! Each hourly run publishes a GRIB2 file plus a `.idx` inventory listing the
//! byte offset of every message. Only the messages matching the search
//! pattern are fetched, using HTTP range requests.

pub mod grid;
pub mod hrrr;
pub mod index;

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

pub use grid::Grid;
pub use hrrr::HrrrFetcher;

/// Every hour from `start` to `end`, both ends included.
pub fn hourly_range(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
    let mut times = Vec::new();
    let mut current = start;

    while current <= end {
        times.push(current);
        current += Duration::hours(1);
    }

    times
}

/// Hourly timestamps from midnight on 1 January of `year` to midnight on
/// 1 January of the following year.
pub fn year_range(year: i32) -> Result<Vec<NaiveDateTime>> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("Invalid year {}", year))?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("Invalid year {}", year + 1))?;

    Ok(hourly_range(start, end))
}

// -- Tests -------------------------------------------------------------------
