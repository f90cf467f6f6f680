// src/calendar.rs

use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

/// One Monday-Sunday week, clipped to the calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekPeriod {
    /// 1-based position within the year.
    pub index: u32,
    /// `<year>-<index>`.
    pub label: String,
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
}

impl WeekPeriod {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Days in each month, January first.
pub fn month_lengths(year: i32) -> [u32; 12] {
    let feb = if is_leap_year(year) { 29 } else { 28 };
    [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
}

/// Week periods covering every day of `year` exactly once, in order.
///
/// The first and last periods are shorter than seven days unless the year starts on a
/// Monday or ends on a Sunday respectively.
pub fn week_periods(year: i32) -> Result<Vec<WeekPeriod>> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| anyhow!("year {} is out of range", year))?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| anyhow!("year {} is out of range", year))?;

    let mut periods = Vec::with_capacity(54);
    let mut start = first;
    loop {
        let to_sunday = i64::from(Weekday::Sun.num_days_from_monday())
            - i64::from(start.weekday().num_days_from_monday());
        // past NaiveDate::MAX the week is clipped to the year anyway
        let end = start
            .checked_add_signed(Duration::days(to_sunday))
            .map_or(last, |d| d.min(last));
        let index = periods.len() as u32 + 1;
        periods.push(WeekPeriod {
            index,
            label: format!("{}-{}", year, index),
            start,
            end,
        });
        if end == last {
            break;
        }
        start = end
            .succ_opt()
            .ok_or_else(|| anyhow!("no day after {}", end))?;
    }
    Ok(periods)
}
