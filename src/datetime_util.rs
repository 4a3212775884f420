use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::constants::{J1900, SECONDS_PER_DAY};

/// Julian date of the Unix epoch, 1970-01-01T00:00:00.
const JD_UNIX_EPOCH: f64 = 2440587.5;

/// Two-digit TLE years below this belong to the 2000s.
const YEAR_PIVOT: i32 = 57;

/// Full year for a two-digit TLE epoch year.
pub fn full_year(two_digit: i32) -> i32 {
    if two_digit < YEAR_PIVOT {
        2000 + two_digit
    } else {
        1900 + two_digit
    }
}

/// Julian date of January 0.0 of `year` (valid 1901 through 2099).
pub fn year_start_jd(year: i32) -> f64 {
    let offset = year - 1900;
    J1900 + offset as f64 * 365.0 + ((offset - 1) / 4) as f64
}

/// Julian date of a TLE epoch given as two-digit year plus fractional day of year.
pub fn epoch_to_jd(two_digit_year: i32, day_of_year: f64) -> f64 {
    year_start_jd(full_year(two_digit_year)) + day_of_year
}

/// Split a Julian date into calendar year and fractional day of year (Jan 1.0 = day 1).
pub fn jd_to_year_and_day(jd: f64) -> (i32, f64) {
    let mut offset = ((jd - J1900) / 365.0) as i32 + 1;
    loop {
        offset -= 1;
        let start = J1900 + offset as f64 * 365.0 + ((offset - 1) / 4) as f64;
        let day = jd - start;
        if day >= 1.0 {
            return (1900 + offset, day);
        }
    }
}

pub fn jd_to_utc(jd: f64) -> DateTime<Utc> {
    let seconds = (jd - JD_UNIX_EPOCH) * SECONDS_PER_DAY;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn utc_to_jd(when: DateTime<Utc>) -> f64 {
    let seconds = when.timestamp() as f64 + when.timestamp_subsec_nanos() as f64 * 1e-9;
    JD_UNIX_EPOCH + seconds / SECONDS_PER_DAY
}

/// Accepts RFC 3339 (`2024-03-01T12:00:00Z`) or a bare `2024-03-01T12:00:00.000000`.
pub fn parse_utc(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(when) = DateTime::parse_from_rfc3339(text) {
        return Ok(when.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Ok(naive.and_utc()),
        Err(e) => bail!("cannot read {:?} as a UTC time: {}", text, e),
    }
}
