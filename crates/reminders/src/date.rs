//! Due-date normalisation for uploaded files.
//!
//! Uploads arrive with whatever date format the client's spreadsheet produced.
//! Everything resolves to a [`NaiveDate`] or fails with
//! [`DomainError::InvalidDate`].
//!
//! Fully numeric dates are read **day-first** (`DD/MM/YYYY`) even when the first
//! component is 12 or less: `03/04/2025` is the 3rd of April. Month-first is
//! never inferred. Year-first input (`YYYY/M/D`) is always read as ISO order.
//! Years outside [`SUPPORTED_YEARS`] are rejected.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

use dunning_core::{DomainError, DomainResult};

static YEAR_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})").expect("static regex"));

/// Formats tried when the input is not three numeric components.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%b %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%a, %b %d, %Y",
];

const FALLBACK_DATETIME_FORMATS: &[&str] = &["%b %d, %Y %H:%M", "%b %d, %Y %H:%M:%S"];

/// Calendar years a due date may fall in.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1900..=9999;

/// Resolve a free-form due date to a calendar date.
pub fn normalize_date(input: &str) -> DomainResult<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_date(input));
    }
    let date = parse_date(trimmed)?;
    if !SUPPORTED_YEARS.contains(&date.year()) {
        return Err(DomainError::invalid_date(trimmed));
    }
    Ok(date)
}

fn parse_date(trimmed: &str) -> DomainResult<NaiveDate> {
    let cleaned: String = trimmed
        .chars()
        .map(|c| if matches!(c, '-' | '.') { '/' } else { c })
        .collect();

    if let Some(caps) = YEAR_FIRST.captures(&cleaned) {
        let year = caps[1].parse::<i32>().ok();
        let month = caps[2].parse::<u32>().ok();
        let day = caps[3].parse::<u32>().ok();
        return match (year, month, day) {
            (Some(y), Some(m), Some(d)) => {
                NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| DomainError::invalid_date(trimmed))
            }
            _ => Err(DomainError::invalid_date(trimmed)),
        };
    }

    let parts: Vec<&str> = cleaned.split('/').collect();
    if let [p1, p2, p3] = parts.as_slice() {
        if let (Some(p1), Some(p2), Some(p3)) = (numeric(p1), numeric(p2), numeric(p3)) {
            let year = if p3 < 100 { 2000 + p3 } else { p3 };
            // Day-first regardless of whether p1 > 12.
            return i32::try_from(year)
                .ok()
                .and_then(|y| NaiveDate::from_ymd_opt(y, p2, p1))
                .ok_or_else(|| DomainError::invalid_date(trimmed));
        }
    }

    parse_generic(trimmed).ok_or_else(|| DomainError::invalid_date(trimmed))
}

/// `true` when [`normalize_date`] accepts the input.
pub fn is_valid_date(input: &str) -> bool {
    normalize_date(input).is_ok()
}

fn numeric(part: &str) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() || part.len() > 4 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

fn parse_generic(input: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.date_naive());
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .or_else(|| {
            FALLBACK_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                .map(|dt| dt.date())
        })
}
