// src/models/deadline.rs

//! Application deadline normalization.
//!
//! Catalogs publish deadlines as free text ("12 May 2025", "12.05.25",
//! "on a rolling basis"). [`normalize`] turns that text into a
//! [`Deadline`] that can be compared against the scrape date.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static NAMED_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?,?\s+(\d{4})\b")
        .expect("named-month pattern is valid")
});

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{4}|\d{2})\b").expect("numeric pattern is valid")
});

/// A normalized application deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deadline {
    /// Applications close at the end of this day
    Date(NaiveDate),
    /// Applications are accepted continuously
    Rolling,
    /// No recognizable date in the source text
    Unknown,
}

impl Deadline {
    /// Whether applications are still accepted on `today`.
    ///
    /// `Unknown` is never open: callers drop such records.
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        match self {
            Deadline::Date(date) => *date >= today,
            Deadline::Rolling => true,
            Deadline::Unknown => false,
        }
    }

    /// Whether the deadline is a calendar date before `today`.
    pub fn is_past(&self, today: NaiveDate) -> bool {
        matches!(self, Deadline::Date(date) if *date < today)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deadline::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Deadline::Rolling => f.write_str("rolling"),
            Deadline::Unknown => f.write_str("unknown"),
        }
    }
}

impl FromStr for Deadline {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rolling" => Ok(Deadline::Rolling),
            "unknown" => Ok(Deadline::Unknown),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map(Deadline::Date),
        }
    }
}

impl Serialize for Deadline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Deadline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse free-text deadline into a [`Deadline`].
///
/// Recognized in order: "rolling" anywhere (case-insensitive), `DD Month YYYY`,
/// then `DD.MM.YYYY` / `DD/MM/YYYY` / `DD-MM-YYYY` with 2- or 4-digit years.
/// Numeric dates are always day-month-year. Anything else is `Unknown`.
pub fn normalize(raw: &str) -> Deadline {
    if raw.to_lowercase().contains("rolling") {
        return Deadline::Rolling;
    }

    let named = NAMED_MONTH.captures_iter(raw).find_map(|caps| {
        let day = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });
    if let Some(date) = named {
        return Deadline::Date(date);
    }

    NUMERIC
        .captures_iter(raw)
        .find_map(|caps| {
            let day = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            let year = if caps[3].len() == 2 { 2000 + year } else { year };
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .map_or(Deadline::Unknown, Deadline::Date)
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}
