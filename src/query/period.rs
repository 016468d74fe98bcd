use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::date_util::parse_date;
use crate::error::{Error, Result};

static RE_LAST_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(last|previous)(\d+)$").unwrap());

/// The reporting period a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Day(NaiveDate),
    Week(i32, u8),
    Month(i32, u8),
    Year(i32),
    Range(NaiveDate, NaiveDate),
}

impl Period {
    /// Parse a period name and a date expression, relative to the local date.
    ///
    /// Period names: `day`, `week`, `month`, `year`, `range`.
    /// Date expressions:
    /// - `today`, `yesterday`, `2025-01-15` for day/week/month/year
    ///   (week, month and year cover the given date)
    /// - `2025-01-01,2025-01-31`: explicit range
    /// - `last7`: seven days ending today
    /// - `previous7`: seven days ending yesterday
    pub fn parse(period: &str, date: &str) -> Result<Self> {
        Self::parse_as_of(period, date, chrono::Local::now().date_naive())
    }

    pub fn parse_as_of(period: &str, date: &str, today: NaiveDate) -> Result<Self> {
        let date = date.trim();
        match period.trim().to_lowercase().as_str() {
            "day" => Ok(Period::Day(parse_date(date, today)?)),
            "week" => {
                let iw = parse_date(date, today)?.iso_week();
                Ok(Period::Week(iw.year(), iw.week() as u8))
            }
            "month" => {
                let d = parse_date(date, today)?;
                Ok(Period::Month(d.year(), d.month() as u8))
            }
            "year" => Ok(Period::Year(parse_date(date, today)?.year())),
            "range" => parse_range(date, today),
            other => Err(Error::PeriodParse(format!("unrecognized period: {other}"))),
        }
    }

    /// Canonical key used to store and look up archived reports.
    pub fn to_key(&self) -> String {
        match self {
            Period::Day(d) => d.format("%Y-%m-%d").to_string(),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Year(y) => format!("{y}"),
            Period::Range(s, e) => format!("{},{}", s.format("%Y-%m-%d"), e.format("%Y-%m-%d")),
        }
    }
}

fn parse_range(date: &str, today: NaiveDate) -> Result<Period> {
    if let Some(caps) = RE_LAST_N.captures(date) {
        let n: i64 = caps[2]
            .parse()
            .map_err(|_| Error::PeriodParse(format!("invalid range length: {date}")))?;
        if n == 0 {
            return Err(Error::PeriodParse(format!("empty range: {date}")));
        }
        let end = if &caps[1] == "last" {
            today
        } else {
            today - Duration::days(1)
        };
        return Ok(Period::Range(end - Duration::days(n - 1), end));
    }

    let (start, end) = date
        .split_once(',')
        .ok_or_else(|| Error::PeriodParse(format!("invalid range: {date}")))?;
    let start = parse_date(start, today)?;
    let end = parse_date(end, today)?;
    if start > end {
        return Err(Error::PeriodParse(format!("range start after end: {date}")));
    }
    Ok(Period::Range(start, end))
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}
