use chrono::{Duration, NaiveDate};

use crate::error::{Error, Result};

/// Parse a single date expression: `today`, `yesterday` or `YYYY-MM-DD`.
pub fn parse_date(s: &str, today: NaiveDate) -> Result<NaiveDate> {
    match s.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map_err(|_| Error::PeriodParse(format!("invalid date: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = ymd(2025, 3, 1);
        assert_eq!(parse_date("today", today).unwrap(), today);
        assert_eq!(parse_date("Yesterday", today).unwrap(), ymd(2025, 2, 28));
    }

    #[test]
    fn test_parse_date_iso() {
        let today = ymd(2025, 3, 1);
        assert_eq!(parse_date("2024-12-05", today).unwrap(), ymd(2024, 12, 5));
        assert!(parse_date("2024-13-05", today).is_err());
        assert!(parse_date("soon", today).is_err());
    }
}
