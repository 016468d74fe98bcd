use crate::metrics::quotient::round_to;
use crate::table::Value;

/// Fractional digits used when rendering percentages such as conversion rates.
pub const PERCENTAGE_PRECISION: usize = 1;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86400.0;
const SECONDS_PER_YEAR: f64 = SECONDS_PER_DAY * 365.25;

/// Where a formatted value ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderContext {
    /// Human-facing output; empty values render as a `-` placeholder.
    Display,
    /// Machine-facing output; values are always rendered.
    Machine,
}

/// How a derived metric's value is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    /// Seconds rendered as a sentence, e.g. `3 min 12 s`.
    Duration,
    /// A percentage value rendered with one fractional digit and `%`.
    Percentage,
    /// A plain number with a fixed number of fractional digits.
    Number { precision: usize },
}

impl FormatRule {
    pub fn render(&self, value: &Value, context: RenderContext) -> String {
        match self {
            FormatRule::Duration => {
                if context == RenderContext::Display && value.is_falsy() {
                    "-".to_string()
                } else {
                    pretty_time_from_seconds(numeric(value))
                }
            }
            FormatRule::Percentage => format_percentage(numeric(value)),
            FormatRule::Number { precision } => format!("{:.*}", precision, numeric(value)),
        }
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        Value::Absent => 0.0,
    }
}

/// Render a percentage value, e.g. `5.0` becomes `5.0%`. Ties round half up.
pub fn format_percentage(value: f64) -> String {
    let rounded = round_to(value, PERCENTAGE_PRECISION as u32);
    format!("{:.*}%", PERCENTAGE_PRECISION, rounded)
}

/// Render a duration in seconds as a short sentence using its two most
/// significant units (`2 days 4 hours`, `3 min 12 s`, `0.25 s`).
pub fn pretty_time_from_seconds(seconds: f64) -> String {
    let negative = seconds < 0.0;
    let total = seconds.abs();

    let years = (total / SECONDS_PER_YEAR).floor();
    let rest = total - years * SECONDS_PER_YEAR;
    let days = (rest / SECONDS_PER_DAY).floor();
    let rest = rest - days * SECONDS_PER_DAY;
    let hours = (rest / SECONDS_PER_HOUR).floor();
    let rest = rest - hours * SECONDS_PER_HOUR;
    let minutes = (rest / SECONDS_PER_MINUTE).floor();
    let secs = rest - minutes * SECONDS_PER_MINUTE;

    let text = if years > 0.0 {
        format!("{years} years {days} days")
    } else if days > 0.0 {
        format!("{days} days {hours} hours")
    } else if hours > 0.0 {
        format!("{hours} hours {minutes} min")
    } else if minutes > 0.0 {
        format!("{minutes} min {} s", seconds_text(secs))
    } else {
        format!("{} s", seconds_text(secs))
    };

    if negative {
        format!("-{text}")
    } else {
        text
    }
}

fn seconds_text(secs: f64) -> String {
    // Sub-centisecond values keep a third digit so they don't collapse to 0.
    let precision = if secs > 0.0 && secs < 0.01 { 3 } else { 2 };
    format!("{}", round_to(secs, precision))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_time_minutes_seconds() {
        assert_eq!(pretty_time_from_seconds(192.0), "3 min 12 s");
    }

    #[test]
    fn test_pretty_time_seconds_only() {
        assert_eq!(pretty_time_from_seconds(0.0), "0 s");
        assert_eq!(pretty_time_from_seconds(2.0), "2 s");
        assert_eq!(pretty_time_from_seconds(1.456), "1.46 s");
        assert_eq!(pretty_time_from_seconds(0.004), "0.004 s");
    }

    #[test]
    fn test_pretty_time_larger_units() {
        assert_eq!(pretty_time_from_seconds(3.0 * 3600.0 + 125.0), "3 hours 2 min");
        assert_eq!(pretty_time_from_seconds(2.0 * 86400.0 + 4.0 * 3600.0), "2 days 4 hours");
        assert_eq!(
            pretty_time_from_seconds(SECONDS_PER_YEAR + 3.0 * 86400.0),
            "1 years 3 days"
        );
    }

    #[test]
    fn test_pretty_time_negative() {
        assert_eq!(pretty_time_from_seconds(-75.0), "-1 min 15 s");
    }

    #[test]
    fn test_duration_display_placeholder() {
        let rule = FormatRule::Duration;
        assert_eq!(rule.render(&Value::Number(0.0), RenderContext::Display), "-");
        assert_eq!(rule.render(&Value::Absent, RenderContext::Display), "-");
        assert_eq!(rule.render(&Value::Number(2.0), RenderContext::Display), "2 s");
    }

    #[test]
    fn test_duration_machine_renders_zero() {
        let rule = FormatRule::Duration;
        assert_eq!(rule.render(&Value::Number(0.0), RenderContext::Machine), "0 s");
        assert_eq!(rule.render(&Value::Absent, RenderContext::Machine), "0 s");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.12345), "0.1%");
        assert_eq!(format_percentage(5.0), "5.0%");
        assert_eq!(format_percentage(0.0), "0.0%");
        assert_eq!(format_percentage(33.36), "33.4%");
    }

    #[test]
    fn test_format_percentage_rounds_ties_up() {
        assert_eq!(format_percentage(0.25), "0.3%");
        assert_eq!(format_percentage(2.25), "2.3%");
        assert_eq!(format_percentage(0.05), "0.1%");
    }

    #[test]
    fn test_number_rule() {
        let rule = FormatRule::Number { precision: 2 };
        assert_eq!(rule.render(&Value::Number(12.5), RenderContext::Display), "12.50");
        assert_eq!(rule.render(&Value::Absent, RenderContext::Machine), "0.00");
    }
}
