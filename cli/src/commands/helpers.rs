use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use basket_core::models::{WeekWindow, validate_quantity};

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match date_str {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - chrono::Duration::days(1)),
        Some("tomorrow") => Ok(today + chrono::Duration::days(1)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// The week containing `date_str`, or `this`/`last`/`next` relative to today.
pub(crate) fn parse_week(date_str: Option<&str>) -> Result<WeekWindow> {
    let current = WeekWindow::containing(Local::now().date_naive());
    match date_str {
        None | Some("this") => Ok(current),
        Some("last") => Ok(current.previous()),
        Some("next") => Ok(current.next()),
        Some(s) => Ok(WeekWindow::containing(parse_date(Some(s))?)),
    }
}

/// Parse an optional user-entered quantity like "2" or "0.5".
pub(crate) fn parse_quantity(s: Option<&str>) -> Result<Option<f64>> {
    let Some(s) = s else {
        return Ok(None);
    };
    let value: f64 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity '{s}'. Use a number like '2' or '0.5'"))?;
    validate_quantity(Some(value))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    std::process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today")).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday")).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow")).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope")).is_err());
    }

    #[test]
    fn test_parse_week() {
        let week = parse_week(Some("2024-06-13")).unwrap();
        assert_eq!(week.start_iso(), "2024-06-10");
        assert_eq!(week.end_iso(), "2024-06-16");

        let current = parse_week(None).unwrap();
        assert_eq!(parse_week(Some("next")).unwrap(), current.next());
        assert_eq!(parse_week(Some("last")).unwrap(), current.previous());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(None).unwrap(), None);
        assert_eq!(parse_quantity(Some(" 2.5 ")).unwrap(), Some(2.5));
        assert!(parse_quantity(Some("two")).is_err());
        assert!(parse_quantity(Some("-1")).is_err());
        assert!(parse_quantity(Some("0")).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }
}
