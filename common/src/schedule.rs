// Cron expression parsing and fire time calculation
//
// Expressions use Quartz syntax with second precision:
// `sec min hour day-of-month month day-of-week [year]`, `?` allowed in the
// day fields, day-of-week 1-7 or SUN-SAT.
//
//   "0 0 12 * * ?"      every day at 12:00
//   "0 15 10 ? * *"     every day at 10:15
//   "0 */5 * * * ?"     every five minutes
//   "0 0 12 ? * WED"    every Wednesday at 12:00

use crate::errors::ScheduleError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse and validate a cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::InvalidCronExpression {
            expression: expression.to_string(),
            reason: "expression is empty".to_string(),
        });
    }

    CronSchedule::from_str(trimmed).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Check whether an expression is a usable cron schedule
pub fn validate(expression: &str) -> bool {
    parse_cron_expression(expression).is_ok()
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name.trim()).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// First occurrence of `schedule` strictly after `from`, evaluated in `timezone`
pub fn next_after(
    schedule: &CronSchedule,
    timezone: Tz,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    schedule
        .after(&from.with_timezone(&timezone))
        .next()
        .map(|next| next.with_timezone(&Utc))
}

/// Calculate the next fire time for an expression
///
/// Returns `Ok(None)` when the expression is valid but has no future
/// occurrence (e.g. a year field entirely in the past).
pub fn next_fire_time(
    expression: &str,
    from: DateTime<Utc>,
    timezone: Tz,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let schedule = parse_cron_expression(expression)?;
    Ok(next_after(&schedule, timezone, from))
}

/// Calculate the next `count` fire times for an expression
pub fn next_fire_times(
    expression: &str,
    from: DateTime<Utc>,
    timezone: Tz,
    count: usize,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    let schedule = parse_cron_expression(expression)?;
    Ok(schedule
        .after(&from.with_timezone(&timezone))
        .take(count)
        .map(|next| next.with_timezone(&Utc))
        .collect())
}

/// Reject expressions that parse but will never fire again
pub fn ensure_fires_after(
    expression: &str,
    from: DateTime<Utc>,
    timezone: Tz,
) -> Result<DateTime<Utc>, ScheduleError> {
    next_fire_time(expression, from, timezone)?
        .ok_or_else(|| ScheduleError::NoNextExecution(expression.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Timelike};
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_valid_quartz_expressions() {
        for expr in [
            "0 0 12 * * ?",
            "0 15 10 ? * *",
            "0 15 10 * * ? *",
            "0 */5 * * * ?",
            "0 0 12 ? * WED",
            "0 0 0 * * ?",
            "0 0 12 * * * 2099",
        ] {
            assert!(validate(expr), "expected '{}' to be valid", expr);
        }
    }

    #[test]
    fn test_parse_invalid_expressions() {
        for expr in ["", "   ", "invalid", "* * * *", "61 * * * * ?", "0 0 25 * * ?"] {
            assert!(!validate(expr), "expected '{}' to be invalid", expr);
        }
    }

    #[test]
    fn test_invalid_expression_reports_expression() {
        let err = parse_cron_expression("nope").unwrap_err();
        match err {
            ScheduleError::InvalidCronExpression { expression, .. } => assert_eq!(expression, "nope"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_next_midnight() {
        let from = at(2026, 3, 14, 15, 9, 26);
        let next = next_fire_time("0 0 0 * * ?", from, Tz::UTC).unwrap().unwrap();
        assert_eq!(next, at(2026, 3, 15, 0, 0, 0));
    }

    #[test]
    fn test_next_fire_time_is_strictly_after_reference() {
        let from = at(2026, 1, 1, 0, 0, 0);
        let next = next_fire_time("0 0 0 * * ?", from, Tz::UTC).unwrap().unwrap();
        assert_eq!(next, at(2026, 1, 2, 0, 0, 0));
    }

    #[test]
    fn test_next_fire_time_respects_timezone() {
        // Midnight in Shanghai is 16:00 UTC the day before
        let tz = parse_timezone("Asia/Shanghai").unwrap();
        let from = at(2026, 3, 14, 12, 0, 0);
        let next = next_fire_time("0 0 0 * * ?", from, tz).unwrap().unwrap();
        assert_eq!(next, at(2026, 3, 14, 16, 0, 0));
    }

    #[test]
    fn test_next_fire_times_preview() {
        let from = at(2026, 3, 14, 10, 2, 30);
        let times = next_fire_times("0 */5 * * * ?", from, Tz::UTC, 3).unwrap();
        assert_eq!(
            times,
            vec![
                at(2026, 3, 14, 10, 5, 0),
                at(2026, 3, 14, 10, 10, 0),
                at(2026, 3, 14, 10, 15, 0)
            ]
        );
    }

    #[test]
    fn test_expired_year_has_no_next_fire() {
        let from = at(2026, 1, 1, 0, 0, 0);
        assert_eq!(next_fire_time("0 0 0 1 1 ? 2020", from, Tz::UTC).unwrap(), None);
        assert!(matches!(
            ensure_fires_after("0 0 0 1 1 ? 2020", from, Tz::UTC),
            Err(ScheduleError::NoNextExecution(_))
        ));
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("UTC").is_ok());
        assert!(parse_timezone("Asia/Ho_Chi_Minh").is_ok());
        assert!(parse_timezone("Nowhere/Special").is_err());
    }

    proptest! {
        #[test]
        fn prop_next_fire_time_is_deterministic(
            second in 0u32..60,
            minute in 0u32..60,
            hour in 0u32..24,
            offset_secs in 0i64..(400 * 24 * 3600),
        ) {
            let expr = format!("{} {} {} * * ?", second, minute, hour);
            prop_assert!(validate(&expr));

            let from = at(2026, 1, 1, 0, 0, 0) + Duration::seconds(offset_secs);
            let first = next_fire_time(&expr, from, Tz::UTC).unwrap();
            let second_call = next_fire_time(&expr, from, Tz::UTC).unwrap();
            prop_assert_eq!(first, second_call);

            let next = first.unwrap();
            prop_assert!(next > from);
            prop_assert!(next - from <= Duration::days(1));
            prop_assert_eq!(next.second(), second);
            prop_assert_eq!(next.minute(), minute);
            prop_assert_eq!(next.hour(), hour);
        }

        #[test]
        fn prop_out_of_range_seconds_rejected(second in 60u32..200) {
            let expr = format!("{} 0 0 * * ?", second);
            prop_assert!(!validate(&expr));
        }
    }
}
