// Misfire planning for cron triggers
//
// Given a trigger whose due time has arrived, decide whether to fire and
// when the trigger is next due. Pure, so the engine loop stays simple and the
// policies are unit-testable without a clock.

use crate::models::MisfirePolicy;
use crate::schedule::next_after;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;

/// Result of planning one due trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirePlan {
    /// Nominal fire time of the run to start, if any
    pub fire_at: Option<DateTime<Utc>>,
    /// When the trigger is next due; `None` means the schedule is exhausted
    pub next_due: Option<DateTime<Utc>>,
    /// Whether `due` was later than the misfire threshold
    pub misfired: bool,
}

/// Whether a due time counts as a misfire at `now`
pub fn is_misfire(due: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now - due > threshold
}

/// Plan the handling of a trigger that was due at `due`
pub fn plan_fire(
    policy: MisfirePolicy,
    schedule: &CronSchedule,
    timezone: Tz,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> FirePlan {
    if !is_misfire(due, now, threshold) {
        return FirePlan {
            fire_at: Some(due),
            next_due: next_after(schedule, timezone, due),
            misfired: false,
        };
    }

    match policy {
        MisfirePolicy::IgnoreMisfires => FirePlan {
            fire_at: Some(due),
            next_due: next_after(schedule, timezone, due),
            misfired: true,
        },
        // Cron triggers resolve the smart policy to fire-once-now
        MisfirePolicy::Default | MisfirePolicy::FireAndProceed => FirePlan {
            fire_at: Some(now),
            next_due: next_after(schedule, timezone, now),
            misfired: true,
        },
        MisfirePolicy::DoNothing => FirePlan {
            fire_at: None,
            next_due: next_after(schedule, timezone, now),
            misfired: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::parse_cron_expression;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, h, m, s).unwrap()
    }

    fn every_minute() -> CronSchedule {
        parse_cron_expression("0 * * * * ?").unwrap()
    }

    fn threshold() -> Duration {
        Duration::seconds(60)
    }

    #[test]
    fn test_on_time_fire_advances_from_due() {
        let plan = plan_fire(
            MisfirePolicy::DoNothing,
            &every_minute(),
            Tz::UTC,
            at(10, 0, 0),
            at(10, 0, 2),
            threshold(),
        );
        assert_eq!(plan.fire_at, Some(at(10, 0, 0)));
        assert_eq!(plan.next_due, Some(at(10, 1, 0)));
        assert!(!plan.misfired);
    }

    #[test]
    fn test_threshold_boundary_is_on_time() {
        assert!(!is_misfire(at(10, 0, 0), at(10, 1, 0), threshold()));
        assert!(is_misfire(at(10, 0, 0), at(10, 1, 1), threshold()));
    }

    #[test]
    fn test_ignore_misfires_replays_backlog() {
        let plan = plan_fire(
            MisfirePolicy::IgnoreMisfires,
            &every_minute(),
            Tz::UTC,
            at(10, 0, 0),
            at(10, 5, 30),
            threshold(),
        );
        assert_eq!(plan.fire_at, Some(at(10, 0, 0)));
        // Next due is still in the past, so the loop keeps catching up
        assert_eq!(plan.next_due, Some(at(10, 1, 0)));
        assert!(plan.misfired);
    }

    #[test]
    fn test_fire_and_proceed_collapses_backlog() {
        let plan = plan_fire(
            MisfirePolicy::FireAndProceed,
            &every_minute(),
            Tz::UTC,
            at(10, 0, 0),
            at(10, 5, 30),
            threshold(),
        );
        assert_eq!(plan.fire_at, Some(at(10, 5, 30)));
        assert_eq!(plan.next_due, Some(at(10, 6, 0)));
    }

    #[test]
    fn test_default_behaves_like_fire_and_proceed() {
        let default = plan_fire(
            MisfirePolicy::Default,
            &every_minute(),
            Tz::UTC,
            at(10, 0, 0),
            at(10, 5, 30),
            threshold(),
        );
        let proceed = plan_fire(
            MisfirePolicy::FireAndProceed,
            &every_minute(),
            Tz::UTC,
            at(10, 0, 0),
            at(10, 5, 30),
            threshold(),
        );
        assert_eq!(default, proceed);
    }

    #[test]
    fn test_do_nothing_skips_to_next_regular_occurrence() {
        let plan = plan_fire(
            MisfirePolicy::DoNothing,
            &every_minute(),
            Tz::UTC,
            at(10, 0, 0),
            at(10, 5, 30),
            threshold(),
        );
        assert_eq!(plan.fire_at, None);
        assert_eq!(plan.next_due, Some(at(10, 6, 0)));
        assert!(plan.misfired);
    }
}
