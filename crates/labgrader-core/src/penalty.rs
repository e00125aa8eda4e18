//! Lateness penalty.
//!
//! One penalty unit per full week past the deadline, capped per lab.

use chrono::{DateTime, FixedOffset, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days from `deadline` to `completed`, rounded toward negative
/// infinity (a submission one second early is day `-1`).
pub fn lateness_days(completed: DateTime<Utc>, deadline: DateTime<FixedOffset>) -> i64 {
    let diff = completed.signed_duration_since(deadline.with_timezone(&Utc));
    diff.num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Penalty for `days` of lateness: zero when on time, otherwise
/// `days / 7` capped at `penalty_max`.
pub fn calculate_penalty(days: i64, penalty_max: u32) -> u32 {
    if days < 0 {
        return 0;
    }
    let weeks = days / 7;
    weeks.min(i64::from(penalty_max)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_on_time_is_free() {
        for d in [-1, -6, -7, -365] {
            assert_eq!(calculate_penalty(d, 3), 0);
        }
    }

    #[test]
    fn test_one_unit_per_full_week() {
        assert_eq!(calculate_penalty(0, 3), 0);
        assert_eq!(calculate_penalty(6, 3), 0);
        assert_eq!(calculate_penalty(7, 3), 1);
        assert_eq!(calculate_penalty(9, 3), 1);
        assert_eq!(calculate_penalty(14, 3), 2);
    }

    #[test]
    fn test_capped_at_max() {
        assert_eq!(calculate_penalty(70, 3), 3);
        assert_eq!(calculate_penalty(70, 0), 0);
    }

    #[test]
    fn test_matches_formula_and_is_monotonic() {
        for max in 0..5u32 {
            let mut prev = 0;
            for d in 0..100i64 {
                let p = calculate_penalty(d, max);
                assert_eq!(p, ((d / 7) as u32).min(max));
                assert!(p >= prev);
                prev = p;
            }
        }
    }

    #[test]
    fn test_lateness_days_floors() {
        let deadline = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 0, 0, 0)
            .unwrap();
        let nine_days = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        assert_eq!(lateness_days(nine_days, deadline), 9);

        let one_second_early = Utc.with_ymd_and_hms(2024, 4, 30, 23, 59, 59).unwrap();
        assert_eq!(lateness_days(one_second_early, deadline), -1);

        let same_instant = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(lateness_days(same_instant, deadline), 0);
    }

    #[test]
    fn test_lateness_respects_deadline_offset() {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        let deadline = msk.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap();
        // 21:00 UTC is 00:00 MSK the next day
        let just_after = Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap();
        assert_eq!(lateness_days(just_after, deadline), 0);
        let before = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        assert_eq!(lateness_days(before, deadline), -1);
    }
}
