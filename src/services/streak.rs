use chrono::{Duration, NaiveDate};

use crate::models::contribution::ContributionDay;
use crate::models::streak::StreakState;

/// Compute streak counters for a user from their contribution history.
///
/// `today` is the current calendar day in the user's timezone; threading it
/// explicitly keeps the computation deterministic under test.
/// `persisted_longest` is the stored longest streak, which never decreases.
pub fn compute_streak(
    days: &[ContributionDay],
    today: NaiveDate,
    persisted_longest: i32,
) -> StreakState {
    let mut days: Vec<ContributionDay> = days.to_vec();
    days.sort_by_key(|d| d.date);
    days.dedup_by_key(|d| d.date);

    let current = current_streak(&days, today);
    let longest = longest_streak(&days).max(persisted_longest).max(current);
    let last_commit_date = days.iter().rev().find(|d| d.counts()).map(|d| d.date);

    StreakState {
        current_streak: current,
        longest_streak: longest,
        last_commit_date,
    }
}

/// Whether the user has any activity recorded for `date`.
pub fn committed_on(days: &[ContributionDay], date: NaiveDate) -> bool {
    days.iter().any(|d| d.date == date && d.counts())
}

/// Length of the streak ending at `today` or `today - 1`.
///
/// A quiet "today" does not break a streak that ran through yesterday: the
/// day is not over yet. Anything older than yesterday means the chain is
/// broken and the streak is zero. Expects `days` sorted ascending with one
/// entry per date.
fn current_streak(days: &[ContributionDay], today: NaiveDate) -> i32 {
    let yesterday = today - Duration::days(1);

    let mut counting = days.iter().rev().filter(|d| d.counts());
    let anchor = match counting.next() {
        Some(d) if d.date == today || d.date == yesterday => d,
        _ => return 0,
    };

    let mut streak = 1;
    let mut expected = anchor.date - Duration::days(1);
    for day in counting {
        if day.date != expected {
            break;
        }
        streak += 1;
        expected = expected - Duration::days(1);
    }
    streak
}

/// Longest run of consecutive counting days anywhere in the history.
///
/// A zero-count entry resets the run, as does a gap between dates. Expects
/// `days` sorted ascending with one entry per date.
fn longest_streak(days: &[ContributionDay]) -> i32 {
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;

    for day in days {
        if day.counts() {
            run = match prev {
                Some(p) if day.date - p == Duration::days(1) => run + 1,
                _ => 1,
            };
            prev = Some(day.date);
            longest = longest.max(run);
        } else {
            run = 0;
            prev = None;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(y: i32, m: u32, d: u32, count: i32) -> ContributionDay {
        ContributionDay {
            date: date(y, m, d),
            count,
        }
    }

    #[test]
    fn test_empty_history() {
        let state = compute_streak(&[], date(2024, 1, 3), 0);
        assert_eq!(state.current_streak, 0);
        assert_eq!(state.longest_streak, 0);
        assert_eq!(state.last_commit_date, None);
    }

    #[test]
    fn test_quiet_today_keeps_streak_ending_yesterday() {
        // No contribution yet today must not zero out a streak that ran
        // through yesterday.
        let days = vec![day(2024, 1, 1, 1), day(2024, 1, 2, 1), day(2024, 1, 3, 0)];
        let state = compute_streak(&days, date(2024, 1, 3), 0);
        assert_eq!(state.current_streak, 2);
        assert_eq!(state.longest_streak, 2);
        assert_eq!(state.last_commit_date, Some(date(2024, 1, 2)));
    }

    #[test]
    fn test_today_extends_streak() {
        let days = vec![day(2024, 1, 1, 2), day(2024, 1, 2, 1), day(2024, 1, 3, 3)];
        let state = compute_streak(&days, date(2024, 1, 3), 0);
        assert_eq!(state.current_streak, 3);
        assert_eq!(state.last_commit_date, Some(date(2024, 1, 3)));
    }

    #[test]
    fn test_last_activity_before_yesterday_breaks_streak() {
        let days = vec![day(2024, 1, 1, 1), day(2024, 1, 2, 1)];
        let state = compute_streak(&days, date(2024, 1, 5), 0);
        assert_eq!(state.current_streak, 0);
        assert_eq!(state.longest_streak, 2);
        assert_eq!(state.last_commit_date, Some(date(2024, 1, 2)));
    }

    #[test]
    fn test_gap_limits_current_but_not_longest() {
        // Five-day run in the past, two-day run ending today.
        let days = vec![
            day(2024, 1, 1, 1),
            day(2024, 1, 2, 1),
            day(2024, 1, 3, 1),
            day(2024, 1, 4, 1),
            day(2024, 1, 5, 1),
            day(2024, 1, 9, 1),
            day(2024, 1, 10, 1),
        ];
        let state = compute_streak(&days, date(2024, 1, 10), 0);
        assert_eq!(state.current_streak, 2);
        assert_eq!(state.longest_streak, 5);
    }

    #[test]
    fn test_zero_count_entry_breaks_run() {
        let days = vec![day(2024, 1, 1, 1), day(2024, 1, 2, 0), day(2024, 1, 3, 1)];
        let state = compute_streak(&days, date(2024, 1, 3), 0);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 1);
    }

    #[test]
    fn test_persisted_longest_is_a_ratchet() {
        let days = vec![day(2024, 1, 2, 1), day(2024, 1, 3, 1)];
        let state = compute_streak(&days, date(2024, 1, 3), 30);
        assert_eq!(state.current_streak, 2);
        assert_eq!(state.longest_streak, 30);
    }

    #[test]
    fn test_idempotent_for_fixed_inputs() {
        let days = vec![day(2024, 1, 1, 1), day(2024, 1, 2, 1), day(2024, 1, 3, 2)];
        let a = compute_streak(&days, date(2024, 1, 3), 1);
        let b = compute_streak(&days, date(2024, 1, 3), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsorted_input_is_normalized() {
        let days = vec![day(2024, 1, 3, 1), day(2024, 1, 1, 1), day(2024, 1, 2, 1)];
        let state = compute_streak(&days, date(2024, 1, 3), 0);
        assert_eq!(state.current_streak, 3);
    }

    #[test]
    fn test_committed_on() {
        let days = vec![day(2024, 1, 2, 1), day(2024, 1, 3, 0)];
        assert!(committed_on(&days, date(2024, 1, 2)));
        assert!(!committed_on(&days, date(2024, 1, 3)));
        assert!(!committed_on(&days, date(2024, 1, 4)));
    }

    #[quickcheck]
    fn prop_longest_at_least_current(counts: Vec<u8>, persisted: u8) -> bool {
        let start = date(2024, 1, 1);
        let days: Vec<ContributionDay> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| ContributionDay {
                date: start + Duration::days(i as i64),
                count: (c % 3) as i32,
            })
            .collect();
        let today = start + Duration::days(counts.len() as i64);

        let state = compute_streak(&days, today, persisted as i32);
        state.longest_streak >= state.current_streak
            && state.current_streak >= 0
            && state.longest_streak >= persisted as i32
    }
}
