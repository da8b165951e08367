use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::{OverrideWindow, TimeSlot, TimeWindowOverride};

/// Decide whether a date (or a slot on that date) is bookable under the
/// "manage time availability" override set.
///
/// Overrides are evaluated in ascending priority. Every matching rule is
/// collected: `bookable: false` marks the candidate blocked, `bookable:
/// true` marks it must-book. Must-book membership wins, so a narrow
/// bookable rule re-admits a date excluded by a broader holiday rule. In
/// whitelist mode only must-book candidates are bookable at all.
pub fn is_bookable(
    overrides: &[TimeWindowOverride],
    default_unbookable: bool,
    date: NaiveDate,
    slot: Option<&TimeSlot>,
) -> bool {
    let mut ordered: Vec<&TimeWindowOverride> = overrides.iter().collect();
    ordered.sort_by_key(|o| o.priority);

    let mut blocked = false;
    let mut must_book = false;
    for rule in ordered {
        if !window_matches(&rule.window, date, slot) {
            continue;
        }
        if rule.bookable {
            must_book = true;
        } else {
            blocked = true;
        }
    }

    if default_unbookable {
        must_book
    } else {
        must_book || !blocked
    }
}

fn window_matches(window: &OverrideWindow, date: NaiveDate, slot: Option<&TimeSlot>) -> bool {
    match window {
        OverrideWindow::CustomDateRange(range) => range.contains(date),
        OverrideWindow::MonthRange { from, to } => wrapping_contains(date.month(), *from, *to),
        OverrideWindow::WeekRange { from, to } => {
            wrapping_contains(date.iso_week().week(), *from, *to)
        }
        OverrideWindow::WeekdayRange { from, to } => wrapping_contains(
            date.weekday().num_days_from_monday(),
            from.num_days_from_monday(),
            to.num_days_from_monday(),
        ),
        // Time-scoped windows only constrain slotted candidates; they
        // never block a bare date.
        OverrideWindow::FixedTime { from, to } => match slot {
            Some(s) => s.overlaps(&TimeSlot { from: *from, to: Some(*to) }),
            None => false,
        },
        OverrideWindow::TimeOfWeek { day, from, to } => match slot {
            Some(s) => {
                date.weekday() == *day && s.overlaps(&TimeSlot { from: *from, to: Some(*to) })
            }
            None => false,
        },
    }
}

/// Inclusive membership in a range that may wrap around its cycle
/// (months 11..=2, weekdays Fri..=Mon).
fn wrapping_contains(value: u32, from: u32, to: u32) -> bool {
    if from <= to {
        from <= value && value <= to
    } else {
        value >= from || value <= to
    }
}

#[allow(dead_code)]
pub fn weekday_in_range(day: Weekday, from: Weekday, to: Weekday) -> bool {
    wrapping_contains(
        day.num_days_from_monday(),
        from.num_days_from_monday(),
        to.num_days_from_monday(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DateRange;
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn block(window: OverrideWindow, priority: u32) -> TimeWindowOverride {
        TimeWindowOverride { window, bookable: false, priority }
    }

    fn admit(window: OverrideWindow, priority: u32) -> TimeWindowOverride {
        TimeWindowOverride { window, bookable: true, priority }
    }

    #[test]
    fn no_overrides_means_bookable() {
        assert!(is_bookable(&[], false, d(2025, 3, 15), None));
    }

    #[test]
    fn whitelist_mode_blocks_by_default() {
        assert!(!is_bookable(&[], true, d(2025, 3, 15), None));
        let rules = [admit(
            OverrideWindow::CustomDateRange(DateRange::single(d(2025, 3, 15))),
            1,
        )];
        assert!(is_bookable(&rules, true, d(2025, 3, 15), None));
        assert!(!is_bookable(&rules, true, d(2025, 3, 16), None));
    }

    #[test]
    fn bookable_rule_readmits_blocked_month() {
        // All of March blocked, March 15 explicitly re-admitted.
        let rules = [
            block(OverrideWindow::MonthRange { from: 3, to: 3 }, 1),
            admit(
                OverrideWindow::CustomDateRange(DateRange::single(d(2025, 3, 15))),
                5,
            ),
        ];
        assert!(is_bookable(&rules, false, d(2025, 3, 15), None));
        assert!(!is_bookable(&rules, false, d(2025, 3, 14), None));
        assert!(!is_bookable(&rules, false, d(2025, 3, 16), None));
        assert!(is_bookable(&rules, false, d(2025, 4, 1), None));
    }

    #[test]
    fn readmission_wins_regardless_of_priority_order() {
        let rules = [
            admit(
                OverrideWindow::CustomDateRange(DateRange::single(d(2025, 3, 15))),
                1,
            ),
            block(OverrideWindow::MonthRange { from: 3, to: 3 }, 5),
        ];
        assert!(is_bookable(&rules, false, d(2025, 3, 15), None));
    }

    #[test]
    fn month_range_wraps_year_end() {
        let rules = [block(OverrideWindow::MonthRange { from: 11, to: 2 }, 1)];
        assert!(!is_bookable(&rules, false, d(2025, 12, 10), None));
        assert!(!is_bookable(&rules, false, d(2026, 1, 10), None));
        assert!(is_bookable(&rules, false, d(2025, 6, 10), None));
    }

    #[test]
    fn weekday_range_wraps_week_end() {
        // Fri..Mon blocked.
        let rules = [block(
            OverrideWindow::WeekdayRange { from: Weekday::Fri, to: Weekday::Mon },
            1,
        )];
        assert!(!is_bookable(&rules, false, d(2025, 6, 6), None)); // Friday
        assert!(!is_bookable(&rules, false, d(2025, 6, 9), None)); // Monday
        assert!(is_bookable(&rules, false, d(2025, 6, 10), None)); // Tuesday
    }

    #[test]
    fn fixed_time_only_constrains_slots() {
        let rules = [block(
            OverrideWindow::FixedTime { from: t(12, 0), to: t(14, 0) },
            1,
        )];
        let lunch = TimeSlot::new(t(12, 30), Some(t(13, 30)));
        let morning = TimeSlot::new(t(9, 0), Some(t(10, 0)));
        assert!(!is_bookable(&rules, false, d(2025, 6, 6), Some(&lunch)));
        assert!(is_bookable(&rules, false, d(2025, 6, 6), Some(&morning)));
        // A bare date is untouched by time-scoped windows.
        assert!(is_bookable(&rules, false, d(2025, 6, 6), None));
    }

    #[test]
    fn time_of_week_matches_one_weekday() {
        let rules = [block(
            OverrideWindow::TimeOfWeek { day: Weekday::Mon, from: t(9, 0), to: t(12, 0) },
            1,
        )];
        let slot = TimeSlot::new(t(10, 0), Some(t(11, 0)));
        assert!(!is_bookable(&rules, false, d(2025, 6, 9), Some(&slot))); // Monday
        assert!(is_bookable(&rules, false, d(2025, 6, 10), Some(&slot))); // Tuesday
    }

    #[test]
    fn week_range_matches_iso_weeks() {
        let week = d(2025, 6, 9).iso_week().week();
        let rules = [block(OverrideWindow::WeekRange { from: week, to: week }, 1)];
        assert!(!is_bookable(&rules, false, d(2025, 6, 9), None));
        assert!(is_bookable(&rules, false, d(2025, 6, 20), None));
    }
}
