use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::limits::{MAX_HORIZON_DAYS, MAX_QUERY_WINDOW_DAYS};
use crate::model::{
    AvailabilityRequest, BookingKind, CartHold, DateRange, ProductState, Resource,
};

use super::error::EngineError;
use super::{resources, windows};

/// Walk forward day-by-day from `start` until a date passes every
/// calendar filter: product and supplied lockout dates, custom holiday
/// ranges, disabled weekdays, window overrides, slot resolvability for
/// date-time products, and start-weekday alignment for fixed blocks.
///
/// The walk is bounded by the product's max-advance horizon; when nothing
/// passes, the horizon bound itself is returned as a degraded fallback
/// instead of looping.
pub fn first_available(
    state: &ProductState,
    extra_lockouts: &HashSet<NaiveDate>,
    start: NaiveDate,
) -> NaiveDate {
    let config = &state.config;
    let horizon = config.max_advance_days.min(MAX_HORIZON_DAYS);

    let mut date = start;
    for _ in 0..=horizon {
        if passes_calendar_filters(state, extra_lockouts, date) {
            return date;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    debug!(
        product = config.id.0,
        %start,
        horizon,
        "no available date inside horizon; returning bound"
    );
    date
}

fn passes_calendar_filters(
    state: &ProductState,
    extra_lockouts: &HashSet<NaiveDate>,
    date: NaiveDate,
) -> bool {
    let config = &state.config;
    if config.holidays.contains(&date) || extra_lockouts.contains(&date) {
        return false;
    }
    if config.holiday_ranges.iter().any(|r| r.contains(date)) {
        return false;
    }
    // An empty weekday set means every weekday is open.
    if !config.bookable_weekdays.is_empty() && !config.bookable_weekdays.contains(&date.weekday())
    {
        return false;
    }
    if !windows::is_bookable(&config.overrides, config.default_unbookable, date, None) {
        return false;
    }
    match &config.kind {
        BookingKind::DateTime => !config.slots_for(date).is_empty(),
        BookingKind::FixedBlocks { start_weekday, .. } => date.weekday() == *start_weekday,
        _ => true,
    }
}

/// Every date in `[from, to]` whose combined availability (product plus
/// all required resources) is exhausted.
pub fn blocked_dates(
    state: &ProductState,
    required: &[Resource],
    session_holds: &[CartHold],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<BTreeSet<NaiveDate>, EngineError> {
    if from > to {
        return Err(EngineError::InvalidRange {
            start: from.and_time(chrono::NaiveTime::MIN),
            end: to.and_time(chrono::NaiveTime::MIN),
        });
    }
    let range = DateRange::new(from, to);
    if range.len_days() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }

    let mut blocked = BTreeSet::new();
    for date in range.days() {
        let probe = AvailabilityRequest::new(state.config.id, date, 1);
        let verdict = resources::check_resources(state, required, session_holds, &probe)?;
        if verdict.combined.is_exhausted() {
            blocked.insert(date);
        }
    }
    Ok(blocked)
}
