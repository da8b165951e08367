use std::collections::HashMap;

use chrono::{Duration, NaiveTime, Timelike};

use crate::model::{
    BookingKind, BookingRecord, BucketKey, DateRange, ProductConfig, ProductState, Qty,
    ResourceId,
};

/// Aggregate countable reservation rows into typed capacity buckets over
/// a date range. `resource: None` counts every row; `Some(r)` only rows
/// booked on that resource.
pub fn aggregate(
    state: &ProductState,
    range: &DateRange,
    resource: Option<ResourceId>,
) -> HashMap<BucketKey, Qty> {
    let config = &state.config;
    let mut buckets: HashMap<BucketKey, Qty> = HashMap::new();

    for record in state.overlapping(range) {
        if !record.status.is_countable() {
            continue;
        }
        if let Some(rid) = resource
            && record.resource != Some(rid)
        {
            continue;
        }
        let qty = record.counted_quantity(config.per_person_lockout);

        match &config.kind {
            BookingKind::SingleDay | BookingKind::MultipleDates => {
                let date = record.start.date();
                if range.contains(date) {
                    *buckets.entry(BucketKey::Day(date)).or_default() += qty;
                }
            }
            BookingKind::DateTime => add_slot_buckets(config, record, qty, range, &mut buckets),
            BookingKind::Duration { .. } => add_minute_buckets(record, qty, range, &mut buckets),
            BookingKind::MultipleDays { charge_per_day } => {
                add_stay_buckets(record, qty, *charge_per_day, range, &mut buckets);
            }
            BookingKind::FixedBlocks { .. } => {
                add_stay_buckets(record, qty, false, range, &mut buckets);
            }
        }
    }

    buckets
}

pub fn quantity_at(buckets: &HashMap<BucketKey, Qty>, key: &BucketKey) -> Qty {
    buckets.get(key).copied().unwrap_or(0)
}

/// Slot-keyed aggregation. The booked quantity lands under the booking's
/// own slot key; with overlapping mode on it also lands under every other
/// defined slot for the date whose wall-clock range overlaps. Identical
/// ranges are counted once, under their own key only.
fn add_slot_buckets(
    config: &ProductConfig,
    record: &BookingRecord,
    qty: Qty,
    range: &DateRange,
    buckets: &mut HashMap<BucketKey, Qty>,
) {
    let date = record.start.date();
    if !range.contains(date) {
        return;
    }
    let slot = record.slot();
    *buckets.entry(BucketKey::Slot(date, slot)).or_default() += qty;

    if config.overlapping_slots {
        for sibling in config.slots_for(date) {
            if *sibling != slot && sibling.overlaps(&slot) {
                *buckets.entry(BucketKey::Slot(date, *sibling)).or_default() += qty;
            }
        }
    }
}

/// Minute-keyed aggregation for duration products: one bucket per
/// 60-second step across the stay, inclusive on both ends, with the
/// end pushed out a day when it equals the start. Clamped to the query
/// window so wide stays cannot blow up narrow queries.
fn add_minute_buckets(
    record: &BookingRecord,
    qty: Qty,
    range: &DateRange,
    buckets: &mut HashMap<BucketKey, Qty>,
) {
    let start = record.start.with_second(0).unwrap_or(record.start);
    let mut end = record.end.with_second(0).unwrap_or(record.end);
    if end == start {
        end += Duration::days(1);
    }

    let window_start = range.from.and_time(NaiveTime::MIN);
    let window_end = match range.to.and_hms_opt(23, 59, 0) {
        Some(t) => t,
        None => return,
    };
    let mut t = start.max(window_start);
    let end = end.min(window_end);
    while t <= end {
        *buckets.entry(BucketKey::Minute(t)).or_default() += qty;
        t += Duration::minutes(1);
    }
}

/// Day-keyed aggregation for stays: every calendar date of the stay, with
/// the checkout date excluded under charge-per-day.
fn add_stay_buckets(
    record: &BookingRecord,
    qty: Qty,
    charge_per_day: bool,
    range: &DateRange,
    buckets: &mut HashMap<BucketKey, Qty>,
) {
    let stay_start = record.start.date();
    let mut stay_end = record.end.date();
    if charge_per_day && stay_end > stay_start {
        stay_end = stay_end.pred_opt().unwrap_or(stay_end);
    }
    let mut date = stay_start.max(range.from);
    let stay_end = stay_end.min(range.to);
    while date <= stay_end {
        *buckets.entry(BucketKey::Day(date)).or_default() += qty;
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
}
