use std::collections::HashMap;

use chrono::{Duration, NaiveTime};

use crate::model::{
    Availability, AvailabilityRequest, BookingKind, BucketKey, Capacity, CartHold, DateRange,
    ProductState, Qty, Resource, ResourceId, TimeSlot,
};

use super::error::EngineError;
use super::{holds, ledger, rules};

// ── Availability Algorithm ────────────────────────────────────────

/// Answer one availability question against a snapshot of the product
/// state, an optional resource (with its own rule set), and the caller's
/// session holds.
///
/// Stateless: nothing is reserved here. Two simultaneous callers can both
/// observe the same remaining quantity — the check-then-act race is
/// inherent to re-aggregating on every read, so callers must re-check
/// immediately before persisting a reservation.
pub fn check(
    state: &ProductState,
    resource: Option<&Resource>,
    session_holds: &[CartHold],
    req: &AvailabilityRequest,
) -> Result<Availability, EngineError> {
    validate_request(state, req)?;
    let config = &state.config;

    // Explicit unlimited-override row for the date: outranks arithmetic.
    if state.unlimited_dates.contains(&req.date) {
        return Ok(Availability::Unlimited);
    }

    let capacity = rules::resolve_capacity(
        config,
        req.date,
        req.variation,
        &req.attributes,
        resource,
    );
    let cap = match capacity {
        Capacity::Unlimited => return Ok(Availability::Unlimited),
        Capacity::Limited(n) => n,
    };

    let resource_id = resource.map(|r| r.id);

    match &config.kind {
        BookingKind::Duration { block_minutes } => {
            check_duration_block(state, session_holds, req, cap, resource_id, *block_minutes)
        }
        BookingKind::DateTime => match req.slot {
            Some(slot) => check_slot(state, session_holds, req, cap, resource_id, &slot),
            None => check_any_slot(state, session_holds, req, cap, resource_id),
        },
        _ => {
            let buckets = ledger::aggregate(state, &DateRange::single(req.date), resource_id);
            let booked = ledger::quantity_at(&buckets, &BucketKey::Day(req.date));
            let held = holds::held_quantity(
                config,
                session_holds,
                req.variation,
                resource_id,
                req.date,
                None,
            );
            Ok(verdict(cap, booked, held))
        }
    }
}

fn validate_request(state: &ProductState, req: &AvailabilityRequest) -> Result<(), EngineError> {
    if req.quantity == 0 {
        return Err(EngineError::InvalidQuantity(0));
    }
    if let Some(v) = req.variation
        && !state.config.variations.contains(&v)
    {
        return Err(EngineError::UnknownVariation(v));
    }
    if let Some(slot) = &req.slot
        && let Some(to) = slot.to
        && to <= slot.from
    {
        return Err(EngineError::InvalidRange {
            start: req.date.and_time(slot.from),
            end: req.date.and_time(to),
        });
    }
    Ok(())
}

/// One fixed slot: booked + held against the slot bucket (which already
/// carries overlap fan-out from the ledger), with a sibling-slot probe
/// distinguishing "slot taken" from "date gone".
fn check_slot(
    state: &ProductState,
    session_holds: &[CartHold],
    req: &AvailabilityRequest,
    cap: Qty,
    resource_id: Option<ResourceId>,
    slot: &TimeSlot,
) -> Result<Availability, EngineError> {
    let config = &state.config;
    let buckets = ledger::aggregate(state, &DateRange::single(req.date), resource_id);
    let booked = ledger::quantity_at(&buckets, &BucketKey::Slot(req.date, *slot));
    let held = holds::held_quantity(
        config,
        session_holds,
        req.variation,
        resource_id,
        req.date,
        Some(slot),
    );

    let remaining = cap.saturating_sub(booked).saturating_sub(held);
    if remaining > 0 {
        return Ok(Availability::Finite(remaining));
    }

    let sibling_open = config.slots_for(req.date).iter().any(|other| {
        if other == slot {
            return false;
        }
        let booked = ledger::quantity_at(&buckets, &BucketKey::Slot(req.date, *other));
        let held = holds::held_quantity(
            config,
            session_holds,
            req.variation,
            resource_id,
            req.date,
            Some(other),
        );
        cap.saturating_sub(booked).saturating_sub(held) > 0
    });
    if sibling_open {
        Ok(Availability::SlotExhausted)
    } else {
        Ok(Availability::Exhausted)
    }
}

/// No slot given on a date-time product: report the best remaining across
/// the date's slots; exhausted only when every slot is (or none resolve).
fn check_any_slot(
    state: &ProductState,
    session_holds: &[CartHold],
    req: &AvailabilityRequest,
    cap: Qty,
    resource_id: Option<ResourceId>,
) -> Result<Availability, EngineError> {
    let config = &state.config;
    let slots = config.slots_for(req.date);
    if slots.is_empty() {
        return Ok(Availability::Exhausted);
    }
    let buckets = ledger::aggregate(state, &DateRange::single(req.date), resource_id);
    let best = slots
        .iter()
        .map(|slot| {
            let booked = ledger::quantity_at(&buckets, &BucketKey::Slot(req.date, *slot));
            let held = holds::held_quantity(
                config,
                session_holds,
                req.variation,
                resource_id,
                req.date,
                Some(slot),
            );
            cap.saturating_sub(booked).saturating_sub(held)
        })
        .max()
        .unwrap_or(0);
    if best == 0 {
        Ok(Availability::Exhausted)
    } else {
        Ok(Availability::Finite(best))
    }
}

/// Duration products: peak per-minute concurrency across the requested
/// block, against the single `DurationMax` capacity.
fn check_duration_block(
    state: &ProductState,
    session_holds: &[CartHold],
    req: &AvailabilityRequest,
    cap: Qty,
    resource_id: Option<ResourceId>,
    block_minutes: u32,
) -> Result<Availability, EngineError> {
    let config = &state.config;
    let start_time = req.slot.map(|s| s.from).unwrap_or(NaiveTime::MIN);
    let block_start = req.date.and_time(start_time);
    let block_end = block_start + Duration::minutes(i64::from(block_minutes));

    let range = DateRange::new(req.date, block_end.date());
    let buckets = ledger::aggregate(state, &range, resource_id);
    let booked = peak_minute_load(&buckets, block_start, block_end);
    let held = holds::held_quantity(
        config,
        session_holds,
        req.variation,
        resource_id,
        req.date,
        req.slot.as_ref(),
    );

    Ok(verdict(cap, booked, held))
}

/// Highest minute-bucket load over `[start, end)`.
fn peak_minute_load(
    buckets: &HashMap<BucketKey, Qty>,
    start: chrono::NaiveDateTime,
    end: chrono::NaiveDateTime,
) -> Qty {
    let mut peak = 0;
    let mut t = start;
    while t < end {
        peak = peak.max(ledger::quantity_at(buckets, &BucketKey::Minute(t)));
        t += Duration::minutes(1);
    }
    peak
}

/// Remaining = capacity − booked − held, clamped to ≥ 0.
fn verdict(cap: Qty, booked: Qty, held: Qty) -> Availability {
    let remaining = cap.saturating_sub(booked).saturating_sub(held);
    if remaining == 0 {
        Availability::Exhausted
    } else {
        Availability::Finite(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttributeChoice, BookingRecord, BookingStatus, InventoryRule, ProductConfig, ProductId,
        RuleScope, VariationId,
    };
    use chrono::{NaiveDate, Weekday};
    use std::collections::{HashMap as Map, HashSet};
    use ulid::Ulid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(from: (u32, u32), to: (u32, u32)) -> TimeSlot {
        TimeSlot::new(t(from.0, from.1), Some(t(to.0, to.1)))
    }

    fn config(kind: BookingKind, rules: Vec<InventoryRule>) -> ProductConfig {
        ProductConfig {
            id: ProductId(1),
            kind,
            rules,
            overrides: Vec::new(),
            weekday_slots: Map::new(),
            date_slots: Map::new(),
            resources: Vec::new(),
            variations: HashSet::new(),
            holidays: HashSet::new(),
            holiday_ranges: Vec::new(),
            bookable_weekdays: HashSet::new(),
            max_advance_days: 365,
            per_person_lockout: false,
            overlapping_slots: false,
            lockout_as_resource_max: false,
            default_unbookable: false,
        }
    }

    fn day_record(date: NaiveDate, quantity: Qty) -> BookingRecord {
        BookingRecord {
            id: Ulid::new(),
            product: ProductId(1),
            variation: None,
            resource: None,
            start: date.and_time(NaiveTime::MIN),
            end: date.and_time(NaiveTime::MIN),
            quantity,
            persons: Vec::new(),
            status: BookingStatus::Confirmed,
        }
    }

    fn slot_record(date: NaiveDate, s: TimeSlot, quantity: Qty) -> BookingRecord {
        let end = match s.to {
            Some(to) => date.and_time(to),
            None => match date.succ_opt() {
                Some(next) => next.and_time(NaiveTime::MIN),
                None => date.and_time(NaiveTime::MIN),
            },
        };
        BookingRecord {
            id: Ulid::new(),
            product: ProductId(1),
            variation: None,
            resource: None,
            start: date.and_time(s.from),
            end,
            quantity,
            persons: Vec::new(),
            status: BookingStatus::Confirmed,
        }
    }

    // Monday throughout.
    fn monday() -> NaiveDate {
        d(2025, 6, 2)
    }

    #[test]
    fn weekday_capacity_minus_bookings() {
        let mut state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 3)],
        ));
        let req = AvailabilityRequest::new(ProductId(1), monday(), 2);
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Finite(3));

        state.insert_record(day_record(monday(), 2));
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Finite(1));
    }

    #[test]
    fn unlimited_capacity_ignores_bookings() {
        let mut state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 0)],
        ));
        state.insert_record(day_record(monday(), 50));
        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Unlimited);
    }

    #[test]
    fn explicit_unlimited_row_beats_arithmetic() {
        let mut state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 2)],
        ));
        state.insert_record(day_record(monday(), 2));
        state.unlimited_dates.insert(monday());
        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Unlimited);
    }

    #[test]
    fn overbooked_clamps_to_exhausted_not_negative() {
        let mut state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 2)],
        ));
        state.insert_record(day_record(monday(), 5));
        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Exhausted);
    }

    #[test]
    fn overlapping_booking_consumes_target_slot() {
        let mut cfg = config(
            BookingKind::DateTime,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 2)],
        );
        cfg.overlapping_slots = true;
        cfg.weekday_slots.insert(
            Weekday::Mon,
            vec![slot((8, 30), (9, 30)), slot((9, 0), (10, 0))],
        );
        let mut state = ProductState::new(cfg);
        state.insert_record(slot_record(monday(), slot((8, 30), (9, 30)), 1));

        let mut req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        req.slot = Some(slot((9, 0), (10, 0)));
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Finite(1));
    }

    #[test]
    fn full_slot_with_open_sibling_is_slot_exhausted() {
        let mut cfg = config(
            BookingKind::DateTime,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 1)],
        );
        cfg.weekday_slots.insert(
            Weekday::Mon,
            vec![slot((9, 0), (10, 0)), slot((14, 0), (15, 0))],
        );
        let mut state = ProductState::new(cfg);
        state.insert_record(slot_record(monday(), slot((9, 0), (10, 0)), 1));

        let mut req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        req.slot = Some(slot((9, 0), (10, 0)));
        assert_eq!(
            check(&state, None, &[], &req).unwrap(),
            Availability::SlotExhausted
        );

        // Fill the sibling too: now the whole date is gone.
        state.insert_record(slot_record(monday(), slot((14, 0), (15, 0)), 1));
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Exhausted);
    }

    #[test]
    fn cart_hold_deducts_from_remaining() {
        let state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 3)],
        ));
        let held = vec![CartHold {
            line: Ulid::new(),
            product: ProductId(1),
            variation: None,
            resource: None,
            date: monday(),
            slot: None,
            quantity: 2,
            persons: Vec::new(),
        }];
        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        assert_eq!(check(&state, None, &held, &req).unwrap(), Availability::Finite(1));
    }

    #[test]
    fn duration_peak_concurrency_limits_block() {
        let mut state = ProductState::new(config(
            BookingKind::Duration { block_minutes: 60 },
            vec![InventoryRule::new(RuleScope::DurationMax, 2)],
        ));
        // Two blocks overlap 09:30-10:00.
        state.insert_record(slot_record(monday(), slot((9, 0), (10, 0)), 1));
        state.insert_record(slot_record(monday(), slot((9, 30), (10, 30)), 1));

        let mut req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        req.slot = Some(slot((9, 45), (10, 45)));
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Exhausted);

        req.slot = Some(slot((11, 0), (12, 0)));
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Finite(2));
    }

    #[test]
    fn slotless_date_time_reports_best_slot() {
        let mut cfg = config(
            BookingKind::DateTime,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 2)],
        );
        cfg.weekday_slots.insert(
            Weekday::Mon,
            vec![slot((9, 0), (10, 0)), slot((14, 0), (15, 0))],
        );
        let mut state = ProductState::new(cfg);
        state.insert_record(slot_record(monday(), slot((9, 0), (10, 0)), 2));

        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Finite(2));
    }

    #[test]
    fn date_time_without_slots_is_exhausted() {
        let state = ProductState::new(config(
            BookingKind::DateTime,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 2)],
        ));
        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Exhausted);
    }

    #[test]
    fn zero_quantity_rejected() {
        let state = ProductState::new(config(BookingKind::SingleDay, vec![]));
        let req = AvailabilityRequest::new(ProductId(1), monday(), 0);
        assert_eq!(
            check(&state, None, &[], &req),
            Err(EngineError::InvalidQuantity(0))
        );
    }

    #[test]
    fn unknown_variation_rejected() {
        let mut cfg = config(BookingKind::SingleDay, vec![]);
        cfg.variations.insert(VariationId(1));
        let state = ProductState::new(cfg);
        let mut req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        req.variation = Some(VariationId(2));
        assert_eq!(
            check(&state, None, &[], &req),
            Err(EngineError::UnknownVariation(VariationId(2)))
        );
    }

    #[test]
    fn inverted_slot_rejected() {
        let state = ProductState::new(config(BookingKind::DateTime, vec![]));
        let mut req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        req.slot = Some(TimeSlot { from: t(10, 0), to: Some(t(9, 0)) });
        assert!(matches!(
            check(&state, None, &[], &req),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn idempotent_on_unchanged_snapshot() {
        let mut state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::RecurringWeekday(Weekday::Mon), 4)],
        ));
        state.insert_record(day_record(monday(), 1));
        let req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        let first = check(&state, None, &[], &req).unwrap();
        let second = check(&state, None, &[], &req).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn attribute_lockout_capacity_applies() {
        let state = ProductState::new(config(
            BookingKind::SingleDay,
            vec![InventoryRule::new(RuleScope::AttributeLockout("size".into()), 2)],
        ));
        let mut req = AvailabilityRequest::new(ProductId(1), monday(), 1);
        req.attributes = vec![AttributeChoice { name: "size".into(), value: 2 }];
        assert_eq!(check(&state, None, &[], &req).unwrap(), Availability::Finite(2));
    }
}
