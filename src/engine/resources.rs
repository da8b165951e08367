use std::collections::BTreeMap;

use crate::model::{
    Availability, AvailabilityRequest, CartHold, ProductState, Resource, ResourceAvailability,
    TimeSlot,
};

use super::error::EngineError;
use super::{availability, windows};

/// Check a request against every required resource and combine.
///
/// A multi-resource booking needs all resources simultaneously free, so
/// the combined verdict is the scarcest one: any exhausted resource
/// exhausts the whole request, finite quantities combine by minimum, and
/// unlimited resources never constrain the minimum.
pub fn check_resources(
    state: &ProductState,
    resources: &[Resource],
    session_holds: &[CartHold],
    req: &AvailabilityRequest,
) -> Result<ResourceAvailability, EngineError> {
    if resources.is_empty() {
        let combined = availability::check(state, None, session_holds, req)?;
        return Ok(ResourceAvailability { per_resource: BTreeMap::new(), combined });
    }

    let mut per_resource = BTreeMap::new();
    for res in resources {
        let verdict = availability::check(state, Some(res), session_holds, req)?;
        per_resource.insert(res.id, verdict);
    }
    let combined = combine(per_resource.values());
    Ok(ResourceAvailability { per_resource, combined })
}

/// Fold per-resource verdicts into the combined one. An empty iterator is
/// neutral (`Unlimited`).
pub fn combine<'a>(verdicts: impl IntoIterator<Item = &'a Availability>) -> Availability {
    let mut min: Option<u32> = None;
    for v in verdicts {
        match v {
            Availability::Exhausted | Availability::SlotExhausted => {
                return Availability::Exhausted;
            }
            Availability::Finite(n) => min = Some(min.map_or(*n, |m| m.min(*n))),
            Availability::Unlimited => {}
        }
    }
    match min {
        Some(n) => Availability::Finite(n),
        None => Availability::Unlimited,
    }
}

/// The bookable slots of a date after capacity, override, and
/// multi-resource overlap filtering.
///
/// A slot survives when the combined verdict for it is non-exhausted, the
/// product's and every required resource's window overrides admit it, and
/// it does not overlap a slot any required resource has already had fully
/// consumed — a resource busy 09:00-10:00 cannot serve 09:30-10:30 even
/// when the labels differ.
pub fn open_slots(
    state: &ProductState,
    resources: &[Resource],
    session_holds: &[CartHold],
    req: &AvailabilityRequest,
) -> Result<Vec<TimeSlot>, EngineError> {
    let config = &state.config;
    let slots = config.slots_for(req.date);
    if slots.is_empty() {
        return Ok(Vec::new());
    }

    // Slots already fully consumed on some required resource.
    let mut consumed: Vec<TimeSlot> = Vec::new();
    for res in resources {
        for slot in slots {
            let mut probe = req.clone();
            probe.slot = Some(*slot);
            if availability::check(state, Some(res), session_holds, &probe)?.is_exhausted() {
                consumed.push(*slot);
            }
        }
    }

    let mut open = Vec::new();
    for slot in slots {
        if !windows::is_bookable(&config.overrides, config.default_unbookable, req.date, Some(slot))
        {
            continue;
        }
        if resources.iter().any(|res| {
            !windows::is_bookable(&res.overrides, false, req.date, Some(slot))
        }) {
            continue;
        }
        if consumed.iter().any(|c| c.overlaps(slot)) {
            continue;
        }
        let mut probe = req.clone();
        probe.slot = Some(*slot);
        let verdict = check_resources(state, resources, session_holds, &probe)?;
        if !verdict.combined.is_exhausted() {
            open.push(*slot);
        }
    }
    Ok(open)
}
