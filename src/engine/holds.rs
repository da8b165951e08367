use chrono::NaiveDate;

use crate::model::{CartHold, ProductConfig, Qty, ResourceId, TimeSlot, VariationId};

/// Quantity already soft-reserved by the current shopper's cart lines for
/// one (product, variation, resource, date, slot) scope.
///
/// Only the caller's own session holds are ever passed in — holds are
/// per-session soft reservations, not a global lock. Hold quantities are
/// in inventory units: the cart collaborator applies attribute lockout
/// multipliers when it creates the line.
pub fn held_quantity(
    config: &ProductConfig,
    holds: &[CartHold],
    variation: Option<VariationId>,
    resource: Option<ResourceId>,
    date: NaiveDate,
    slot: Option<&TimeSlot>,
) -> Qty {
    holds
        .iter()
        .filter(|h| h.product == config.id)
        .filter(|h| h.resource == resource)
        .filter(|h| variation_matches(h.variation, variation))
        .filter(|h| h.date == date)
        .filter(|h| slot_matches(config, h.slot.as_ref(), slot))
        .map(|h| h.counted_quantity(config.per_person_lockout))
        .sum()
}

fn variation_matches(held: Option<VariationId>, requested: Option<VariationId>) -> bool {
    match (held, requested) {
        (Some(h), Some(r)) => h == r,
        _ => true,
    }
}

/// A held line consumes the target slot when the ranges are identical
/// and, in overlap mode, when they merely overlap — mirroring the
/// ledger's fan-out so two overlapping lines in one cart cannot bypass
/// capacity. A slotless hold pins the whole date.
fn slot_matches(config: &ProductConfig, held: Option<&TimeSlot>, target: Option<&TimeSlot>) -> bool {
    match (held, target) {
        (None, _) | (_, None) => true,
        (Some(h), Some(t)) => {
            if h == t {
                return true;
            }
            config.overlapping_slots && h.overlaps(t)
        }
    }
}
