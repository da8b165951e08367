use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;

use crate::model::{
    AttributeChoice, BookingKind, Capacity, InventoryRule, ProductConfig, Qty, Resource,
    RuleScope, VariationId,
};

/// Resolve the capacity applicable to one (product, date, variation,
/// attributes, resource) scope. First match wins:
///
/// 1. Duration products resolve their `DurationMax` rule exclusively.
/// 2. A `SpecificDate` rule for the exact date (raw 0 meant unlimited
///    for that date, already lifted into `Capacity::Unlimited`).
/// 3. `VariationLockout` / `AttributeLockout`; the variation's own value
///    wins when both are configured.
/// 4. The resource's capacity chain.
/// 5. `RecurringWeekday` for the date's weekday.
/// 6. No applicable rule resolves to zero capacity, never to unlimited —
///    incomplete configuration must not open unbounded booking.
pub fn resolve_capacity(
    config: &ProductConfig,
    date: NaiveDate,
    variation: Option<VariationId>,
    attributes: &[AttributeChoice],
    resource: Option<&Resource>,
) -> Capacity {
    if let BookingKind::Duration { .. } = config.kind {
        return match find_duration_max(&config.rules) {
            Some(cap) => cap,
            None => {
                debug!(product = config.id.0, "no DurationMax rule; zero capacity");
                Capacity::Limited(0)
            }
        };
    }

    if let Some(cap) = find_specific_date(&config.rules, date) {
        return cap;
    }

    if let Some(v) = variation
        && let Some(cap) = find_variation_lockout(&config.rules, v)
    {
        return cap;
    }
    if let Some(cap) = find_attribute_lockout(&config.rules, attributes) {
        return cap;
    }

    if let Some(res) = resource {
        return resolve_resource_capacity(config, res, date);
    }

    if let Some(cap) = find_weekday(&config.rules, date.weekday()) {
        return cap;
    }

    debug!(
        product = config.id.0,
        %date,
        "no applicable capacity rule; zero capacity"
    );
    Capacity::Limited(0)
}

/// A resource's own capacity chain: its `SpecificDate` rules, then its
/// `ResourceLockout`, then its `RecurringWeekday` rules, then the
/// configured quantity. With `lockout_as_resource_max` the product-level
/// date lockout substitutes for the configured quantity.
pub fn resolve_resource_capacity(
    config: &ProductConfig,
    resource: &Resource,
    date: NaiveDate,
) -> Capacity {
    if let Some(cap) = find_specific_date(&resource.rules, date) {
        return cap;
    }
    if let Some(cap) = resource.rules.iter().find_map(|r| match &r.scope {
        RuleScope::ResourceLockout(id) if *id == resource.id => Some(r.capacity),
        _ => None,
    }) {
        return cap;
    }
    if let Some(cap) = find_weekday(&resource.rules, date.weekday()) {
        return cap;
    }

    if config.lockout_as_resource_max
        && let Some(cap) = product_date_lockout(config, date)
    {
        return cap;
    }
    Capacity::from_raw(resource.quantity)
}

/// The product-level date lockout: specific date first, else the
/// recurring weekday value.
pub fn product_date_lockout(config: &ProductConfig, date: NaiveDate) -> Option<Capacity> {
    find_specific_date(&config.rules, date)
        .or_else(|| find_weekday(&config.rules, date.weekday()))
}

/// Inventory units consumed per purchased unit from attribute lockouts:
/// the sum of the chosen values of every attribute that carries a lockout
/// rule, floored at 1.
pub fn lockout_multiplier(rules: &[InventoryRule], attributes: &[AttributeChoice]) -> Qty {
    let sum: Qty = attributes
        .iter()
        .filter(|choice| {
            rules.iter().any(|r| {
                matches!(&r.scope, RuleScope::AttributeLockout(name) if *name == choice.name)
            })
        })
        .map(|choice| choice.value)
        .sum();
    sum.max(1)
}

/// Person multiplier: sum of the breakdown when per-person lockout is on.
pub fn person_multiplier(per_person: bool, persons: &[Qty]) -> Qty {
    let sum: Qty = persons.iter().sum();
    if per_person && sum > 0 { sum } else { 1 }
}

/// Total inventory units a request consumes, for `quantity <= remaining`
/// validation before commit.
pub fn requested_units(
    config: &ProductConfig,
    quantity: Qty,
    attributes: &[AttributeChoice],
    persons: &[Qty],
) -> Qty {
    quantity
        * lockout_multiplier(&config.rules, attributes)
        * person_multiplier(config.per_person_lockout, persons)
}

fn find_specific_date(rules: &[InventoryRule], date: NaiveDate) -> Option<Capacity> {
    rules.iter().find_map(|r| match &r.scope {
        RuleScope::SpecificDate(d) if *d == date => Some(r.capacity),
        _ => None,
    })
}

fn find_weekday(rules: &[InventoryRule], weekday: Weekday) -> Option<Capacity> {
    rules.iter().find_map(|r| match &r.scope {
        RuleScope::RecurringWeekday(w) if *w == weekday => Some(r.capacity),
        _ => None,
    })
}

fn find_variation_lockout(rules: &[InventoryRule], variation: VariationId) -> Option<Capacity> {
    rules.iter().find_map(|r| match &r.scope {
        RuleScope::VariationLockout(v) if *v == variation => Some(r.capacity),
        _ => None,
    })
}

/// The scarcest capacity across every attribute lockout matching a chosen
/// attribute.
fn find_attribute_lockout(
    rules: &[InventoryRule],
    attributes: &[AttributeChoice],
) -> Option<Capacity> {
    rules
        .iter()
        .filter_map(|r| match &r.scope {
            RuleScope::AttributeLockout(name)
                if attributes.iter().any(|a| a.name == *name) =>
            {
                Some(r.capacity)
            }
            _ => None,
        })
        .min_by_key(|cap| match cap {
            Capacity::Unlimited => u64::from(u32::MAX) + 1,
            Capacity::Limited(n) => u64::from(*n),
        })
}

fn find_duration_max(rules: &[InventoryRule]) -> Option<Capacity> {
    rules.iter().find_map(|r| match &r.scope {
        RuleScope::DurationMax => Some(r.capacity),
        _ => None,
    })
}
