use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{
    AvailabilityRequest, BookingKind, BookingRecord, BookingStatus, CartHold, ProductConfig,
    ProductId, ProductState, Resource, TimeSlot,
};
use crate::observability;

use super::{resources, rules, Engine, EngineError};

impl Engine {
    /// Install or replace a product's configuration. Existing ledger rows
    /// and unlimited-date markers survive a replace.
    pub fn upsert_product(&self, config: ProductConfig) -> Result<(), EngineError> {
        validate_config(&config)?;
        match self.products.get_mut(&config.id) {
            Some(mut entry) => {
                info!(product = config.id.0, "replacing product configuration");
                entry.config = config;
            }
            None => {
                if self.products.len() >= MAX_PRODUCTS {
                    return Err(EngineError::LimitExceeded("too many products"));
                }
                info!(product = config.id.0, "registering product");
                self.products.insert(config.id, ProductState::new(config));
            }
        }
        Ok(())
    }

    pub fn remove_product(&self, id: ProductId) -> Result<(), EngineError> {
        let (_, state) = self
            .products
            .remove(&id)
            .ok_or(EngineError::UnknownProduct(id))?;
        for record in &state.records {
            self.booking_index.remove(&record.id);
        }
        Ok(())
    }

    pub fn upsert_resource(&self, resource: Resource) -> Result<(), EngineError> {
        if let Some(ref n) = resource.name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("resource name too long"));
        }
        if resource.rules.len() > MAX_RULES {
            return Err(EngineError::LimitExceeded("too many rules on resource"));
        }
        if resource.overrides.len() > MAX_OVERRIDES {
            return Err(EngineError::LimitExceeded("too many overrides on resource"));
        }
        if !self.resources.contains_key(&resource.id) && self.resources.len() >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        self.resources.insert(resource.id, resource);
        Ok(())
    }

    /// Remove a resource. Refused while any product still requires it —
    /// dropping it silently would let those products stop intersecting
    /// against a real capacity.
    pub fn remove_resource(&self, id: crate::model::ResourceId) -> Result<(), EngineError> {
        let in_use = self
            .products
            .iter()
            .any(|entry| entry.config.resources.contains(&id));
        if in_use {
            return Err(EngineError::ResourceInUse(id));
        }
        self.resources
            .remove(&id)
            .ok_or(EngineError::UnknownResource(id))?;
        Ok(())
    }

    /// Record a new reservation after re-validating capacity.
    ///
    /// This is the "sanity check" step: availability observed earlier may
    /// have been consumed in the interim, so the check is re-run here,
    /// under this product's map entry, immediately before the row is
    /// inserted. That serializes confirmations per product in-process; it
    /// cannot protect against an external writer feeding rows directly.
    /// The caller's own cart hold for this line is deliberately not
    /// counted — it would veto the very line being converted.
    pub fn confirm_booking(&self, record: BookingRecord) -> Result<(), EngineError> {
        validate_record(&record)?;
        if self.booking_index.contains_key(&record.id) {
            return Err(EngineError::AlreadyExists(record.id));
        }
        let required = match record.resource {
            Some(rid) => self.lookup_resources(&[rid])?,
            None => Vec::new(),
        };

        let mut entry = self
            .products
            .get_mut(&record.product)
            .ok_or(EngineError::UnknownProduct(record.product))?;
        if entry.records.len() >= MAX_RECORDS_PER_PRODUCT {
            return Err(EngineError::LimitExceeded("too many records on product"));
        }

        let units = rules::requested_units(&entry.config, record.quantity, &[], &record.persons);
        for date in stay_dates(&entry.config, &record) {
            let mut probe = request_for(&entry, &record);
            probe.date = date;
            let verdict = resources::check_resources(&entry, &required, &[], &probe)?;
            let remaining = match verdict.combined {
                crate::model::Availability::Unlimited => continue,
                crate::model::Availability::Finite(n) => n,
                _ => 0,
            };
            if units > remaining {
                metrics::counter!(observability::BOOKINGS_REJECTED_TOTAL).increment(1);
                return Err(EngineError::CapacityExceeded {
                    date,
                    requested: units,
                    remaining,
                });
            }
        }

        info!(
            booking = %record.id,
            product = record.product.0,
            date = %record.start.date(),
            quantity = record.quantity,
            "booking confirmed"
        );
        metrics::counter!(observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        self.booking_index.insert(record.id, record.product);
        entry.insert_record(record);
        Ok(())
    }

    /// Flip a row's status. The row stays — a cancelled row simply stops
    /// counting against capacity.
    pub fn update_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<(), EngineError> {
        let product = *self
            .booking_index
            .get(&id)
            .ok_or(EngineError::NotFound(id))?;
        let mut entry = self
            .products
            .get_mut(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        let record = entry.record_mut(id).ok_or(EngineError::NotFound(id))?;
        record.status = status;
        info!(booking = %id, ?status, "booking status updated");
        Ok(())
    }

    pub fn cancel_booking(&self, id: Ulid) -> Result<(), EngineError> {
        self.update_booking_status(id, BookingStatus::Cancelled)
    }

    /// Record the explicit "0/0 row" sentinel: the date is unlimited even
    /// when a capacity rule says otherwise.
    pub fn mark_unlimited(&self, product: ProductId, date: chrono::NaiveDate) -> Result<(), EngineError> {
        let mut entry = self
            .products
            .get_mut(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        entry.unlimited_dates.insert(date);
        Ok(())
    }

    pub fn clear_unlimited(&self, product: ProductId, date: chrono::NaiveDate) -> Result<(), EngineError> {
        let mut entry = self
            .products
            .get_mut(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        entry.unlimited_dates.remove(&date);
        Ok(())
    }

    /// Soft-reserve a cart line for a shopper session. Replaces any
    /// existing hold with the same line id.
    pub fn place_hold(&self, session: &str, hold: CartHold) -> Result<(), EngineError> {
        if session.len() > MAX_SESSION_KEY_LEN {
            return Err(EngineError::LimitExceeded("session key too long"));
        }
        if hold.quantity == 0 {
            return Err(EngineError::InvalidQuantity(0));
        }
        if hold.persons.len() > MAX_PERSON_FIELDS {
            return Err(EngineError::LimitExceeded("too many person fields"));
        }
        if !self.products.contains_key(&hold.product) {
            return Err(EngineError::UnknownProduct(hold.product));
        }
        if let Some(rid) = hold.resource
            && !self.resources.contains_key(&rid)
        {
            return Err(EngineError::UnknownResource(rid));
        }

        let mut lines = self.holds.entry(session.to_string()).or_default();
        let replacing = lines.iter().position(|l| l.line == hold.line);
        match replacing {
            Some(pos) => lines[pos] = hold,
            None => {
                if lines.len() >= MAX_HOLDS_PER_SESSION {
                    return Err(EngineError::LimitExceeded("too many holds in session"));
                }
                lines.push(hold);
                metrics::gauge!(observability::HOLDS_ACTIVE).increment(1.0);
            }
        }
        Ok(())
    }

    /// Release one cart line (line removed from cart, or converted at
    /// checkout).
    pub fn release_hold(&self, session: &str, line: Ulid) -> Result<(), EngineError> {
        let mut lines = self
            .holds
            .get_mut(session)
            .ok_or(EngineError::NotFound(line))?;
        let pos = lines
            .iter()
            .position(|l| l.line == line)
            .ok_or(EngineError::NotFound(line))?;
        lines.remove(pos);
        metrics::gauge!(observability::HOLDS_ACTIVE).decrement(1.0);
        Ok(())
    }

    /// Drop every hold of a session (cart emptied or session expired —
    /// expiry itself is the cart collaborator's clock, not this engine's).
    pub fn clear_session(&self, session: &str) {
        if let Some((_, lines)) = self.holds.remove(session) {
            metrics::gauge!(observability::HOLDS_ACTIVE).decrement(lines.len() as f64);
        }
    }

    pub fn add_global_holiday(&self, date: chrono::NaiveDate) {
        self.global_holidays.insert(date);
    }

    pub fn remove_global_holiday(&self, date: chrono::NaiveDate) {
        self.global_holidays.remove(&date);
    }
}

/// Boundary validation for collaborator-supplied configuration.
fn validate_config(config: &ProductConfig) -> Result<(), EngineError> {
    if config.rules.len() > MAX_RULES {
        return Err(EngineError::LimitExceeded("too many rules on product"));
    }
    if config.overrides.len() > MAX_OVERRIDES {
        return Err(EngineError::LimitExceeded("too many overrides on product"));
    }
    for slots in config
        .weekday_slots
        .values()
        .chain(config.date_slots.values())
    {
        if slots.len() > MAX_SLOTS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many slots on one day"));
        }
        for slot in slots {
            validate_slot(slot)?;
        }
    }
    for range in &config.holiday_ranges {
        if range.from > range.to {
            return Err(EngineError::InvalidRange {
                start: range.from.and_time(chrono::NaiveTime::MIN),
                end: range.to.and_time(chrono::NaiveTime::MIN),
            });
        }
    }
    if let BookingKind::Duration { block_minutes } = config.kind
        && block_minutes == 0
    {
        return Err(EngineError::LimitExceeded("duration block must be positive"));
    }
    Ok(())
}

fn validate_slot(slot: &TimeSlot) -> Result<(), EngineError> {
    if let Some(to) = slot.to
        && to <= slot.from
    {
        // Recurring definitions carry no date; the epoch anchors the message.
        let anchor = chrono::NaiveDate::default();
        return Err(EngineError::InvalidRange {
            start: anchor.and_time(slot.from),
            end: anchor.and_time(to),
        });
    }
    Ok(())
}

/// Boundary validation of a record's own invariants.
fn validate_record(record: &BookingRecord) -> Result<(), EngineError> {
    if record.start > record.end {
        return Err(EngineError::InvalidRange {
            start: record.start,
            end: record.end,
        });
    }
    if record.quantity == 0 {
        return Err(EngineError::InvalidQuantity(0));
    }
    if record.persons.len() > MAX_PERSON_FIELDS {
        return Err(EngineError::LimitExceeded("too many person fields"));
    }
    if (record.end - record.start).num_days() > MAX_STAY_DAYS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// The dates a record's sanity check must pass on: the start date for
/// single-date kinds, every occupied date for stays (checkout excluded
/// under charge-per-day, matching the ledger's counting).
fn stay_dates(config: &ProductConfig, record: &BookingRecord) -> Vec<chrono::NaiveDate> {
    let start = record.start.date();
    let mut end = record.end.date();
    match config.kind {
        BookingKind::MultipleDays { charge_per_day } => {
            if charge_per_day && end > start {
                end = end.pred_opt().unwrap_or(end);
            }
        }
        BookingKind::FixedBlocks { .. } => {}
        _ => end = start,
    }
    crate::model::DateRange::new(start, end.max(start)).days().collect()
}

/// The availability question implied by a record about to be committed.
fn request_for(state: &ProductState, record: &BookingRecord) -> AvailabilityRequest {
    let slot = match state.config.kind {
        BookingKind::DateTime | BookingKind::Duration { .. } => Some(record.slot()),
        _ => None,
    };
    AvailabilityRequest {
        product: record.product,
        variation: record.variation,
        attributes: Vec::new(),
        resources: record.resource.into_iter().collect(),
        date: record.start.date(),
        slot,
        quantity: record.quantity,
        persons: record.persons.clone(),
        session: None,
    }
}
