use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use chrono::NaiveDate;

use crate::model::{
    Availability, AvailabilityRequest, BookingRecord, CartHold, ProductId, ResourceAvailability,
    ResourceId, TimeSlot,
};
use crate::observability;

use super::{availability, calendar, resources, windows, Engine, EngineError};

impl Engine {
    /// The combined availability verdict for one request: the product's
    /// own capacity when no resources are required, the multi-resource
    /// intersection otherwise.
    pub fn check(&self, req: &AvailabilityRequest) -> Result<Availability, EngineError> {
        let started = Instant::now();
        let result = self.check_inner(req);
        let label = match &result {
            Ok(a) => observability::availability_label(a),
            Err(_) => "error",
        };
        metrics::counter!(observability::CHECKS_TOTAL, "result" => label).increment(1);
        metrics::histogram!(observability::CHECK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    fn check_inner(&self, req: &AvailabilityRequest) -> Result<Availability, EngineError> {
        let state = self
            .products
            .get(&req.product)
            .ok_or(EngineError::UnknownProduct(req.product))?;
        let holds = self.session_holds(req.session.as_deref());
        if req.resources.is_empty() {
            availability::check(&state, None, &holds, req)
        } else {
            let required = self.lookup_resources(&req.resources)?;
            Ok(resources::check_resources(&state, &required, &holds, req)?.combined)
        }
    }

    /// Per-resource verdicts plus the combined one for a multi-resource
    /// request.
    pub fn check_resources(
        &self,
        req: &AvailabilityRequest,
    ) -> Result<ResourceAvailability, EngineError> {
        let state = self
            .products
            .get(&req.product)
            .ok_or(EngineError::UnknownProduct(req.product))?;
        let required = self.lookup_resources(&req.resources)?;
        let holds = self.session_holds(req.session.as_deref());
        resources::check_resources(&state, &required, &holds, req)
    }

    /// First calendar date from `start` passing every calendar filter,
    /// with site-wide holidays folded into the supplied lockout set.
    pub fn first_available(
        &self,
        product: ProductId,
        extra_lockouts: &HashSet<NaiveDate>,
        start: NaiveDate,
    ) -> Result<NaiveDate, EngineError> {
        let state = self
            .products
            .get(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        let mut lockouts = extra_lockouts.clone();
        for date in self.global_holidays.iter() {
            lockouts.insert(*date);
        }
        Ok(calendar::first_available(&state, &lockouts, start))
    }

    /// Dates in `[from, to]` whose combined availability across the
    /// product's required resources is exhausted.
    pub fn blocked_dates(
        &self,
        product: ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, EngineError> {
        let state = self
            .products
            .get(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        let required = self.lookup_resources(&state.config.resources)?;
        metrics::counter!(observability::BLOCKED_DATE_SCANS_TOTAL).increment(1);
        calendar::blocked_dates(&state, &required, &[], from, to)
    }

    /// The window-override decision alone — capacity is not consulted.
    pub fn is_bookable(
        &self,
        product: ProductId,
        date: NaiveDate,
        slot: Option<&TimeSlot>,
    ) -> Result<bool, EngineError> {
        let state = self
            .products
            .get(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        let config = &state.config;
        Ok(windows::is_bookable(
            &config.overrides,
            config.default_unbookable,
            date,
            slot,
        ))
    }

    /// The bookable slots for the request's date after capacity, override,
    /// and multi-resource overlap filtering.
    pub fn open_slots(&self, req: &AvailabilityRequest) -> Result<Vec<TimeSlot>, EngineError> {
        let state = self
            .products
            .get(&req.product)
            .ok_or(EngineError::UnknownProduct(req.product))?;
        let required = self.lookup_resources(&req.resources)?;
        let holds = self.session_holds(req.session.as_deref());
        resources::open_slots(&state, &required, &holds, req)
    }

    /// Slot definitions applying to a date (date-specific first, weekday
    /// defaults otherwise), before any capacity filtering.
    pub fn slots_for(
        &self,
        product: ProductId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, EngineError> {
        let state = self
            .products
            .get(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        Ok(state.config.slots_for(date).to_vec())
    }

    pub fn bookings_for(&self, product: ProductId) -> Result<Vec<BookingRecord>, EngineError> {
        let state = self
            .products
            .get(&product)
            .ok_or(EngineError::UnknownProduct(product))?;
        Ok(state.records.clone())
    }

    pub fn holds_for(&self, session: &str) -> Vec<CartHold> {
        self.session_holds(Some(session))
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.products.iter().map(|e| *e.key()).collect()
    }

    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.iter().map(|e| *e.key()).collect()
    }
}
