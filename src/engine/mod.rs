mod availability;
mod calendar;
mod error;
mod holds;
mod ledger;
mod mutations;
mod queries;
mod resources;
mod rules;
mod windows;

pub use availability::check;
pub use calendar::{blocked_dates, first_available};
pub use error::EngineError;
pub use holds::held_quantity;
pub use ledger::aggregate;
pub use resources::{check_resources, combine, open_slots};
pub use rules::{requested_units, resolve_capacity, resolve_resource_capacity};
pub use windows::is_bookable;

use chrono::NaiveDate;
use dashmap::{DashMap, DashSet};
use ulid::Ulid;

use crate::model::{CartHold, ProductId, ProductState, Resource, ResourceId};

/// The availability engine facade.
///
/// Collaborators feed it already-parsed product settings, the reservation
/// ledger, and session cart holds; every read is a pure function of that
/// snapshot at call time. There is no cross-request ordering guarantee:
/// capacity is re-aggregated on every read rather than decremented
/// atomically, so two concurrent checkouts can both observe the last
/// remaining unit. [`Engine::confirm_booking`] narrows that window by
/// re-checking under the product entry immediately before recording, but
/// the race is inherent and callers must treat a passed check as advisory
/// until confirmation succeeds.
pub struct Engine {
    products: DashMap<ProductId, ProductState>,
    resources: DashMap<ResourceId, Resource>,
    /// Cart holds keyed by shopper session.
    holds: DashMap<String, Vec<CartHold>>,
    /// Reverse lookup: booking row id → product id.
    booking_index: DashMap<Ulid, ProductId>,
    /// Site-wide holidays, alongside each product's own.
    global_holidays: DashSet<NaiveDate>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            resources: DashMap::new(),
            holds: DashMap::new(),
            booking_index: DashMap::new(),
            global_holidays: DashSet::new(),
        }
    }

    /// Resolve required resource ids to their configurations, hard-failing
    /// on any unknown id — silently ignoring one would allow overselling.
    pub(super) fn lookup_resources(
        &self,
        ids: &[ResourceId],
    ) -> Result<Vec<Resource>, EngineError> {
        if ids.len() > crate::limits::MAX_RESOURCES_PER_REQUEST {
            return Err(EngineError::LimitExceeded("too many required resources"));
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let res = self
                .resources
                .get(id)
                .ok_or(EngineError::UnknownResource(*id))?;
            out.push(res.value().clone());
        }
        Ok(out)
    }

    /// Snapshot of the caller's own session holds. Other shoppers' holds
    /// never count — holds are per-session soft reservations.
    pub(super) fn session_holds(&self, session: Option<&str>) -> Vec<CartHold> {
        session
            .and_then(|s| self.holds.get(s).map(|e| e.value().clone()))
            .unwrap_or_default()
    }
}
