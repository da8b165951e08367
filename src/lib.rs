//! Availability and lockout resolution for bookable products.
//!
//! The engine answers one question — can this reservation be accepted? —
//! by merging independently-configured capacity rules (specific date,
//! recurring weekday, variation/attribute, resource, duration block)
//! under a fixed priority order, counting confirmed reservations against
//! them, deducting the shopper's own in-progress cart holds, and
//! intersecting across every resource a booking requires. Calendar
//! helpers enumerate blocked dates and find the first bookable date
//! inside a product's advance-booking horizon.
//!
//! Order lifecycle, cart session expiry, pricing, and settings storage
//! are external collaborators: they feed parsed records and configuration
//! in and consume verdicts out. Checks are stateless and side-effect
//! free; only [`engine::Engine::confirm_booking`] writes, re-validating
//! capacity immediately before the row lands.

pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;

pub use engine::{Engine, EngineError};
pub use model::{
    AttributeChoice, Availability, AvailabilityRequest, BookingKind, BookingRecord,
    BookingStatus, Capacity, CartHold, DateRange, InventoryRule, OverrideWindow, ProductConfig,
    ProductId, ProductState, Qty, Resource, ResourceAvailability, ResourceId, RuleScope,
    TimeSlot, TimeWindowOverride, VariationId,
};
