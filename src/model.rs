use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Booking quantity — validated to be ≥ 1 at the engine boundary.
pub type Qty = u32;

pub const MINUTES_PER_DAY: u32 = 1440;

// ── Ids ──────────────────────────────────────────────────────────

/// Product id from the upstream settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub u64);

/// Variation id from the upstream settings store. Absent variation is `Option<VariationId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariationId(pub u64);

/// Resource id from the upstream settings store. Absent resource is `Option<ResourceId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product {}", self.0)
    }
}

impl fmt::Display for VariationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variation {}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource {}", self.0)
    }
}

// ── Time slot ────────────────────────────────────────────────────

/// A time-of-day range within a date. `to: None` is an open-ended slot
/// lasting until midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub from: NaiveTime,
    pub to: Option<NaiveTime>,
}

impl TimeSlot {
    pub fn new(from: NaiveTime, to: Option<NaiveTime>) -> Self {
        if let Some(t) = to {
            debug_assert!(from < t, "TimeSlot from must be before to");
        }
        Self { from, to }
    }

    pub fn from_minutes(&self) -> u32 {
        self.from.hour() * 60 + self.from.minute()
    }

    /// Minutes from midnight at which the slot ends; an absent end is the
    /// start of the next day.
    pub fn to_minutes(&self) -> u32 {
        match self.to {
            Some(t) => t.hour() * 60 + t.minute(),
            None => MINUTES_PER_DAY,
        }
    }

    /// The single overlap primitive every call site uses: strict on both
    /// boundaries, so back-to-back slots do not collide.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.from_minutes() < other.to_minutes() && self.to_minutes() > other.from_minutes()
    }

    /// `"HH:MM - HH:MM"` rendering for human-facing messages only —
    /// aggregation keys stay typed.
    pub fn label(&self) -> String {
        match self.to {
            Some(t) => format!("{} - {}", self.from.format("%H:%M"), t.format("%H:%M")),
            None => format!("{} - 24:00", self.from.format("%H:%M")),
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ── Inclusive date range ─────────────────────────────────────────

/// Inclusive calendar date range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        debug_assert!(from <= to, "DateRange from must not be after to");
        Self { from, to }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    pub fn len_days(&self) -> u32 {
        (self.to - self.from).num_days() as u32 + 1
    }
}

// ── Booking records ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Paid,
    Confirmed,
    PendingConfirmation,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    /// Whether a record with this status consumes capacity.
    pub fn is_countable(self) -> bool {
        matches!(
            self,
            BookingStatus::Paid | BookingStatus::Confirmed | BookingStatus::PendingConfirmation
        )
    }
}

/// A confirmed or pending-confirmation reservation. Written only by the
/// order/booking lifecycle collaborator; read-only inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Ulid,
    pub product: ProductId,
    pub variation: Option<VariationId>,
    pub resource: Option<ResourceId>,
    pub start: NaiveDateTime,
    /// Equal to `start` for single-day bookings.
    pub end: NaiveDateTime,
    pub quantity: Qty,
    /// Optional person-count breakdown; empty means no breakdown.
    pub persons: Vec<Qty>,
    pub status: BookingStatus,
}

impl BookingRecord {
    /// The time-of-day range this record occupies. An end at midnight on a
    /// later day reads back as an open-ended slot.
    pub fn slot(&self) -> TimeSlot {
        let midnight = NaiveTime::MIN;
        let to = if self.end.time() == midnight && self.end.date() > self.start.date() {
            None
        } else {
            Some(self.end.time())
        };
        TimeSlot { from: self.start.time(), to }
    }

    /// Quantity counted against capacity: the person multiplier applies
    /// when per-person lockout is enabled and a breakdown exists.
    pub fn counted_quantity(&self, per_person: bool) -> Qty {
        let persons: Qty = self.persons.iter().sum();
        if per_person && persons > 0 {
            self.quantity * persons
        } else {
            self.quantity
        }
    }
}

/// Ephemeral, session-scoped soft reservation for an in-progress cart
/// line. Never booking truth — only a subtrahend during checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartHold {
    pub line: Ulid,
    pub product: ProductId,
    pub variation: Option<VariationId>,
    pub resource: Option<ResourceId>,
    pub date: NaiveDate,
    pub slot: Option<TimeSlot>,
    pub quantity: Qty,
    pub persons: Vec<Qty>,
}

impl CartHold {
    pub fn counted_quantity(&self, per_person: bool) -> Qty {
        let persons: Qty = self.persons.iter().sum();
        if per_person && persons > 0 {
            self.quantity * persons
        } else {
            self.quantity
        }
    }
}

// ── Capacity rules ───────────────────────────────────────────────

/// A resolved capacity. The source convention "0 means unlimited" is made
/// explicit at the type level via [`Capacity::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    Unlimited,
    Limited(Qty),
}

impl Capacity {
    pub fn from_raw(raw: u32) -> Self {
        if raw == 0 {
            Capacity::Unlimited
        } else {
            Capacity::Limited(raw)
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Capacity::Unlimited)
    }
}

/// The scope a capacity declaration applies to. Resolution priority is
/// fixed: specific date > variation/attribute lockout > resource lockout >
/// recurring weekday > duration max.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleScope {
    SpecificDate(NaiveDate),
    RecurringWeekday(Weekday),
    VariationLockout(VariationId),
    AttributeLockout(String),
    ResourceLockout(ResourceId),
    DurationMax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRule {
    pub scope: RuleScope,
    pub capacity: Capacity,
}

impl InventoryRule {
    pub fn new(scope: RuleScope, raw_capacity: u32) -> Self {
        Self { scope, capacity: Capacity::from_raw(raw_capacity) }
    }
}

// ── Time window overrides ("manage time availability") ───────────

/// The window a bookable/unbookable override matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideWindow {
    /// Inclusive calendar date range.
    CustomDateRange(DateRange),
    /// Month-of-year range, 1-12, wrap-around allowed (e.g. 11..=2).
    MonthRange { from: u32, to: u32 },
    /// ISO week-of-year range, wrap-around allowed.
    WeekRange { from: u32, to: u32 },
    /// Weekday range, wrap-around allowed (e.g. Fri..=Mon).
    WeekdayRange { from: Weekday, to: Weekday },
    /// A time-of-day window on every date. Matches only slotted candidates.
    FixedTime { from: NaiveTime, to: NaiveTime },
    /// A time-of-day window on one weekday. Matches only slotted candidates.
    TimeOfWeek { day: Weekday, from: NaiveTime, to: NaiveTime },
}

/// One prioritized override. Lower `priority` is evaluated first, but a
/// matching `bookable: true` rule re-admits a date excluded by any
/// `bookable: false` rule regardless of order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowOverride {
    pub window: OverrideWindow,
    pub bookable: bool,
    pub priority: u32,
}

// ── Resources ────────────────────────────────────────────────────

/// A bookable sub-entity (room, staff member) with capacity independent of
/// the product's own, plus its own rule and override sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: Option<String>,
    /// Configured max concurrent bookings; raw 0 means unlimited.
    pub quantity: Qty,
    pub rules: Vec<InventoryRule>,
    pub overrides: Vec<TimeWindowOverride>,
}

// ── Product configuration ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingKind {
    /// One calendar day per booking.
    SingleDay,
    /// Several independent calendar days per booking.
    MultipleDates,
    /// Fixed time slots within a day.
    DateTime,
    /// Duration-based, capacity checked per minute-granularity block.
    Duration { block_minutes: u32 },
    /// A stay over consecutive days.
    MultipleDays { charge_per_day: bool },
    /// A stay constrained to start on one weekday for a fixed length.
    FixedBlocks { start_weekday: Weekday, block_days: u32 },
}

/// Already-parsed product settings handed over by the settings store
/// collaborator. This engine never touches raw configuration storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: ProductId,
    pub kind: BookingKind,
    pub rules: Vec<InventoryRule>,
    pub overrides: Vec<TimeWindowOverride>,
    /// Default slot definitions per weekday (date-time products).
    #[serde(default)]
    pub weekday_slots: HashMap<Weekday, Vec<TimeSlot>>,
    /// Date-specific slot definitions; override the weekday defaults.
    #[serde(default)]
    pub date_slots: HashMap<NaiveDate, Vec<TimeSlot>>,
    /// Resources this product requires simultaneously.
    #[serde(default)]
    pub resources: Vec<ResourceId>,
    /// Known variation ids; requests referencing any other id are rejected.
    #[serde(default)]
    pub variations: HashSet<VariationId>,
    #[serde(default)]
    pub holidays: HashSet<NaiveDate>,
    #[serde(default)]
    pub holiday_ranges: Vec<DateRange>,
    /// Weekdays on which recurring bookings are accepted at all.
    #[serde(default)]
    pub bookable_weekdays: HashSet<Weekday>,
    /// Max-advance-booking horizon for calendar walks.
    pub max_advance_days: u32,
    #[serde(default)]
    pub per_person_lockout: bool,
    /// When on, a booked slot also consumes every overlapping sibling slot.
    #[serde(default)]
    pub overlapping_slots: bool,
    /// When on, resource capacity follows the product-level date lockout
    /// instead of the resource's configured quantity.
    #[serde(default)]
    pub lockout_as_resource_max: bool,
    /// Whitelist mode: all dates unavailable unless an override admits them.
    #[serde(default)]
    pub default_unbookable: bool,
}

impl ProductConfig {
    /// Slot definitions applicable to a date: date-specific definitions
    /// win, else the weekday defaults.
    pub fn slots_for(&self, date: NaiveDate) -> &[TimeSlot] {
        if let Some(slots) = self.date_slots.get(&date) {
            return slots;
        }
        self.weekday_slots
            .get(&date.weekday())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ── Per-product runtime state ────────────────────────────────────

/// Product configuration plus the ledger snapshot: reservation rows sorted
/// by `start`, and the explicit per-date unlimited-override markers (the
/// source's "0/0 row" sentinel, distinct from "no row found").
#[derive(Debug, Clone)]
pub struct ProductState {
    pub config: ProductConfig,
    /// All reservation rows, sorted by `start`.
    pub records: Vec<BookingRecord>,
    pub unlimited_dates: HashSet<NaiveDate>,
}

impl ProductState {
    pub fn new(config: ProductConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            unlimited_dates: HashSet::new(),
        }
    }

    /// Insert a record maintaining sort order by `start`.
    pub fn insert_record(&mut self, record: BookingRecord) {
        let pos = self
            .records
            .binary_search_by_key(&record.start, |r| r.start)
            .unwrap_or_else(|e| e);
        self.records.insert(pos, record);
    }

    pub fn remove_record(&mut self, id: Ulid) -> Option<BookingRecord> {
        if let Some(pos) = self.records.iter().position(|r| r.id == id) {
            Some(self.records.remove(pos))
        } else {
            None
        }
    }

    pub fn record_mut(&mut self, id: Ulid) -> Option<&mut BookingRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Records whose stay touches the query range. Binary search skips
    /// records starting after `range.to`.
    pub fn overlapping(&self, range: &DateRange) -> impl Iterator<Item = &BookingRecord> {
        let right_bound = self
            .records
            .partition_point(|r| r.start.date() <= range.to);
        let from = range.from;
        self.records[..right_bound]
            .iter()
            .filter(move |r| r.end.date() >= from)
    }
}

// ── Requests and verdicts ────────────────────────────────────────

/// One selected attribute with its lockout contribution (an attribute can
/// make a purchased unit consume more than one inventory unit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChoice {
    pub name: String,
    pub value: Qty,
}

/// The explicit boundary object for a single availability question,
/// constructed once by the caller and passed by value into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRequest {
    pub product: ProductId,
    pub variation: Option<VariationId>,
    pub attributes: Vec<AttributeChoice>,
    pub resources: Vec<ResourceId>,
    pub date: NaiveDate,
    pub slot: Option<TimeSlot>,
    pub quantity: Qty,
    pub persons: Vec<Qty>,
    /// Cart session whose holds count against this check.
    pub session: Option<String>,
}

impl AvailabilityRequest {
    pub fn new(product: ProductId, date: NaiveDate, quantity: Qty) -> Self {
        Self {
            product,
            variation: None,
            attributes: Vec::new(),
            resources: Vec::new(),
            date,
            slot: None,
            quantity,
            persons: Vec::new(),
            session: None,
        }
    }
}

/// The verdict returned to callers. Never leaks internal rule details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Unlimited,
    Finite(Qty),
    Exhausted,
    /// The requested slot is full but sibling slots on the date are open.
    SlotExhausted,
}

impl Availability {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Availability::Exhausted | Availability::SlotExhausted)
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            Availability::Exhausted => Some("fully booked for the selected date"),
            Availability::SlotExhausted => {
                Some("this time slot is taken, but other slots remain open")
            }
            _ => None,
        }
    }
}

/// Per-resource verdicts plus the combined multi-resource verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAvailability {
    pub per_resource: std::collections::BTreeMap<ResourceId, Availability>,
    pub combined: Availability,
}

// ── Aggregation bucket keys ──────────────────────────────────────

/// Typed ledger aggregation key. Day-keyed for whole-day kinds, slot-keyed
/// for date-time kinds, minute-keyed for duration kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKey {
    Day(NaiveDate),
    Slot(NaiveDate, TimeSlot),
    Minute(NaiveDateTime),
}
