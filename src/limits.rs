//! Hard guard limits. Violations surface as `EngineError::LimitExceeded`
//! rather than degrading into unbounded scans or allocations.

/// Max products held by one engine.
pub const MAX_PRODUCTS: usize = 100_000;

/// Max registered resources.
pub const MAX_RESOURCES: usize = 100_000;

/// Max capacity rules on a single product or resource.
pub const MAX_RULES: usize = 2_000;

/// Max time-window overrides on a single product or resource.
pub const MAX_OVERRIDES: usize = 2_000;

/// Max slot definitions for one weekday or one specific date.
pub const MAX_SLOTS_PER_DAY: usize = 200;

/// Max reservation rows per product.
pub const MAX_RECORDS_PER_PRODUCT: usize = 1_000_000;

/// Max cart lines held by a single session.
pub const MAX_HOLDS_PER_SESSION: usize = 500;

/// Max resources a single request may require simultaneously.
pub const MAX_RESOURCES_PER_REQUEST: usize = 100;

/// Max window, in days, for blocked-date enumeration.
pub const MAX_QUERY_WINDOW_DAYS: u32 = 1_100;

/// Max advance-booking horizon honored by calendar walks.
pub const MAX_HORIZON_DAYS: u32 = 1_825;

/// Max length of a stay (multiple-days booking) in days.
pub const MAX_STAY_DAYS: i64 = 370;

/// Max person-count fields on one record or hold.
pub const MAX_PERSON_FIELDS: usize = 50;

/// Max resource/product name length in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Max session key length in bytes.
pub const MAX_SESSION_KEY_LEN: usize = 128;
