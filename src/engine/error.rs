use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::{ProductId, Qty, ResourceId, VariationId};

#[derive(Debug, PartialEq, Eq)]
pub enum EngineError {
    UnknownProduct(ProductId),
    UnknownResource(ResourceId),
    UnknownVariation(VariationId),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    InvalidQuantity(Qty),
    CapacityExceeded {
        date: NaiveDate,
        requested: Qty,
        remaining: Qty,
    },
    ResourceInUse(ResourceId),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownProduct(id) => write!(f, "unknown {id}"),
            EngineError::UnknownResource(id) => write!(f, "unknown {id}"),
            EngineError::UnknownVariation(id) => write!(f, "unknown {id}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: {start} after {end}")
            }
            EngineError::InvalidQuantity(q) => write!(f, "invalid quantity: {q}"),
            EngineError::CapacityExceeded {
                date,
                requested,
                remaining,
            } => {
                write!(
                    f,
                    "capacity exceeded on {date}: requested {requested}, remaining {remaining}"
                )
            }
            EngineError::ResourceInUse(id) => {
                write!(f, "cannot remove {id}: still referenced by a product")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
