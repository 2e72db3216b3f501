//! Packing variant models and unit math

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DrainAllocation, Movement};

/// Conversion rule from bulk intermediate mass to finished units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingVariant {
    pub id: Uuid,
    pub intermediate_item_id: Uuid,
    pub finished_item_id: Uuid,
    /// Mass consumed per finished unit
    pub unit_weight: Decimal,
    pub created_at: DateTime<Utc>,
}

/// How many units the current containers can yield
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingCapacity {
    pub variant_id: Uuid,
    pub total_weight: Decimal,
    pub container_count: i64,
    pub unit_weight: Decimal,
    pub max_units: i64,
    /// Mass left over after packing `max_units`
    pub remainder: Decimal,
}

/// Result of a packing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingOutcome {
    pub variant_id: Uuid,
    pub units_packed: i64,
    pub mass_consumed: Decimal,
    pub allocations: Vec<DrainAllocation>,
    pub movements: Vec<Movement>,
}

/// Whole units available from a bulk mass
pub fn max_units(total_weight: Decimal, unit_weight: Decimal) -> i64 {
    if unit_weight <= Decimal::ZERO || total_weight <= Decimal::ZERO {
        return 0;
    }
    (total_weight / unit_weight).floor().to_i64().unwrap_or(0)
}

/// Mass left over after packing as many whole units as possible
pub fn remainder_mass(total_weight: Decimal, unit_weight: Decimal) -> Decimal {
    if total_weight <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    total_weight - Decimal::from(max_units(total_weight, unit_weight)) * unit_weight
}

/// Bulk mass required to pack `units` finished units
pub fn required_mass(units: i64, unit_weight: Decimal) -> Decimal {
    Decimal::from(units) * unit_weight
}
