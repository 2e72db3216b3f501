//! Container models and FIFO drain planning

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical vessel holding bulk intermediate product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    /// Monotonic sequence assigned at creation; breaks FIFO ties
    pub seq: i64,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    /// Batch that filled this container, when produced in-house
    pub batch_id: Option<Uuid>,
    pub initial_weight: Decimal,
    /// Always within [0, initial_weight]
    pub current_weight: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One slice of a drain across containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainAllocation {
    pub container_id: Uuid,
    pub quantity: Decimal,
    /// True when the drain empties the container
    pub exhausted: bool,
}

/// Oldest-first ordering key: creation time, then sequence
pub fn fifo_key(container: &Container) -> (DateTime<Utc>, i64) {
    (container.created_at, container.seq)
}

/// Total weight held in active containers
pub fn total_active_weight(containers: &[Container]) -> Decimal {
    containers
        .iter()
        .filter(|c| c.is_active)
        .map(|c| c.current_weight)
        .sum()
}

/// Plan a FIFO drain of `required` weight across active containers
///
/// Containers are walked oldest first (creation time, then sequence); each
/// contributes up to its current weight. Returns `None` when active weight
/// cannot cover the requirement.
pub fn plan_drain(containers: &[Container], required: Decimal) -> Option<Vec<DrainAllocation>> {
    if required <= Decimal::ZERO {
        return Some(Vec::new());
    }

    let mut active: Vec<&Container> = containers
        .iter()
        .filter(|c| c.is_active && c.current_weight > Decimal::ZERO)
        .collect();
    active.sort_by_key(|c| fifo_key(c));

    let mut remaining = required;
    let mut allocations = Vec::new();
    for container in active {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(container.current_weight);
        allocations.push(DrainAllocation {
            container_id: container.id,
            quantity: take,
            exhausted: take == container.current_weight,
        });
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        return None;
    }
    Some(allocations)
}
