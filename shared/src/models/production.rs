//! Production batch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Container, Movement, ProductionPlan};

/// Lifecycle status of a production batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Planned => "planned",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(BatchStatus::Planned),
            "in_progress" => Some(BatchStatus::InProgress),
            "completed" => Some(BatchStatus::Completed),
            "cancelled" => Some(BatchStatus::Cancelled),
            _ => None,
        }
    }

    /// Allowed transitions: planned -> in_progress | completed | cancelled,
    /// in_progress -> completed
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (*self, next),
            (BatchStatus::Planned, BatchStatus::InProgress)
                | (BatchStatus::Planned, BatchStatus::Completed)
                | (BatchStatus::Planned, BatchStatus::Cancelled)
                | (BatchStatus::InProgress, BatchStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }
}

/// A planned or executed production run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub target_mass: Decimal,
    /// Set when the batch completes
    pub actual_mass: Option<Decimal>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of executing a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOutcome {
    pub batch: ProductionBatch,
    /// Container filled with the batch output
    pub container: Container,
    pub movements: Vec<Movement>,
}

/// Plan joined with current stock for one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentAvailability {
    pub raw_item_id: Uuid,
    pub required: Decimal,
    pub available: Decimal,
}

/// Whether current stock covers a production plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub plan: ProductionPlan,
    pub components: Vec<ComponentAvailability>,
    pub sufficient: bool,
}
