//! Item catalog and category models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Unit;

/// A category grouping raw materials
///
/// Production execution may substitute one raw item for another within the
/// same category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Role an item plays in the production chain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Raw,
    Intermediate,
    Finished,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Raw => "raw",
            ItemKind::Intermediate => "intermediate",
            ItemKind::Finished => "finished",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(ItemKind::Raw),
            "intermediate" => Some(ItemKind::Intermediate),
            "finished" => Some(ItemKind::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Raw => write!(f, "Raw"),
            ItemKind::Intermediate => write!(f, "Intermediate"),
            ItemKind::Finished => write!(f, "Finished"),
        }
    }
}

/// A stock-keeping item
///
/// The kind is fixed at creation; an item never changes role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    /// Unique stock-keeping code (e.g., "RAW-OAK-01")
    pub code: String,
    pub name: String,
    pub kind: ItemKind,
    pub unit: Unit,
    /// Required for raw items so substitution checks have a scope
    pub category_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
