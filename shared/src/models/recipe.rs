//! Recipe models and production planning math

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a recipe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    Draft,
    Active,
    Archived,
}

impl RecipeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeStatus::Draft => "draft",
            RecipeStatus::Active => "active",
            RecipeStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(RecipeStatus::Draft),
            "active" => Some(RecipeStatus::Active),
            "archived" => Some(RecipeStatus::Archived),
            _ => None,
        }
    }
}

/// A percentage-based production recipe for an intermediate item
///
/// Composition is immutable once activated; changing a formulation means
/// creating a new draft. At most one recipe per output item is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub output_item_id: Uuid,
    /// Percentage of input mass surviving production (0-100]
    pub yield_percent: Decimal,
    pub status: RecipeStatus,
    pub components: Vec<RecipeComponent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One raw-material share of a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeComponent {
    pub raw_item_id: Uuid,
    /// Share of total input mass (0-100]
    pub percent: Decimal,
}

/// Component identity with its category, for substitution checks
#[derive(Debug, Clone)]
pub struct ComponentRef {
    pub raw_item_id: Uuid,
    pub category_id: Option<Uuid>,
}

/// Raw-material requirements derived from a recipe and a target output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub target_output_mass: Decimal,
    /// Total input mass required at the recipe's yield
    pub planned_input_mass: Decimal,
    pub requirements: Vec<PlannedComponent>,
}

/// Planned quantity for one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedComponent {
    pub raw_item_id: Uuid,
    pub percent: Decimal,
    pub quantity: Decimal,
}

/// Input mass needed to produce `target_output` at the given yield
pub fn planned_input_mass(target_output: Decimal, yield_percent: Decimal) -> Option<Decimal> {
    if target_output <= Decimal::ZERO || yield_percent <= Decimal::ZERO {
        return None;
    }
    Some(target_output * Decimal::from(100) / yield_percent)
}

/// Derive per-component raw requirements for a target output mass
pub fn plan_production(
    target_output: Decimal,
    yield_percent: Decimal,
    components: &[RecipeComponent],
) -> Option<ProductionPlan> {
    let input = planned_input_mass(target_output, yield_percent)?;
    let requirements = components
        .iter()
        .map(|c| PlannedComponent {
            raw_item_id: c.raw_item_id,
            percent: c.percent,
            quantity: input * c.percent / Decimal::from(100),
        })
        .collect();
    Some(ProductionPlan {
        target_output_mass: target_output,
        planned_input_mass: input,
        requirements,
    })
}

/// Whether a used raw item is permitted by a recipe
///
/// Allowed when it is an exact component item, or when it shares a category
/// with a component item (substitution within category).
pub fn usage_permitted(
    components: &[ComponentRef],
    item_id: Uuid,
    item_category_id: Option<Uuid>,
) -> bool {
    if components.iter().any(|c| c.raw_item_id == item_id) {
        return true;
    }
    match item_category_id {
        Some(category) => components
            .iter()
            .any(|c| c.category_id == Some(category)),
        None => false,
    }
}

/// Actual yield of a completed batch, as a percentage of input mass
pub fn actual_yield_percent(input_mass: Decimal, output_mass: Decimal) -> Decimal {
    if input_mass <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (output_mass / input_mass * Decimal::from(100)).round_dp(2)
}
