//! Stock ledger models: balances and the movement journal

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current balance of one item in one warehouse
///
/// Entries are created lazily on first movement; a missing entry reads as
/// zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntry {
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Kinds of stock movements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods receipt from outside the system
    In,
    /// Issue to outside the system
    Out,
    Transfer,
    Production,
    Packing,
    Shipment,
    Adjustment,
    Waste,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Transfer => "transfer",
            MovementKind::Production => "production",
            MovementKind::Packing => "packing",
            MovementKind::Shipment => "shipment",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Waste => "waste",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementKind::In),
            "out" => Some(MovementKind::Out),
            "transfer" => Some(MovementKind::Transfer),
            "production" => Some(MovementKind::Production),
            "packing" => Some(MovementKind::Packing),
            "shipment" => Some(MovementKind::Shipment),
            "adjustment" => Some(MovementKind::Adjustment),
            "waste" => Some(MovementKind::Waste),
            _ => None,
        }
    }
}

/// One append-only journal row recording a signed stock change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    /// Signed: positive credits stock, negative debits it
    pub quantity: Decimal,
    pub kind: MovementKind,
    /// Operator identifier supplied by the calling layer
    pub performed_by: String,
    pub container_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub shipment_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
