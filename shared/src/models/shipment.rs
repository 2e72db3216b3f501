//! Shipment, recipient and reservation models

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Movement;

/// A party shipments are addressed to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a shipment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Draft,
    Reserved,
    Fulfilled,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Draft => "draft",
            ShipmentStatus::Reserved => "reserved",
            ShipmentStatus::Fulfilled => "fulfilled",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ShipmentStatus::Draft),
            "reserved" => Some(ShipmentStatus::Reserved),
            "fulfilled" => Some(ShipmentStatus::Fulfilled),
            "cancelled" => Some(ShipmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Allowed transitions: draft -> reserved -> fulfilled,
    /// draft | reserved -> cancelled
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        matches!(
            (*self, next),
            (ShipmentStatus::Draft, ShipmentStatus::Reserved)
                | (ShipmentStatus::Draft, ShipmentStatus::Cancelled)
                | (ShipmentStatus::Reserved, ShipmentStatus::Fulfilled)
                | (ShipmentStatus::Reserved, ShipmentStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Fulfilled | ShipmentStatus::Cancelled)
    }
}

/// A grouped request for finished goods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: ShipmentStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub items: Vec<ShipmentItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

/// One requested line of a shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub item_id: Uuid,
    pub quantity: Decimal,
}

/// A soft hold on stock
///
/// Reduces available stock, never the ledger quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub quantity: Decimal,
    /// Free-form owner tag (e.g., a shipment reference)
    pub holder: String,
    pub shipment_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of fulfilling a shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentOutcome {
    pub shipment: Shipment,
    pub movements: Vec<Movement>,
}

/// Deadline for holds backing a scheduled shipment
///
/// Midnight UTC at `ttl_days` past the scheduled date.
pub fn hold_deadline(scheduled_date: NaiveDate, ttl_days: i64) -> DateTime<Utc> {
    (scheduled_date + Duration::days(ttl_days))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Whether a reservation no longer holds stock at `now`
pub fn reservation_expired(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    matches!(reservation.expires_at, Some(expiry) if expiry <= now)
}

/// Quantity minus unexpired reservations
pub fn available_quantity(
    quantity: Decimal,
    reservations: &[Reservation],
    now: DateTime<Utc>,
) -> Decimal {
    let held: Decimal = reservations
        .iter()
        .filter(|r| !reservation_expired(r, now))
        .map(|r| r.quantity)
        .sum();
    quantity - held
}
