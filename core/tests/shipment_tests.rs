//! Shipment and reservation tests
//!
//! Tests for shipment fulfillment including:
//! - the shipment state machine, with no way back from reserved to draft
//! - holds reducing available stock until fulfillment or release
//! - hold deadlines derived from the scheduled date

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{
    available_quantity, hold_deadline, reservation_expired, Reservation, ShipmentStatus,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

// Helper to create a hold on stock
fn hold(quantity: Decimal, expires_at: Option<DateTime<Utc>>) -> Reservation {
    Reservation {
        id: Uuid::new_v4(),
        warehouse_id: Uuid::nil(),
        item_id: Uuid::nil(),
        quantity,
        holder: "test".to_string(),
        shipment_id: None,
        expires_at,
        created_at: now(),
    }
}

const ALL_STATUSES: [ShipmentStatus; 4] = [
    ShipmentStatus::Draft,
    ShipmentStatus::Reserved,
    ShipmentStatus::Fulfilled,
    ShipmentStatus::Cancelled,
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test the allowed shipment transitions
    #[test]
    fn test_allowed_shipment_transitions() {
        let allowed = [
            (ShipmentStatus::Draft, ShipmentStatus::Reserved),
            (ShipmentStatus::Draft, ShipmentStatus::Cancelled),
            (ShipmentStatus::Reserved, ShipmentStatus::Fulfilled),
            (ShipmentStatus::Reserved, ShipmentStatus::Cancelled),
        ];

        for (from, to) in allowed {
            assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
        }
    }

    /// Test that a reserved shipment cannot return to draft
    #[test]
    fn test_reserved_cannot_return_to_draft() {
        assert!(!ShipmentStatus::Reserved.can_transition_to(ShipmentStatus::Draft));
    }

    /// Test that fulfillment requires reserving first
    #[test]
    fn test_draft_cannot_jump_to_fulfilled() {
        assert!(!ShipmentStatus::Draft.can_transition_to(ShipmentStatus::Fulfilled));
    }

    /// Test terminal states rejecting every transition
    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [ShipmentStatus::Fulfilled, ShipmentStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL_STATUSES {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    /// Test shipment status string round trip
    #[test]
    fn test_shipment_status_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(ShipmentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ShipmentStatus::from_str("pending"), None);
    }

    /// Test a hold reducing available stock
    #[test]
    fn test_hold_reduces_available() {
        let holds = vec![hold(dec("20"), None)];

        assert_eq!(available_quantity(dec("50"), &holds, now()), dec("30"));
    }

    /// Test the hold deadline landing past the scheduled date
    #[test]
    fn test_hold_deadline_past_schedule() {
        let scheduled = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let deadline = hold_deadline(scheduled, 7);

        assert_eq!(deadline, Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap());
    }

    /// Test a zero TTL expiring at the scheduled date itself
    #[test]
    fn test_hold_deadline_zero_ttl() {
        let scheduled = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let deadline = hold_deadline(scheduled, 0);

        assert_eq!(deadline, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
    }

    /// Test the deadline crossing a month boundary
    #[test]
    fn test_hold_deadline_crosses_month() {
        let scheduled = NaiveDate::from_ymd_opt(2025, 3, 28).unwrap();

        let deadline = hold_deadline(scheduled, 7);

        assert_eq!(deadline, Utc.with_ymd_and_hms(2025, 4, 4, 0, 0, 0).unwrap());
    }

    /// Test expiry around the deadline
    #[test]
    fn test_expiry_around_deadline() {
        let expiring = hold(dec("10"), Some(now()));
        let live = hold(dec("10"), Some(now() + Duration::seconds(1)));

        assert!(reservation_expired(&expiring, now()));
        assert!(!reservation_expired(&live, now()));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating positive quantities (0.1 to 1000.0)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10_000i64).prop_map(|n| Decimal::new(n, 1))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The transition table is closed over the four statuses
        #[test]
        fn prop_transition_table_closed(
            from_idx in 0usize..4,
            to_idx in 0usize..4
        ) {
            let from = ALL_STATUSES[from_idx];
            let to = ALL_STATUSES[to_idx];

            let allowed = matches!(
                (from, to),
                (ShipmentStatus::Draft, ShipmentStatus::Reserved)
                    | (ShipmentStatus::Draft, ShipmentStatus::Cancelled)
                    | (ShipmentStatus::Reserved, ShipmentStatus::Fulfilled)
                    | (ShipmentStatus::Reserved, ShipmentStatus::Cancelled)
            );

            prop_assert_eq!(from.can_transition_to(to), allowed);
        }

        /// Available stock drops by exactly the unexpired holds
        #[test]
        fn prop_available_drops_by_live_holds(
            quantity in quantity_strategy(),
            live in prop::collection::vec(quantity_strategy(), 0..4),
            expired in prop::collection::vec(quantity_strategy(), 0..4)
        ) {
            let mut holds = Vec::new();
            for q in &live {
                holds.push(hold(*q, Some(now() + Duration::days(1))));
            }
            for q in &expired {
                holds.push(hold(*q, Some(now() - Duration::days(1))));
            }

            let live_total: Decimal = live.iter().sum();

            prop_assert_eq!(
                available_quantity(quantity, &holds, now()),
                quantity - live_total
            );
        }

        /// The hold deadline always lands ttl_days after the schedule
        #[test]
        fn prop_hold_deadline_offset(
            year in 2024i32..=2026,
            month in 1u32..=12,
            day in 1u32..=28,
            ttl_days in 0i64..=30
        ) {
            let scheduled = NaiveDate::from_ymd_opt(year, month, day).unwrap();

            let deadline = hold_deadline(scheduled, ttl_days);

            prop_assert_eq!(deadline.date_naive() - scheduled, Duration::days(ttl_days));
        }
    }
}

// ============================================================================
// Integration Test Helpers (for use with actual database)
// ============================================================================

#[cfg(test)]
mod integration_helpers {
    use super::*;

    /// One item's stock with its outstanding holds
    pub struct StockPool {
        pub quantity: Decimal,
        pub holds: Vec<Reservation>,
    }

    /// Simulate placing a hold against available stock
    pub fn simulate_reserve(
        pool: &mut StockPool,
        quantity: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), &'static str> {
        if quantity <= Decimal::ZERO {
            return Err("Quantity must be positive");
        }
        if quantity > available_quantity(pool.quantity, &pool.holds, at) {
            return Err("Insufficient available stock");
        }

        pool.holds.push(hold(quantity, None));
        Ok(())
    }

    /// Simulate fulfilling every hold: debit the ledger, drop the holds
    pub fn simulate_fulfill(pool: &mut StockPool) -> Result<(), &'static str> {
        let held: Decimal = pool.holds.iter().map(|h| h.quantity).sum();
        if held > pool.quantity {
            return Err("Insufficient stock");
        }

        pool.quantity -= held;
        pool.holds.clear();
        Ok(())
    }

    #[test]
    fn test_reserve_then_overdraw_then_fulfill() {
        let mut pool = StockPool {
            quantity: dec("50"),
            holds: Vec::new(),
        };

        // A 20 hold leaves 30 available
        simulate_reserve(&mut pool, dec("20"), now()).unwrap();
        assert_eq!(available_quantity(pool.quantity, &pool.holds, now()), dec("30"));

        // A 40 hold exceeds the 30 available
        assert!(simulate_reserve(&mut pool, dec("40"), now()).is_err());

        // Fulfillment debits the held 20 and releases the hold
        simulate_fulfill(&mut pool).unwrap();
        assert_eq!(pool.quantity, dec("30"));
        assert!(pool.holds.is_empty());
        assert_eq!(available_quantity(pool.quantity, &pool.holds, now()), dec("30"));
    }

    #[test]
    fn test_holds_stack_until_exhausted() {
        let mut pool = StockPool {
            quantity: dec("50"),
            holds: Vec::new(),
        };

        simulate_reserve(&mut pool, dec("20"), now()).unwrap();
        simulate_reserve(&mut pool, dec("30"), now()).unwrap();

        assert_eq!(available_quantity(pool.quantity, &pool.holds, now()), Decimal::ZERO);
        assert!(simulate_reserve(&mut pool, dec("0.1"), now()).is_err());
    }

    #[test]
    fn test_fulfill_with_no_holds_is_noop() {
        let mut pool = StockPool {
            quantity: dec("50"),
            holds: Vec::new(),
        };

        simulate_fulfill(&mut pool).unwrap();

        assert_eq!(pool.quantity, dec("50"));
    }
}
