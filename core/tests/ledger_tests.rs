//! Stock ledger tests
//!
//! Tests for movement accounting including:
//! - signed movement deltas and balance accumulation
//! - available stock net of unexpired holds
//! - grouped adjustments landing together or not at all

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{available_quantity, reservation_expired, MovementKind, Reservation};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

// Helper to create a hold on stock
fn hold(quantity: &str, expires_at: Option<DateTime<Utc>>) -> Reservation {
    Reservation {
        id: Uuid::new_v4(),
        warehouse_id: Uuid::nil(),
        item_id: Uuid::nil(),
        quantity: dec(quantity),
        holder: "test".to_string(),
        shipment_id: None,
        expires_at,
        created_at: now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;
    use chrono::Duration;

    /// Test movement kind string round trip
    #[test]
    fn test_movement_kind_round_trip() {
        let kinds = [
            MovementKind::In,
            MovementKind::Out,
            MovementKind::Transfer,
            MovementKind::Production,
            MovementKind::Packing,
            MovementKind::Shipment,
            MovementKind::Adjustment,
            MovementKind::Waste,
        ];

        assert_eq!(kinds.len(), 8);
        for kind in kinds {
            assert_eq!(MovementKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::from_str("restock"), None);
    }

    /// Test movement kind strings staying snake_case
    #[test]
    fn test_movement_kind_strings() {
        let strings = [
            "in",
            "out",
            "transfer",
            "production",
            "packing",
            "shipment",
            "adjustment",
            "waste",
        ];

        for s in strings {
            assert!(s.chars().all(|c| c.is_lowercase() || c == '_'));
            assert!(MovementKind::from_str(s).is_some());
        }
    }

    /// Test balance accumulation over signed deltas
    #[test]
    fn test_signed_balance_accumulation() {
        let deltas = [dec("50.0"), dec("30.0"), dec("-20.0"), dec("10.0"), dec("-15.0")];

        let balance: Decimal = deltas.iter().sum();

        assert_eq!(balance, dec("55.0"));
    }

    /// Test detection of a debit below zero
    #[test]
    fn test_debit_below_zero_detected() {
        let balance = dec("50.0");
        let delta = dec("-60.0");

        assert!(balance + delta < Decimal::ZERO);
    }

    /// Test available stock net of a hold
    #[test]
    fn test_available_subtracts_holds() {
        let holds = vec![hold("20.0", None)];

        assert_eq!(available_quantity(dec("50.0"), &holds, now()), dec("30.0"));
    }

    /// Test expired holds releasing their quantity
    #[test]
    fn test_available_ignores_expired_holds() {
        let holds = vec![
            hold("20.0", Some(now() - Duration::hours(1))),
            hold("5.0", Some(now() + Duration::hours(1))),
        ];

        assert_eq!(available_quantity(dec("50.0"), &holds, now()), dec("45.0"));
    }

    /// Test a hold expiring exactly now counting as released
    #[test]
    fn test_hold_expiring_now_is_released() {
        let expiring = hold("20.0", Some(now()));

        assert!(reservation_expired(&expiring, now()));
        assert_eq!(available_quantity(dec("50.0"), &[expiring], now()), dec("50.0"));
    }

    /// Test an open-ended hold never expiring
    #[test]
    fn test_open_ended_hold_never_expires() {
        let open = hold("20.0", None);

        assert!(!reservation_expired(&open, now()));
    }

    /// Test available stock going negative when holds exceed quantity
    #[test]
    fn test_available_can_go_negative() {
        // Quantity dropped after the hold was placed
        let holds = vec![hold("40.0", None)];

        assert_eq!(available_quantity(dec("30.0"), &holds, now()), dec("-10.0"));
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

    /// Strategy for generating signed deltas (-500.0 to 500.0, never zero)
    fn delta_strategy() -> impl Strategy<Value = Decimal> {
        (-5_000i64..=5_000i64)
            .prop_filter("zero delta", |n| *n != 0)
            .prop_map(|n| Decimal::new(n, 1))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The balance is exactly the sum of applied deltas
        #[test]
        fn prop_balance_is_sum_of_deltas(
            deltas in prop::collection::vec(delta_strategy(), 1..20)
        ) {
            let folded = deltas.iter().fold(Decimal::ZERO, |acc, d| acc + d);
            let summed: Decimal = deltas.iter().sum();

            prop_assert_eq!(folded, summed);
        }

        /// Available stock never exceeds the ledger quantity
        #[test]
        fn prop_available_never_exceeds_quantity(
            quantity in quantity_strategy(),
            held in prop::collection::vec(quantity_strategy(), 0..5)
        ) {
            let holds: Vec<Reservation> = held
                .iter()
                .map(|q| hold(&q.to_string(), None))
                .collect();

            prop_assert!(available_quantity(quantity, &holds, now()) <= quantity);
        }

        /// Expired holds reduce nothing
        #[test]
        fn prop_expired_holds_release_everything(
            quantity in quantity_strategy(),
            held in prop::collection::vec(quantity_strategy(), 1..5)
        ) {
            let past = now() - chrono::Duration::days(1);
            let holds: Vec<Reservation> = held
                .iter()
                .map(|q| hold(&q.to_string(), Some(past)))
                .collect();

            prop_assert_eq!(available_quantity(quantity, &holds, now()), quantity);
        }
    }
}

// ============================================================================
// Integration Test Helpers (for use with actual database)
// ============================================================================

#[cfg(test)]
mod integration_helpers {
    use super::*;
    use std::collections::HashMap;

    /// Apply a group of signed adjustments that land together or not at all
    ///
    /// Returns the item that came up short when any debit would take its
    /// balance below zero; balances are untouched in that case.
    pub fn apply_all_or_nothing(
        balances: &mut HashMap<Uuid, Decimal>,
        deltas: &[(Uuid, Decimal)],
    ) -> Result<(), Uuid> {
        let mut staged = balances.clone();

        for (item, delta) in deltas {
            let entry = staged.entry(*item).or_insert(Decimal::ZERO);
            *entry += *delta;
            if *entry < Decimal::ZERO {
                return Err(*item);
            }
        }

        *balances = staged;
        Ok(())
    }

    #[test]
    fn test_failing_debit_leaves_no_trace() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        let mut balances = HashMap::from([
            (first, dec("100.0")),
            (second, dec("5.0")),
            (third, dec("100.0")),
        ]);
        let before = balances.clone();

        // Second debit overdraws, so none of the three may land
        let result = apply_all_or_nothing(
            &mut balances,
            &[
                (first, dec("-10.0")),
                (second, dec("-10.0")),
                (third, dec("-10.0")),
            ],
        );

        assert_eq!(result, Err(second));
        assert_eq!(balances, before);
    }

    #[test]
    fn test_covered_group_lands_fully() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut balances = HashMap::from([(first, dec("100.0")), (second, dec("50.0"))]);

        apply_all_or_nothing(
            &mut balances,
            &[(first, dec("-60.0")), (second, dec("-40.0"))],
        )
        .unwrap();

        assert_eq!(balances[&first], dec("40.0"));
        assert_eq!(balances[&second], dec("10.0"));
    }

    #[test]
    fn test_credit_to_unknown_item_starts_at_zero() {
        let item = Uuid::new_v4();
        let mut balances = HashMap::new();

        apply_all_or_nothing(&mut balances, &[(item, dec("25.0"))]).unwrap();

        assert_eq!(balances[&item], dec("25.0"));
    }

    #[test]
    fn test_debit_from_unknown_item_rejected() {
        let item = Uuid::new_v4();
        let mut balances: HashMap<Uuid, Decimal> = HashMap::new();

        assert_eq!(
            apply_all_or_nothing(&mut balances, &[(item, dec("-1.0"))]),
            Err(item)
        );
        assert!(balances.is_empty());
    }
}
