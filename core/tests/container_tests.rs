//! Container allocation tests
//!
//! Tests for FIFO drain planning including:
//! - oldest container drains first, sequence breaks ties
//! - a drain never takes more than a container holds
//! - shortfalls reject the whole drain

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{plan_drain, total_active_weight, Container};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

// Helper to create an active container
fn container(seq: i64, age_secs: i64, weight: &str) -> Container {
    Container {
        id: Uuid::new_v4(),
        seq,
        warehouse_id: Uuid::nil(),
        item_id: Uuid::nil(),
        batch_id: None,
        initial_weight: dec(weight),
        current_weight: dec(weight),
        is_active: true,
        created_at: base_time() + Duration::seconds(age_secs),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test a drain spanning two containers
    #[test]
    fn test_drain_spans_two_containers() {
        let first = container(1, 0, "10.0");
        let second = container(2, 60, "10.0");
        let containers = vec![second.clone(), first.clone()];

        let allocations = plan_drain(&containers, dec("15.0")).unwrap();

        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].container_id, first.id);
        assert_eq!(allocations[0].quantity, dec("10.0"));
        assert!(allocations[0].exhausted);
        assert_eq!(allocations[1].container_id, second.id);
        assert_eq!(allocations[1].quantity, dec("5.0"));
        assert!(!allocations[1].exhausted);
    }

    /// Test a drain covered by a single container
    #[test]
    fn test_drain_within_single_container() {
        let first = container(1, 0, "10.0");
        let second = container(2, 60, "10.0");
        let containers = vec![first.clone(), second];

        let allocations = plan_drain(&containers, dec("4.0")).unwrap();

        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].container_id, first.id);
        assert_eq!(allocations[0].quantity, dec("4.0"));
        assert!(!allocations[0].exhausted);
    }

    /// Test sequence breaking a creation-time tie
    #[test]
    fn test_tie_broken_by_sequence() {
        let earlier_seq = container(3, 0, "5.0");
        let later_seq = container(7, 0, "5.0");
        let containers = vec![later_seq.clone(), earlier_seq.clone()];

        let allocations = plan_drain(&containers, dec("6.0")).unwrap();

        assert_eq!(allocations[0].container_id, earlier_seq.id);
        assert_eq!(allocations[1].container_id, later_seq.id);
    }

    /// Test a shortfall rejecting the whole drain
    #[test]
    fn test_shortfall_rejects_whole_drain() {
        let containers = vec![container(1, 0, "7.0"), container(2, 60, "5.0")];

        assert!(plan_drain(&containers, dec("15.0")).is_none());
    }

    /// Test inactive containers being skipped
    #[test]
    fn test_inactive_containers_skipped() {
        let mut voided = container(1, 0, "100.0");
        voided.is_active = false;
        let active = container(2, 60, "10.0");
        let containers = vec![voided, active.clone()];

        let allocations = plan_drain(&containers, dec("8.0")).unwrap();

        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].container_id, active.id);
    }

    /// Test emptied containers being skipped
    #[test]
    fn test_empty_containers_skipped() {
        let mut empty = container(1, 0, "10.0");
        empty.current_weight = Decimal::ZERO;
        let full = container(2, 60, "10.0");
        let containers = vec![empty, full.clone()];

        let allocations = plan_drain(&containers, dec("10.0")).unwrap();

        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].container_id, full.id);
        assert!(allocations[0].exhausted);
    }

    /// Test zero and negative requirements being no-ops
    #[test]
    fn test_nonpositive_requirement_is_noop() {
        let containers = vec![container(1, 0, "10.0")];

        assert_eq!(plan_drain(&containers, Decimal::ZERO).unwrap().len(), 0);
        assert_eq!(plan_drain(&containers, dec("-3.0")).unwrap().len(), 0);
    }

    /// Test no containers at all
    #[test]
    fn test_no_containers() {
        assert!(plan_drain(&[], dec("1.0")).is_none());
    }

    /// Test active weight totalling
    #[test]
    fn test_total_active_weight() {
        let mut voided = container(1, 0, "50.0");
        voided.is_active = false;
        let containers = vec![voided, container(2, 60, "10.0"), container(3, 120, "2.5")];

        assert_eq!(total_active_weight(&containers), dec("12.5"));
    }

    /// Test an exact drain exhausting every container it touches
    #[test]
    fn test_exact_drain_exhausts_all() {
        let containers = vec![container(1, 0, "10.0"), container(2, 60, "5.0")];

        let allocations = plan_drain(&containers, dec("15.0")).unwrap();

        assert!(allocations.iter().all(|a| a.exhausted));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating container weights (0.01 to 1000.00)
    fn weight_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn containers_strategy() -> impl Strategy<Value = Vec<Container>> {
        prop::collection::vec(weight_strategy(), 1..8).prop_map(|weights| {
            weights
                .into_iter()
                .enumerate()
                .map(|(i, weight)| {
                    let mut c = container(i as i64, i as i64 * 60, "0");
                    c.initial_weight = weight;
                    c.current_weight = weight;
                    c
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A successful drain allocates exactly the required quantity
        #[test]
        fn prop_drained_total_equals_required(
            containers in containers_strategy(),
            required_cents in 1i64..=800_000i64
        ) {
            let required = Decimal::new(required_cents, 2);
            let total = total_active_weight(&containers);

            match plan_drain(&containers, required) {
                Some(allocations) => {
                    let drained: Decimal = allocations.iter().map(|a| a.quantity).sum();
                    prop_assert!(required <= total);
                    prop_assert_eq!(drained, required);
                }
                None => prop_assert!(required > total),
            }
        }

        /// Allocations walk containers oldest first
        #[test]
        fn prop_allocations_in_arrival_order(containers in containers_strategy()) {
            let total = total_active_weight(&containers);
            let allocations = plan_drain(&containers, total).unwrap();

            let order: Vec<i64> = allocations
                .iter()
                .map(|a| containers.iter().find(|c| c.id == a.container_id).unwrap().seq)
                .collect();
            let mut sorted = order.clone();
            sorted.sort();

            prop_assert_eq!(order, sorted);
        }

        /// No allocation exceeds what its container holds
        #[test]
        fn prop_allocation_never_exceeds_weight(
            containers in containers_strategy(),
            required_cents in 1i64..=800_000i64
        ) {
            let required = Decimal::new(required_cents, 2);

            if let Some(allocations) = plan_drain(&containers, required) {
                for allocation in &allocations {
                    let held = containers
                        .iter()
                        .find(|c| c.id == allocation.container_id)
                        .unwrap()
                        .current_weight;
                    prop_assert!(allocation.quantity > Decimal::ZERO);
                    prop_assert!(allocation.quantity <= held);
                }
            }
        }

        /// The exhausted flag marks exactly the full takes
        #[test]
        fn prop_exhausted_iff_full_take(
            containers in containers_strategy(),
            required_cents in 1i64..=800_000i64
        ) {
            let required = Decimal::new(required_cents, 2);

            if let Some(allocations) = plan_drain(&containers, required) {
                for allocation in &allocations {
                    let held = containers
                        .iter()
                        .find(|c| c.id == allocation.container_id)
                        .unwrap()
                        .current_weight;
                    prop_assert_eq!(allocation.exhausted, allocation.quantity == held);
                }
            }
        }
    }
}

// ============================================================================
// Integration Test Helpers (for use with actual database)
// ============================================================================

#[cfg(test)]
mod integration_helpers {
    use super::*;

    /// Apply a planned drain to in-memory containers, deactivating emptied ones
    pub fn apply_drain(containers: &mut [Container], required: Decimal) -> Option<Decimal> {
        let allocations = plan_drain(containers, required)?;

        for allocation in &allocations {
            let container = containers
                .iter_mut()
                .find(|c| c.id == allocation.container_id)
                .unwrap();
            container.current_weight -= allocation.quantity;
            if container.current_weight == Decimal::ZERO {
                container.is_active = false;
            }
        }

        Some(total_active_weight(containers))
    }

    #[test]
    fn test_apply_drain_deactivates_emptied() {
        let mut containers = vec![container(1, 0, "10.0"), container(2, 60, "10.0")];

        let remaining = apply_drain(&mut containers, dec("15.0")).unwrap();

        assert_eq!(remaining, dec("5.0"));
        assert!(!containers[0].is_active);
        assert_eq!(containers[0].current_weight, Decimal::ZERO);
        assert!(containers[1].is_active);
        assert_eq!(containers[1].current_weight, dec("5.0"));
    }

    #[test]
    fn test_apply_drain_shortfall_changes_nothing() {
        let mut containers = vec![container(1, 0, "10.0"), container(2, 60, "10.0")];

        assert!(apply_drain(&mut containers, dec("25.0")).is_none());
        assert_eq!(containers[0].current_weight, dec("10.0"));
        assert_eq!(containers[1].current_weight, dec("10.0"));
    }

    #[test]
    fn test_repeated_drains_preserve_order() {
        let mut containers = vec![container(1, 0, "10.0"), container(2, 60, "10.0")];

        apply_drain(&mut containers, dec("6.0")).unwrap();
        apply_drain(&mut containers, dec("6.0")).unwrap();

        // 12 drained in total: first container emptied, second at 8
        assert!(!containers[0].is_active);
        assert_eq!(containers[1].current_weight, dec("8.0"));
    }
}
