//! Packing service converting bulk intermediate mass into finished units

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::containers::ContainerService;
use crate::services::ledger::{MovementRefs, StockLedgerService};
use shared::models::{
    max_units, remainder_mass, required_mass, ItemKind, MovementKind, PackingCapacity,
    PackingOutcome, PackingVariant,
};
use shared::validation::{validate_packing_units, validate_unit_weight};

/// Packing service
#[derive(Clone)]
pub struct PackingService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: Uuid,
    intermediate_item_id: Uuid,
    finished_item_id: Uuid,
    unit_weight: Decimal,
    created_at: DateTime<Utc>,
}

impl From<VariantRow> for PackingVariant {
    fn from(row: VariantRow) -> Self {
        PackingVariant {
            id: row.id,
            intermediate_item_id: row.intermediate_item_id,
            finished_item_id: row.finished_item_id,
            unit_weight: row.unit_weight,
            created_at: row.created_at,
        }
    }
}

/// Input for creating a packing variant
#[derive(Debug, Deserialize)]
pub struct CreateVariantInput {
    pub intermediate_item_id: Uuid,
    pub finished_item_id: Uuid,
    pub unit_weight: Decimal,
}

impl PackingService {
    /// Create a new PackingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a packing variant linking an intermediate item to a finished item
    pub async fn create_variant(&self, input: CreateVariantInput) -> AppResult<PackingVariant> {
        validate_unit_weight(input.unit_weight).map_err(|msg| AppError::Validation {
            field: "unit_weight".to_string(),
            message: msg.to_string(),
        })?;

        // Validate the source item is an intermediate
        let kind = sqlx::query_scalar::<_, String>("SELECT kind FROM items WHERE id = $1")
            .bind(input.intermediate_item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Intermediate item".to_string()))?;

        if kind != ItemKind::Intermediate.as_str() {
            return Err(AppError::Validation {
                field: "intermediate_item_id".to_string(),
                message: "Packing source must be an intermediate item".to_string(),
            });
        }

        // Validate the target item is a finished good
        let kind = sqlx::query_scalar::<_, String>("SELECT kind FROM items WHERE id = $1")
            .bind(input.finished_item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Finished item".to_string()))?;

        if kind != ItemKind::Finished.as_str() {
            return Err(AppError::Validation {
                field: "finished_item_id".to_string(),
                message: "Packing target must be a finished item".to_string(),
            });
        }

        // Check for duplicate variant
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM packing_variants
                WHERE intermediate_item_id = $1 AND finished_item_id = $2
            )
            "#,
        )
        .bind(input.intermediate_item_id)
        .bind(input.finished_item_id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("packing variant".to_string()));
        }

        let row = sqlx::query_as::<_, VariantRow>(
            r#"
            INSERT INTO packing_variants (intermediate_item_id, finished_item_id, unit_weight)
            VALUES ($1, $2, $3)
            RETURNING id, intermediate_item_id, finished_item_id, unit_weight, created_at
            "#,
        )
        .bind(input.intermediate_item_id)
        .bind(input.finished_item_id)
        .bind(input.unit_weight)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Get a packing variant by ID
    pub async fn get_variant(&self, variant_id: Uuid) -> AppResult<PackingVariant> {
        let row = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, intermediate_item_id, finished_item_id, unit_weight, created_at
            FROM packing_variants
            WHERE id = $1
            "#,
        )
        .bind(variant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Packing variant".to_string()))?;

        Ok(row.into())
    }

    /// List packing variants, optionally for a single intermediate item
    pub async fn list_variants(
        &self,
        intermediate_item_id: Option<Uuid>,
    ) -> AppResult<Vec<PackingVariant>> {
        let rows = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, intermediate_item_id, finished_item_id, unit_weight, created_at
            FROM packing_variants
            WHERE ($1::uuid IS NULL OR intermediate_item_id = $1)
            ORDER BY created_at
            "#,
        )
        .bind(intermediate_item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(PackingVariant::from).collect())
    }

    /// How many finished units the active containers can currently cover
    pub async fn capacity(&self, variant_id: Uuid, warehouse_id: Uuid) -> AppResult<PackingCapacity> {
        let variant = self.get_variant(variant_id).await?;

        let (total_weight, container_count) = sqlx::query_as::<_, (Decimal, i64)>(
            r#"
            SELECT COALESCE(SUM(current_weight), 0), COUNT(*)
            FROM containers
            WHERE warehouse_id = $1 AND item_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(warehouse_id)
        .bind(variant.intermediate_item_id)
        .fetch_one(&self.db)
        .await?;

        Ok(PackingCapacity {
            variant_id,
            total_weight,
            container_count,
            unit_weight: variant.unit_weight,
            max_units: max_units(total_weight, variant.unit_weight),
            remainder: remainder_mass(total_weight, variant.unit_weight),
        })
    }

    /// Pack finished units, draining intermediate containers in arrival order
    ///
    /// Runs in one transaction: the container drain, the per-container mass
    /// debits and the finished-unit credit all commit or roll back together.
    pub async fn execute(
        &self,
        variant_id: Uuid,
        warehouse_id: Uuid,
        units: i64,
        performed_by: &str,
    ) -> AppResult<PackingOutcome> {
        validate_packing_units(units).map_err(|msg| AppError::Validation {
            field: "units".to_string(),
            message: msg.to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let variant: PackingVariant = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, intermediate_item_id, finished_item_id, unit_weight, created_at
            FROM packing_variants
            WHERE id = $1
            "#,
        )
        .bind(variant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Packing variant".to_string()))?
        .into();

        let required = required_mass(units, variant.unit_weight);

        let allocations = ContainerService::drain_in_tx(
            &mut tx,
            warehouse_id,
            variant.intermediate_item_id,
            required,
        )
        .await?;

        // Debit the intermediate mass, one movement per drained container
        let mut movements = Vec::with_capacity(allocations.len() + 1);
        for allocation in &allocations {
            let movement = StockLedgerService::adjust_in_tx(
                &mut tx,
                warehouse_id,
                variant.intermediate_item_id,
                -allocation.quantity,
                MovementKind::Packing,
                performed_by,
                MovementRefs::container(allocation.container_id),
                None,
            )
            .await?;
            movements.push(movement);
        }

        // Credit the finished item in units
        let credit = StockLedgerService::adjust_in_tx(
            &mut tx,
            warehouse_id,
            variant.finished_item_id,
            Decimal::from(units),
            MovementKind::Packing,
            performed_by,
            MovementRefs::none(),
            None,
        )
        .await?;
        movements.push(credit);

        tx.commit().await?;

        tracing::info!(
            "Packed {} units of item {} from {} of item {}",
            units,
            variant.finished_item_id,
            required,
            variant.intermediate_item_id
        );

        Ok(PackingOutcome {
            variant_id,
            units_packed: units,
            mass_consumed: required,
            allocations,
            movements,
        })
    }
}
