//! Production service for planning and executing recipe batches

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::containers::ContainerService;
use crate::services::ledger::{MovementRefs, StockLedgerService};
use shared::models::{
    actual_yield_percent, plan_production, usage_permitted, AvailabilityReport, BatchStatus,
    ComponentAvailability, ComponentRef, ItemKind, MovementKind, ProductionBatch,
    ProductionOutcome, ProductionPlan, RecipeComponent, RecipeStatus,
};
use shared::validation::validate_positive_quantity;

/// Production service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    ledger: StockLedgerService,
}

/// Database row for a production batch
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    recipe_id: Uuid,
    target_mass: Decimal,
    actual_mass: Option<Decimal>,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for ProductionBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch status: {}", row.status)))?;
        Ok(ProductionBatch {
            id: row.id,
            recipe_id: row.recipe_id,
            target_mass: row.target_mass,
            actual_mass: row.actual_mass,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// One actually-consumed raw quantity
#[derive(Debug, Deserialize)]
pub struct RawUsageInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
}

/// Input for executing a batch
#[derive(Debug, Deserialize)]
pub struct ExecuteBatchInput {
    pub warehouse_id: Uuid,
    pub actual_output_mass: Decimal,
    pub usage: Vec<RawUsageInput>,
}

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool) -> Self {
        let ledger = StockLedgerService::new(db.clone());
        Self { db, ledger }
    }

    /// Derive raw requirements for a target output from the active recipe
    pub async fn plan(
        &self,
        output_item_id: Uuid,
        target_output_mass: Decimal,
    ) -> AppResult<ProductionPlan> {
        validate_positive_quantity(target_output_mass).map_err(|msg| AppError::Validation {
            field: "target_output_mass".to_string(),
            message: msg.to_string(),
        })?;

        let (recipe_id, yield_percent) = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT id, yield_percent FROM recipes WHERE output_item_id = $1 AND status = $2",
        )
        .bind(output_item_id)
        .bind(RecipeStatus::Active.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NoActiveRecipe(format!("item {}", output_item_id)))?;

        let components = sqlx::query_as::<_, (Uuid, Decimal)>(
            r#"
            SELECT raw_item_id, percent
            FROM recipe_components
            WHERE recipe_id = $1
            ORDER BY percent DESC, raw_item_id
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(raw_item_id, percent)| RecipeComponent {
            raw_item_id,
            percent,
        })
        .collect::<Vec<_>>();

        plan_production(target_output_mass, yield_percent, &components)
            .ok_or_else(|| AppError::Internal("Production plan is not computable".to_string()))
    }

    /// Plan joined with current available stock per component
    pub async fn check_availability(
        &self,
        warehouse_id: Uuid,
        output_item_id: Uuid,
        target_output_mass: Decimal,
    ) -> AppResult<AvailabilityReport> {
        let plan = self.plan(output_item_id, target_output_mass).await?;

        let mut components = Vec::with_capacity(plan.requirements.len());
        let mut sufficient = true;
        for requirement in &plan.requirements {
            let available = self
                .ledger
                .available(warehouse_id, requirement.raw_item_id)
                .await?;
            if available < requirement.quantity {
                sufficient = false;
            }
            components.push(ComponentAvailability {
                raw_item_id: requirement.raw_item_id,
                required: requirement.quantity,
                available,
            });
        }

        Ok(AvailabilityReport {
            plan,
            components,
            sufficient,
        })
    }

    /// Create a batch in planned status from an active recipe
    pub async fn create_batch(
        &self,
        recipe_id: Uuid,
        target_mass: Decimal,
    ) -> AppResult<ProductionBatch> {
        validate_positive_quantity(target_mass).map_err(|msg| AppError::Validation {
            field: "target_mass".to_string(),
            message: msg.to_string(),
        })?;

        let status = sqlx::query_scalar::<_, String>("SELECT status FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        if status != RecipeStatus::Active.as_str() {
            return Err(AppError::Validation {
                field: "recipe_id".to_string(),
                message: format!("Recipe must be active to plan a batch, status: {}", status),
            });
        }

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO production_batches (recipe_id, target_mass, status)
            VALUES ($1, $2, $3)
            RETURNING id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            "#,
        )
        .bind(recipe_id)
        .bind(target_mass)
        .bind(BatchStatus::Planned.as_str())
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    /// Execute a batch: debit raws, fill a container, credit the output
    ///
    /// Runs in one transaction; any failure (including an insufficient raw
    /// balance) rolls the whole execution back. Divergence between planned
    /// and actual yield is logged, never enforced.
    pub async fn execute(
        &self,
        batch_id: Uuid,
        input: ExecuteBatchInput,
        performed_by: &str,
    ) -> AppResult<ProductionOutcome> {
        validate_positive_quantity(input.actual_output_mass).map_err(|msg| {
            AppError::Validation {
                field: "actual_output_mass".to_string(),
                message: msg.to_string(),
            }
        })?;

        if input.usage.is_empty() {
            return Err(AppError::Validation {
                field: "usage".to_string(),
                message: "Execution requires at least one raw usage".to_string(),
            });
        }

        for (i, usage) in input.usage.iter().enumerate() {
            validate_positive_quantity(usage.quantity).map_err(|msg| AppError::Validation {
                field: "usage".to_string(),
                message: msg.to_string(),
            })?;

            if input.usage[..i].iter().any(|u| u.item_id == usage.item_id) {
                return Err(AppError::Validation {
                    field: "usage".to_string(),
                    message: "Usage entries must reference distinct items".to_string(),
                });
            }
        }

        let mut tx = self.db.begin().await?;

        // Lock the batch
        let batch_row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            FROM production_batches
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?;

        let status = BatchStatus::from_str(&batch_row.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown batch status: {}", batch_row.status))
        })?;

        if !status.can_transition_to(BatchStatus::Completed) {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch in status {} cannot be executed",
                status.as_str()
            )));
        }

        let (output_item_id, yield_percent) = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT output_item_id, yield_percent FROM recipes WHERE id = $1",
        )
        .bind(batch_row.recipe_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        // Component items with their categories, for substitution checks
        let components: Vec<ComponentRef> = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            r#"
            SELECT rc.raw_item_id, i.category_id
            FROM recipe_components rc
            JOIN items i ON i.id = rc.raw_item_id
            WHERE rc.recipe_id = $1
            "#,
        )
        .bind(batch_row.recipe_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(raw_item_id, category_id)| ComponentRef {
            raw_item_id,
            category_id,
        })
        .collect();

        // Every used item must be a component or a same-category substitute
        let mut total_input = Decimal::ZERO;
        for usage in &input.usage {
            let (kind, category_id) = sqlx::query_as::<_, (String, Option<Uuid>)>(
                "SELECT kind, category_id FROM items WHERE id = $1",
            )
            .bind(usage.item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Usage item".to_string()))?;

            if kind != ItemKind::Raw.as_str() {
                return Err(AppError::Validation {
                    field: "usage".to_string(),
                    message: "Only raw items can be consumed by production".to_string(),
                });
            }

            if !usage_permitted(&components, usage.item_id, category_id) {
                return Err(AppError::Validation {
                    field: "usage".to_string(),
                    message: format!("Item {} is not permitted by the recipe", usage.item_id),
                });
            }

            total_input += usage.quantity;
        }

        // Debit each raw material
        let mut movements = Vec::with_capacity(input.usage.len() + 1);
        for usage in &input.usage {
            let movement = StockLedgerService::adjust_in_tx(
                &mut tx,
                input.warehouse_id,
                usage.item_id,
                -usage.quantity,
                MovementKind::Production,
                performed_by,
                MovementRefs::batch(batch_id),
                None,
            )
            .await?;
            movements.push(movement);
        }

        // Fill a container with the batch output
        let container = ContainerService::create_in_tx(
            &mut tx,
            input.warehouse_id,
            output_item_id,
            Some(batch_id),
            input.actual_output_mass,
        )
        .await?;

        // Credit the intermediate item
        let credit = StockLedgerService::adjust_in_tx(
            &mut tx,
            input.warehouse_id,
            output_item_id,
            input.actual_output_mass,
            MovementKind::Production,
            performed_by,
            MovementRefs {
                container_id: Some(container.id),
                batch_id: Some(batch_id),
                shipment_id: None,
            },
            None,
        )
        .await?;
        movements.push(credit);

        let batch_row = sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE production_batches
            SET status = $1, actual_mass = $2, completed_at = NOW()
            WHERE id = $3
            RETURNING id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            "#,
        )
        .bind(BatchStatus::Completed.as_str())
        .bind(input.actual_output_mass)
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let realized_yield = actual_yield_percent(total_input, input.actual_output_mass);
        tracing::info!(
            "Batch {} completed: {} in, {} out, yield {}% (recipe {}%)",
            batch_id,
            total_input,
            input.actual_output_mass,
            realized_yield,
            yield_percent
        );

        Ok(ProductionOutcome {
            batch: batch_row.try_into()?,
            container,
            movements,
        })
    }

    /// Cancel a planned batch
    pub async fn cancel_batch(&self, batch_id: Uuid) -> AppResult<ProductionBatch> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            FROM production_batches
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?;

        let status = BatchStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch status: {}", row.status)))?;

        if !status.can_transition_to(BatchStatus::Cancelled) {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch in status {} cannot be cancelled",
                status.as_str()
            )));
        }

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE production_batches
            SET status = $1
            WHERE id = $2
            RETURNING id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            "#,
        )
        .bind(BatchStatus::Cancelled.as_str())
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// Get a batch by ID
    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<ProductionBatch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            FROM production_batches
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?;

        row.try_into()
    }

    /// List batches, newest first
    pub async fn list_batches(
        &self,
        status: Option<BatchStatus>,
        limit: Option<i64>,
    ) -> AppResult<Vec<ProductionBatch>> {
        let limit = limit.unwrap_or(50).clamp(1, 500);

        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, recipe_id, target_mass, actual_mass, status, created_at, completed_at
            FROM production_batches
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionBatch::try_from).collect()
    }
}
