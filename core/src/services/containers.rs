//! Container service for bulk intermediate product
//!
//! Containers are drained strictly FIFO: oldest creation time first, ties
//! broken by the monotonic sequence assigned at creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{MovementRefs, StockLedgerService};
use shared::models::{plan_drain, total_active_weight, Container, DrainAllocation, Movement, MovementKind};
use shared::validation::validate_unit_weight;

/// Container service
#[derive(Clone)]
pub struct ContainerService {
    db: PgPool,
}

/// Database row for a container
#[derive(Debug, sqlx::FromRow)]
struct ContainerRow {
    id: Uuid,
    seq: i64,
    warehouse_id: Uuid,
    item_id: Uuid,
    batch_id: Option<Uuid>,
    initial_weight: Decimal,
    current_weight: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ContainerRow> for Container {
    fn from(row: ContainerRow) -> Self {
        Container {
            id: row.id,
            seq: row.seq,
            warehouse_id: row.warehouse_id,
            item_id: row.item_id,
            batch_id: row.batch_id,
            initial_weight: row.initial_weight,
            current_weight: row.current_weight,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

impl ContainerService {
    /// Create a new ContainerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a full container against a caller-owned transaction
    pub async fn create_in_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        batch_id: Option<Uuid>,
        weight: Decimal,
    ) -> AppResult<Container> {
        validate_unit_weight(weight).map_err(|msg| AppError::Validation {
            field: "weight".to_string(),
            message: msg.to_string(),
        })?;

        let row = sqlx::query_as::<_, ContainerRow>(
            r#"
            INSERT INTO containers (warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active)
            VALUES ($1, $2, $3, $4, $4, TRUE)
            RETURNING id, seq, warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active, created_at
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_id)
        .bind(weight)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into())
    }

    /// Get a container by ID
    pub async fn get_container(&self, container_id: Uuid) -> AppResult<Container> {
        let row = sqlx::query_as::<_, ContainerRow>(
            r#"
            SELECT id, seq, warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active, created_at
            FROM containers
            WHERE id = $1
            "#,
        )
        .bind(container_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Container".to_string()))?;

        Ok(row.into())
    }

    /// Active containers for an item, in FIFO order
    pub async fn active_containers(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<Vec<Container>> {
        let rows = sqlx::query_as::<_, ContainerRow>(
            r#"
            SELECT id, seq, warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active, created_at
            FROM containers
            WHERE warehouse_id = $1 AND item_id = $2 AND is_active
            ORDER BY created_at, seq
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Container::from).collect())
    }

    /// Total weight held in active containers for an item
    pub async fn total_weight(&self, warehouse_id: Uuid, item_id: Uuid) -> AppResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(current_weight), 0)
            FROM containers
            WHERE warehouse_id = $1 AND item_id = $2 AND is_active
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;

        Ok(total)
    }

    /// Drain `required` weight FIFO against a caller-owned transaction
    ///
    /// Locks the active containers, walks them oldest first, and deactivates
    /// any container the drain empties. The caller records the matching
    /// ledger debit in the same transaction.
    pub async fn drain_in_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        required: Decimal,
    ) -> AppResult<Vec<DrainAllocation>> {
        if required <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "required".to_string(),
                message: "Drain quantity must be positive".to_string(),
            });
        }

        // Lock the FIFO set so concurrent drains serialize
        let rows = sqlx::query_as::<_, ContainerRow>(
            r#"
            SELECT id, seq, warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active, created_at
            FROM containers
            WHERE warehouse_id = $1 AND item_id = $2 AND is_active
            ORDER BY created_at, seq
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        if rows.is_empty() {
            return Err(AppError::ContainerUnavailable(format!(
                "No active containers for item {}",
                item_id
            )));
        }

        let containers: Vec<Container> = rows.into_iter().map(Container::from).collect();
        let available = total_active_weight(&containers);

        let allocations = plan_drain(&containers, required).ok_or_else(|| {
            AppError::InsufficientStock(format!(
                "{} in containers, {} requested",
                available, required
            ))
        })?;

        for allocation in &allocations {
            sqlx::query(
                r#"
                UPDATE containers
                SET current_weight = current_weight - $1,
                    is_active = (current_weight - $1) > 0
                WHERE id = $2
                "#,
            )
            .bind(allocation.quantity)
            .bind(allocation.container_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(allocations)
    }

    /// Void a container, writing its remaining weight off as waste
    pub async fn void_container(
        &self,
        container_id: Uuid,
        performed_by: &str,
        note: Option<&str>,
    ) -> AppResult<(Container, Option<Movement>)> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ContainerRow>(
            r#"
            SELECT id, seq, warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active, created_at
            FROM containers
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(container_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Container".to_string()))?;

        if !row.is_active {
            return Err(AppError::InvalidStateTransition(
                "Container is already inactive".to_string(),
            ));
        }

        let remaining = row.current_weight;

        let updated = sqlx::query_as::<_, ContainerRow>(
            r#"
            UPDATE containers
            SET current_weight = 0, is_active = FALSE
            WHERE id = $1
            RETURNING id, seq, warehouse_id, item_id, batch_id, initial_weight, current_weight, is_active, created_at
            "#,
        )
        .bind(container_id)
        .fetch_one(&mut *tx)
        .await?;

        let movement = if remaining > Decimal::ZERO {
            Some(
                StockLedgerService::adjust_in_tx(
                    &mut tx,
                    row.warehouse_id,
                    row.item_id,
                    -remaining,
                    MovementKind::Waste,
                    performed_by,
                    MovementRefs::container(container_id),
                    note,
                )
                .await?,
            )
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!("Container {} voided, {} written off", container_id, remaining);

        Ok((updated.into(), movement))
    }
}
