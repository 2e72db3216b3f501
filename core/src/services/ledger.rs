//! Stock ledger service: per-warehouse balances and the movement journal
//!
//! This is the single write path for quantities. Every change locks the
//! stock row, enforces the non-negative invariant, and appends exactly one
//! journal row. Multi-step flows compose `adjust_in_tx` inside their own
//! transaction so the whole flow commits or rolls back together.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::{Movement, MovementKind, StockEntry};
use shared::validation::{validate_nonzero_quantity, validate_positive_quantity};

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedgerService {
    db: PgPool,
}

/// Database row for a stock movement
#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    warehouse_id: Uuid,
    item_id: Uuid,
    quantity: Decimal,
    kind: String,
    performed_by: String,
    container_id: Option<Uuid>,
    batch_id: Option<Uuid>,
    shipment_id: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = MovementKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown movement kind: {}", row.kind)))?;
        Ok(Movement {
            id: row.id,
            warehouse_id: row.warehouse_id,
            item_id: row.item_id,
            quantity: row.quantity,
            kind,
            performed_by: row.performed_by,
            container_id: row.container_id,
            batch_id: row.batch_id,
            shipment_id: row.shipment_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

/// Optional links tying a movement to its source document
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MovementRefs {
    pub container_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub shipment_id: Option<Uuid>,
}

impl MovementRefs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn container(container_id: Uuid) -> Self {
        Self {
            container_id: Some(container_id),
            ..Self::default()
        }
    }

    pub fn batch(batch_id: Uuid) -> Self {
        Self {
            batch_id: Some(batch_id),
            ..Self::default()
        }
    }

    pub fn shipment(shipment_id: Uuid) -> Self {
        Self {
            shipment_id: Some(shipment_id),
            ..Self::default()
        }
    }
}

/// Filter for movement-journal queries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub warehouse_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    pub limit: Option<i64>,
}

impl StockLedgerService {
    /// Create a new StockLedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Current ledger quantity; a missing entry reads as zero
    pub async fn quantity_of(&self, warehouse_id: Uuid, item_id: Uuid) -> AppResult<Decimal> {
        let quantity = sqlx::query_scalar::<_, Decimal>(
            "SELECT quantity FROM stock_entries WHERE warehouse_id = $1 AND item_id = $2",
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(quantity.unwrap_or(Decimal::ZERO))
    }

    /// Quantity minus unexpired reservations
    ///
    /// Expired reservations are ignored here whether or not the sweep has
    /// removed them yet.
    pub async fn available(&self, warehouse_id: Uuid, item_id: Uuid) -> AppResult<Decimal> {
        let (quantity, reserved) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT
                COALESCE((SELECT quantity FROM stock_entries
                          WHERE warehouse_id = $1 AND item_id = $2), 0),
                COALESCE((SELECT SUM(quantity) FROM reservations
                          WHERE warehouse_id = $1 AND item_id = $2
                            AND (expires_at IS NULL OR expires_at > NOW())), 0)
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;

        Ok(quantity - reserved)
    }

    /// Apply a signed stock change in its own transaction
    pub async fn adjust(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
        delta: Decimal,
        kind: MovementKind,
        performed_by: &str,
        refs: MovementRefs,
        note: Option<&str>,
    ) -> AppResult<Movement> {
        let mut tx = self.db.begin().await?;
        let movement = Self::adjust_in_tx(
            &mut tx,
            warehouse_id,
            item_id,
            delta,
            kind,
            performed_by,
            refs,
            note,
        )
        .await?;
        tx.commit().await?;

        Ok(movement)
    }

    /// Apply a signed stock change against a caller-owned transaction
    ///
    /// Locks the stock row so concurrent writers serialize on it; a debit
    /// that would take the balance negative fails before anything is
    /// written.
    pub async fn adjust_in_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        delta: Decimal,
        kind: MovementKind,
        performed_by: &str,
        refs: MovementRefs,
        note: Option<&str>,
    ) -> AppResult<Movement> {
        validate_nonzero_quantity(delta).map_err(|msg| AppError::Validation {
            field: "delta".to_string(),
            message: msg.to_string(),
        })?;

        // Lock the row; absent rows are created further down
        let current = sqlx::query_scalar::<_, Decimal>(
            "SELECT quantity FROM stock_entries WHERE warehouse_id = $1 AND item_id = $2 FOR UPDATE",
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or(Decimal::ZERO);

        let new_quantity = current + delta;
        if new_quantity < Decimal::ZERO {
            return Err(AppError::InsufficientStock(format!(
                "{} on hand, {} requested",
                current,
                delta.abs()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO stock_entries (warehouse_id, item_id, quantity, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (warehouse_id, item_id)
            DO UPDATE SET quantity = $3, updated_at = NOW()
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(new_quantity)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            INSERT INTO stock_movements (warehouse_id, item_id, quantity, kind, performed_by,
                                         container_id, batch_id, shipment_id, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, warehouse_id, item_id, quantity, kind, performed_by,
                      container_id, batch_id, shipment_id, note, created_at
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(delta)
        .bind(kind.as_str())
        .bind(performed_by)
        .bind(refs.container_id)
        .bind(refs.batch_id)
        .bind(refs.shipment_id)
        .bind(note)
        .fetch_one(&mut *conn)
        .await?;

        row.try_into()
    }

    /// Record a goods receipt (positive adjustment, kind `in`)
    pub async fn receive(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
        quantity: Decimal,
        performed_by: &str,
        note: Option<&str>,
    ) -> AppResult<Movement> {
        validate_positive_quantity(quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;

        self.adjust(
            warehouse_id,
            item_id,
            quantity,
            MovementKind::In,
            performed_by,
            MovementRefs::none(),
            note,
        )
        .await
    }

    /// Move stock between warehouses in one transaction
    pub async fn transfer(
        &self,
        from_warehouse_id: Uuid,
        to_warehouse_id: Uuid,
        item_id: Uuid,
        quantity: Decimal,
        performed_by: &str,
        note: Option<&str>,
    ) -> AppResult<(Movement, Movement)> {
        validate_positive_quantity(quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;

        if from_warehouse_id == to_warehouse_id {
            return Err(AppError::Validation {
                field: "to_warehouse_id".to_string(),
                message: "Transfer requires two different warehouses".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        let outgoing = Self::adjust_in_tx(
            &mut tx,
            from_warehouse_id,
            item_id,
            -quantity,
            MovementKind::Transfer,
            performed_by,
            MovementRefs::none(),
            note,
        )
        .await?;

        let incoming = Self::adjust_in_tx(
            &mut tx,
            to_warehouse_id,
            item_id,
            quantity,
            MovementKind::Transfer,
            performed_by,
            MovementRefs::none(),
            note,
        )
        .await?;

        tx.commit().await?;

        Ok((outgoing, incoming))
    }

    /// Current entries for a warehouse
    pub async fn stock_levels(&self, warehouse_id: Uuid) -> AppResult<Vec<StockEntry>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Decimal, DateTime<Utc>)>(
            r#"
            SELECT warehouse_id, item_id, quantity, updated_at
            FROM stock_entries
            WHERE warehouse_id = $1
            ORDER BY item_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(warehouse_id, item_id, quantity, updated_at)| StockEntry {
                warehouse_id,
                item_id,
                quantity,
                updated_at,
            })
            .collect())
    }

    /// Query the movement journal, newest first
    pub async fn movements(&self, filter: MovementFilter) -> AppResult<Vec<Movement>> {
        let limit = filter.limit.unwrap_or(50).clamp(1, 500);

        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, warehouse_id, item_id, quantity, kind, performed_by,
                   container_id, batch_id, shipment_id, note, created_at
            FROM stock_movements
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR item_id = $2)
              AND ($3::varchar IS NULL OR kind = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(filter.warehouse_id)
        .bind(filter.item_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }
}
