//! Warehouse registry service

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::Warehouse;
use shared::validation::validate_display_name;

/// Warehouse registry service
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Database row for a warehouse
#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    id: Uuid,
    name: String,
    location: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            name: row.name,
            location: row.location,
            is_default: row.is_default,
            created_at: row.created_at,
        }
    }
}

/// Input for updating a warehouse
#[derive(Debug, Deserialize)]
pub struct UpdateWarehouseInput {
    pub name: Option<String>,
    pub location: Option<String>,
}

impl WarehouseService {
    /// Create a new WarehouseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a warehouse; the first one created becomes the default
    pub async fn create_warehouse(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> AppResult<Warehouse> {
        validate_display_name(name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        let row = sqlx::query_as::<_, WarehouseRow>(
            r#"
            INSERT INTO warehouses (name, location, is_default)
            VALUES ($1, $2, NOT EXISTS(SELECT 1 FROM warehouses))
            RETURNING id, name, location, is_default, created_at
            "#,
        )
        .bind(name.trim())
        .bind(location)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Get a warehouse by ID
    pub async fn get_warehouse(&self, warehouse_id: Uuid) -> AppResult<Warehouse> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location, is_default, created_at FROM warehouses WHERE id = $1",
        )
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        Ok(row.into())
    }

    /// List all warehouses, oldest first
    pub async fn list_warehouses(&self) -> AppResult<Vec<Warehouse>> {
        let rows = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location, is_default, created_at FROM warehouses ORDER BY created_at",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    /// Update a warehouse's name and/or location
    pub async fn update_warehouse(
        &self,
        warehouse_id: Uuid,
        input: UpdateWarehouseInput,
    ) -> AppResult<Warehouse> {
        if let Some(name) = &input.name {
            validate_display_name(name).map_err(|msg| AppError::Validation {
                field: "name".to_string(),
                message: msg.to_string(),
            })?;
        }

        let row = sqlx::query_as::<_, WarehouseRow>(
            r#"
            UPDATE warehouses
            SET name = COALESCE($1, name), location = COALESCE($2, location)
            WHERE id = $3
            RETURNING id, name, location, is_default, created_at
            "#,
        )
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.location)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        Ok(row.into())
    }

    /// The warehouse used when callers do not name one
    pub async fn default_warehouse(&self) -> AppResult<Warehouse> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location, is_default, created_at FROM warehouses WHERE is_default LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Default warehouse".to_string()))?;

        Ok(row.into())
    }

    /// Make a warehouse the default, clearing the previous one
    pub async fn set_default(&self, warehouse_id: Uuid) -> AppResult<Warehouse> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE warehouses SET is_default = FALSE WHERE is_default")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, WarehouseRow>(
            r#"
            UPDATE warehouses
            SET is_default = TRUE
            WHERE id = $1
            RETURNING id, name, location, is_default, created_at
            "#,
        )
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        tx.commit().await?;

        Ok(row.into())
    }
}
