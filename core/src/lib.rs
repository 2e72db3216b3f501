//! Warehouse Stock Management Platform - Core Services
//!
//! A stock ledger and allocation engine for small manufacturing operations:
//! multi-warehouse inventory with a movement audit trail, percentage-based
//! production recipes, FIFO container allocation, packing conversion, and
//! reservation-backed shipment fulfillment. The embedding application owns
//! presentation and authorization; every operation here takes
//! already-authorized inputs and runs in a single database transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
