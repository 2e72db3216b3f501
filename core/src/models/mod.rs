//! Database models for the Warehouse Stock Management Platform
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
