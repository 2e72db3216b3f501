//! Shared types and models for the Warehouse Stock Management Platform
//!
//! This crate contains the domain models, pure planning math, and scalar
//! validation shared between the core services and the embedding application.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
