//! Domain models for the Warehouse Stock Management Platform

mod container;
mod item;
mod packing;
mod production;
mod recipe;
mod shipment;
mod stock;
mod warehouse;

pub use container::*;
pub use item::*;
pub use packing::*;
pub use production::*;
pub use recipe::*;
pub use shipment::*;
pub use stock::*;
pub use warehouse::*;
