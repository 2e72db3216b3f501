//! Business logic services for the Warehouse Stock Management Platform

pub mod containers;
pub mod items;
pub mod ledger;
pub mod packing;
pub mod production;
pub mod recipes;
pub mod reservations;
pub mod shipments;
pub mod warehouses;

pub use containers::ContainerService;
pub use items::ItemService;
pub use ledger::StockLedgerService;
pub use packing::PackingService;
pub use production::ProductionService;
pub use recipes::RecipeService;
pub use reservations::ReservationService;
pub use shipments::ShipmentService;
pub use warehouses::WarehouseService;
