//! Business logic services for the Production Lot Engine

pub mod alert_rule;
pub mod alert_scheduler;
pub mod catalog;
pub mod inventory_alert;
pub mod linkage;
pub mod procurement;
pub mod production_lot;
pub mod rollup;

pub use alert_rule::AlertRuleService;
pub use alert_scheduler::start_alert_scheduler;
pub use catalog::CatalogCache;
pub use inventory_alert::InventoryAlertService;
pub use linkage::LinkageService;
pub use procurement::ProcurementService;
pub use production_lot::ProductionLotService;
pub use rollup::RollupService;
