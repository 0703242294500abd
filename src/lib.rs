pub mod calculation_importer;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod order;
pub mod pipeline;
pub mod procurement_aggregator;
pub mod procurement_exporter;
pub mod recipe_scaler;
pub mod search;

pub use error::ProcurementError;
