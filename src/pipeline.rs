//! Async entry points around the blocking spreadsheet work.
//!
//! Each run takes one catalog snapshot up front and works on it to the end, so
//! an import finishing mid-run never changes a procurement result.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;
use tracing::info;

use crate::calculation_importer::{import_workbook, ImportWarning};
use crate::catalog::CatalogStore;
use crate::order::{load_orders, Order};
use crate::procurement_aggregator::{aggregate, AggregationOutcome};
use crate::procurement_exporter::export_to_path;
use crate::search::recipe_matcher::{MatcherConfig, RecipeMatcher};

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub source: PathBuf,
    pub catalog_version: u64,
    pub imported: usize,
    pub added: usize,
    pub updated: usize,
    pub warnings: Vec<ImportWarning>,
}

/// Imports one calculation workbook and publishes the updated catalog.
///
/// Concurrent imports are applied one after another on top of each other's
/// results.
pub async fn import_calculation_file(
    path: PathBuf,
    store: Arc<CatalogStore>,
) -> Result<ImportReport> {
    task::spawn_blocking(move || -> Result<ImportReport> {
        let (catalog_version, outcome) = store.update(|base| -> Result<_> {
            let mut outcome = import_workbook(&path, base)?;
            let catalog = std::mem::take(&mut outcome.catalog);
            Ok((catalog, outcome))
        })?;
        info!(source = ?path, catalog_version, imported = outcome.imported, "calculation imported");
        Ok(ImportReport {
            source: path,
            catalog_version,
            imported: outcome.imported,
            added: outcome.added,
            updated: outcome.updated,
            warnings: outcome.warnings,
        })
    })
    .await
    .context("Import task panicked")?
}

pub async fn load_order_file(path: PathBuf) -> Result<Vec<Order>> {
    task::spawn_blocking(move || load_orders(&path))
        .await
        .context("Order loading task panicked")?
}

/// Aggregates `orders` against the current catalog and writes the procurement
/// workbook to `output`. Nothing is written when aggregation fails.
pub async fn run_procurement(
    orders: Vec<Order>,
    store: Arc<CatalogStore>,
    config: MatcherConfig,
    output: PathBuf,
) -> Result<AggregationOutcome> {
    task::spawn_blocking(move || -> Result<AggregationOutcome> {
        let catalog = store.snapshot();
        let matcher = RecipeMatcher::new(config);
        let outcome = aggregate(&orders, &catalog, &matcher)?;
        export_to_path(&outcome.result, &orders, &output)
            .with_context(|| format!("Failed to export procurement workbook to {:?}", output))?;
        Ok(outcome)
    })
    .await
    .context("Procurement task panicked")?
}
