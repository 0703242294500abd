use thiserror::Error;

/// Hard failures of the procurement core.
///
/// Soft conditions (unresolved dishes, malformed calculation sections, mixed
/// units) are never raised through this type; they are returned next to the
/// successful result so the caller can show them.
#[derive(Debug, Error)]
pub enum ProcurementError {
    #[error("order set is empty, nothing to aggregate")]
    EmptyOrderSet,

    #[error("invalid portion count {portions} for dish '{dish}'{}: must be positive", in_order(.order))]
    InvalidPortions {
        order: Option<String>,
        dish: String,
        portions: i64,
    },

    #[error("cannot read calculation workbook '{source_name}': {reason}")]
    UnreadableSource { source_name: String, reason: String },

    #[error("failed to build procurement workbook: {0}")]
    ExportFailure(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to write procurement workbook '{path}': {source}")]
    ExportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog storage error: {0}")]
    CatalogStorage(String),
}

fn in_order(order: &Option<String>) -> String {
    match order {
        Some(order) => format!(" in order '{}'", order),
        None => String::new(),
    }
}

impl ProcurementError {
    /// True for errors the caller has to fix in the request itself.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ProcurementError::EmptyOrderSet | ProcurementError::InvalidPortions { .. }
        )
    }
}
