use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::debug;

use crate::calculation_importer::row_shape::CellValue;
use crate::error::ProcurementError;

/// Raw cell grid of one worksheet, padded so index 0 is always column A.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationSheet {
    pub name: String,
    /// 1-based spreadsheet row number of `rows[0]`.
    pub first_row: usize,
    pub rows: Vec<Vec<CellValue>>,
}

impl CalculationSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            first_row: 1,
            rows,
        }
    }

    /// Cell at a 1-based spreadsheet row and 0-based column.
    pub fn cell(&self, row_number: usize, col: usize) -> Option<&CellValue> {
        let offset = row_number.checked_sub(self.first_row)?;
        self.rows.get(offset)?.get(col)
    }
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        other => CellValue::Text(other.to_string()),
    }
}

fn sheet_from_range(name: &str, range: &Range<Data>) -> CalculationSheet {
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let rows = range
        .rows()
        .map(|row| {
            let mut cells = vec![CellValue::Empty; first_col as usize];
            cells.extend(row.iter().map(cell_value));
            cells
        })
        .collect();
    CalculationSheet {
        name: name.to_string(),
        first_row: first_row as usize + 1,
        rows,
    }
}

/// Reads every worksheet of a calculation workbook (xlsx, xlsm, xls, ods).
///
/// The file handle lives only inside this call; it is closed on every return path.
pub fn load_calculation_workbook(path: &Path) -> Result<Vec<CalculationSheet>, ProcurementError> {
    let unreadable = |reason: String| ProcurementError::UnreadableSource {
        source_name: path.display().to_string(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    if sheet_names.is_empty() {
        return Err(unreadable("workbook has no sheets".to_string()));
    }

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| unreadable(format!("sheet '{}': {}", name, e)))?;
        debug!(sheet = %name, rows = range.height(), "calculation sheet loaded");
        sheets.push(sheet_from_range(&name, &range));
    }
    Ok(sheets)
}
