//! Row-shape predicates for calculation sheets.
//!
//! Columns: A name, B quantity, C unit, D ingredient category. Anything right
//! of D (prices, notes) does not take part in classification.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::catalog::{normalize_name, Unit};

const NAME_COL: usize = 0;
const QUANTITY_COL: usize = 1;
const UNIT_COL: usize = 2;
const CATEGORY_COL: usize = 3;
const SIGNIFICANT_COLS: usize = 4;

/// Labels of total rows that calculation sheets put under a section.
const SUMMARY_LABELS: &[&str] = &[
    "разом", "всього", "усього", "итого", "итог", "total", "subtotal",
];

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Trimmed text that does not read as a number.
    pub fn text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() && parse_decimal(s).is_none() => {
                Some(s.trim())
            }
            _ => None,
        }
    }

    pub fn number(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(n) => decimal_from_f64(*n),
            CellValue::Text(s) => parse_decimal(s),
            CellValue::Empty => None,
        }
    }
}

/// Shortest round-trip text of the float first, so 0.1 stays 0.1.
fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Accepts "0.1", "0,1" and "1 250,5".
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if compact.is_empty() {
        return None;
    }
    Decimal::from_str(&compact).ok()
}

fn cell(cells: &[CellValue], col: usize) -> &CellValue {
    cells.get(col).unwrap_or(&EMPTY_CELL)
}

fn only_filled(cells: &[CellValue], filled: &[usize]) -> bool {
    (0..SIGNIFICANT_COLS).all(|col| filled.contains(&col) != cell(cells, col).is_empty())
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| v.is_sign_positive() && !v.is_zero())
}

pub fn is_blank_row(cells: &[CellValue]) -> bool {
    cells.iter().all(CellValue::is_empty)
}

pub fn is_summary_row(cells: &[CellValue]) -> bool {
    cell(cells, NAME_COL).text().is_some_and(|name| {
        let normalized = normalize_name(name);
        SUMMARY_LABELS
            .iter()
            .any(|label| normalized == *label || normalized.starts_with(&format!("{} ", label)))
    })
}

pub fn is_dish_header(cells: &[CellValue]) -> bool {
    cell(cells, NAME_COL).text().is_some() && only_filled(cells, &[NAME_COL])
}

pub fn is_component_header(cells: &[CellValue]) -> bool {
    cell(cells, NAME_COL).text().is_some()
        && positive(cell(cells, QUANTITY_COL).number()).is_some()
        && only_filled(cells, &[NAME_COL, QUANTITY_COL])
}

pub fn is_ingredient_row(cells: &[CellValue]) -> bool {
    cell(cells, NAME_COL).text().is_some()
        && positive(cell(cells, QUANTITY_COL).number()).is_some()
        && cell(cells, UNIT_COL).text().is_some()
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowShape {
    Blank,
    Summary,
    DishHeader {
        name: String,
    },
    ComponentHeader {
        name: String,
        count: Decimal,
    },
    Ingredient {
        name: String,
        weight: Decimal,
        unit: Unit,
        category: Option<String>,
    },
    Partial {
        reason: String,
    },
}

fn partial_reason(cells: &[CellValue]) -> String {
    let name = cell(cells, NAME_COL);
    let quantity = cell(cells, QUANTITY_COL);
    if name.text().is_none() {
        return "no name in column A".to_string();
    }
    match quantity.number() {
        None if quantity.is_empty() => "no quantity in column B".to_string(),
        None => match quantity {
            CellValue::Text(raw) => format!("quantity '{}' is not a number", raw.trim()),
            other => format!("quantity {:?} is not a number", other),
        },
        Some(q) if positive(Some(q)).is_none() => format!("quantity {} is not positive", q),
        Some(_) => "quantity without a unit in column C".to_string(),
    }
}

pub fn classify_row(cells: &[CellValue]) -> RowShape {
    if is_blank_row(cells) {
        return RowShape::Blank;
    }
    if is_summary_row(cells) {
        return RowShape::Summary;
    }
    let name = cell(cells, NAME_COL).text().unwrap_or_default().to_string();
    if is_dish_header(cells) {
        return RowShape::DishHeader { name };
    }
    if is_component_header(cells) {
        if let Some(count) = positive(cell(cells, QUANTITY_COL).number()) {
            return RowShape::ComponentHeader { name, count };
        }
    }
    if is_ingredient_row(cells) {
        if let (Some(weight), Some(unit)) = (
            positive(cell(cells, QUANTITY_COL).number()),
            cell(cells, UNIT_COL).text(),
        ) {
            return RowShape::Ingredient {
                name,
                weight,
                unit: Unit::parse(unit),
                category: cell(cells, CATEGORY_COL).text().map(str::to_string),
            };
        }
    }
    RowShape::Partial {
        reason: partial_reason(cells),
    }
}
