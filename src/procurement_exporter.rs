//! Procurement workbook rendering.
//!
//! One product list for the whole order set, then a menu sheet and a techcard
//! sheet per order. Prices never reach any sheet.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

use crate::catalog::RecipeKind;
use crate::error::ProcurementError;
use crate::order::Order;
use crate::procurement_aggregator::{ProcurementResult, ResolvedDish};
use crate::recipe_scaler::ScaledLine;

pub const PRODUCT_LIST_SHEET: &str = "Product list";
const MENU_SHEET_PREFIX: &str = "Menu";
const TECHCARD_SHEET_PREFIX: &str = "Techcards";
/// Status text of a menu line whose dish is missing from the catalog.
pub const NOT_FOUND_MARKER: &str = "NOT FOUND";

const MAX_SHEET_NAME_CHARS: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

struct Styles {
    title: Format,
    header: Format,
    group: Format,
    component: Format,
    not_found: Format,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(14),
            header: Format::new().set_bold().set_background_color(Color::Silver),
            group: Format::new().set_bold(),
            component: Format::new().set_italic(),
            not_found: Format::new().set_bold().set_font_color(Color::Red),
        }
    }
}

/// Hands out Excel-safe, workbook-unique sheet names.
#[derive(Default)]
struct SheetNames {
    taken: HashSet<String>,
}

impl SheetNames {
    fn claim(&mut self, wanted: &str) -> String {
        let cleaned: String = wanted
            .chars()
            .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
            .collect();
        let cleaned = cleaned.trim().trim_matches('\'').to_string();
        let base = if cleaned.is_empty() { "Sheet".to_string() } else { cleaned };

        let mut candidate = truncate_chars(&base, MAX_SHEET_NAME_CHARS);
        let mut n = 2;
        // Excel compares sheet names case-insensitively.
        while self.taken.contains(&candidate.to_lowercase()) {
            let suffix = format!(" ({})", n);
            candidate = format!(
                "{}{}",
                truncate_chars(&base, MAX_SHEET_NAME_CHARS - suffix.chars().count()).trim_end(),
                suffix
            );
            n += 1;
        }
        self.taken.insert(candidate.to_lowercase());
        candidate
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn write_header(
    sheet: &mut Worksheet,
    row: u32,
    columns: &[&str],
    styles: &Styles,
) -> Result<(), ProcurementError> {
    for (col, title) in columns.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *title, &styles.header)?;
    }
    Ok(())
}

fn product_list_sheet(
    result: &ProcurementResult,
    styles: &Styles,
) -> Result<Worksheet, ProcurementError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(PRODUCT_LIST_SHEET)?;
    sheet.set_column_width(0, 36)?;
    sheet.set_column_width(1, 12)?;
    sheet.set_column_width(2, 8)?;

    sheet.write_string_with_format(0, 0, PRODUCT_LIST_SHEET, &styles.title)?;
    write_header(&mut sheet, 1, &["Ingredient", "Quantity", "Unit"], styles)?;

    let mut row = 2;
    for (category, lines) in result.by_category() {
        sheet.write_string_with_format(row, 0, category, &styles.group)?;
        row += 1;
        for line in lines {
            sheet.write_string(row, 0, &line.name)?;
            sheet.write_number(row, 1, number(line.total))?;
            sheet.write_string(row, 2, line.unit.label())?;
            row += 1;
        }
    }
    Ok(sheet)
}

fn menu_sheet(
    name: &str,
    order_index: usize,
    order: &Order,
    result: &ProcurementResult,
    styles: &Styles,
) -> Result<Worksheet, ProcurementError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(name)?;
    sheet.set_column_width(0, 36)?;
    sheet.set_column_width(2, 28)?;

    sheet.write_string_with_format(0, 0, &order.name, &styles.title)?;
    write_header(&mut sheet, 1, &["Dish", "Portions", "Status"], styles)?;

    for (line_index, item) in order.items.iter().enumerate() {
        let row = line_index as u32 + 2;
        sheet.write_number(row, 1, item.portions as f64)?;
        match result.dish(order_index, line_index) {
            Some(dish) => {
                sheet.write_string(row, 0, &item.dish)?;
                if !dish.exact {
                    sheet.write_string(row, 2, format!("matched: {}", dish.scaled.recipe_name))?;
                }
            }
            None => {
                sheet.write_string_with_format(row, 0, &item.dish, &styles.not_found)?;
                sheet.write_string_with_format(row, 2, NOT_FOUND_MARKER, &styles.not_found)?;
            }
        }
    }
    Ok(sheet)
}

fn write_scaled_lines(
    sheet: &mut Worksheet,
    row: &mut u32,
    lines: &[ScaledLine],
) -> Result<(), ProcurementError> {
    for line in lines {
        sheet.write_string(*row, 0, &line.name)?;
        sheet.write_number(*row, 1, number(line.unit_weight))?;
        sheet.write_number(*row, 2, number(line.quantity))?;
        sheet.write_string(*row, 3, line.unit.label())?;
        *row += 1;
    }
    Ok(())
}

fn write_techcard(
    sheet: &mut Worksheet,
    row: &mut u32,
    dish: &ResolvedDish,
    styles: &Styles,
) -> Result<(), ProcurementError> {
    let scaled = &dish.scaled;
    sheet.write_string_with_format(*row, 0, &scaled.recipe_name, &styles.group)?;
    sheet.write_string_with_format(*row, 1, "Portions", &styles.group)?;
    sheet.write_number_with_format(*row, 2, scaled.portions as f64, &styles.group)?;
    *row += 1;

    match scaled.kind {
        RecipeKind::Catering => write_scaled_lines(sheet, row, &scaled.lines)?,
        RecipeKind::Box => {
            for component in &scaled.components {
                sheet.write_string_with_format(*row, 0, &component.name, &styles.component)?;
                let count = number(component.count_per_portion);
                sheet.write_number_with_format(*row, 1, count, &styles.component)?;
                let units = number(component.units);
                sheet.write_number_with_format(*row, 2, units, &styles.component)?;
                sheet.write_string_with_format(*row, 3, "pcs", &styles.component)?;
                *row += 1;
                write_scaled_lines(sheet, row, &component.lines)?;
            }
        }
    }
    // Blank separator row.
    *row += 1;
    Ok(())
}

fn techcard_sheet(
    name: &str,
    order_index: usize,
    order: &Order,
    result: &ProcurementResult,
    styles: &Styles,
) -> Result<Worksheet, ProcurementError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(name)?;
    sheet.set_column_width(0, 36)?;
    sheet.set_column_width(1, 12)?;
    sheet.set_column_width(2, 12)?;

    sheet.write_string_with_format(0, 0, &order.name, &styles.title)?;
    let columns = ["Dish / ingredient", "Per portion", "Total", "Unit"];
    write_header(&mut sheet, 1, &columns, styles)?;

    let mut row = 2;
    for dish in result.dishes_of(order_index) {
        write_techcard(&mut sheet, &mut row, dish, styles)?;
    }
    Ok(sheet)
}

/// Lays out the procurement workbook for `orders`.
///
/// Menu lines with no resolved dish in `result` are flagged with
/// [`NOT_FOUND_MARKER`].
pub fn build_workbook(
    result: &ProcurementResult,
    orders: &[Order],
) -> Result<Workbook, ProcurementError> {
    let styles = Styles::new();
    let mut names = SheetNames::default();
    let mut workbook = Workbook::new();

    names.claim(PRODUCT_LIST_SHEET);
    workbook.push_worksheet(product_list_sheet(result, &styles)?);

    for (order_index, order) in orders.iter().enumerate() {
        let menu_name = names.claim(&format!("{} - {}", MENU_SHEET_PREFIX, order.name));
        workbook.push_worksheet(menu_sheet(&menu_name, order_index, order, result, &styles)?);

        let techcard_name = names.claim(&format!("{} - {}", TECHCARD_SHEET_PREFIX, order.name));
        let techcards = techcard_sheet(&techcard_name, order_index, order, result, &styles)?;
        workbook.push_worksheet(techcards);
    }
    Ok(workbook)
}

/// Renders the workbook into memory.
pub fn export_to_bytes(
    result: &ProcurementResult,
    orders: &[Order],
) -> Result<Vec<u8>, ProcurementError> {
    let mut workbook = build_workbook(result, orders)?;
    Ok(workbook.save_to_buffer()?)
}

/// Renders and writes the workbook to `path`.
///
/// The bytes go to a temporary file next to `path` that is renamed over it only
/// once complete, so a failed export never leaves a partial file behind.
pub fn export_to_path(
    result: &ProcurementResult,
    orders: &[Order],
    path: &Path,
) -> Result<(), ProcurementError> {
    let bytes = export_to_bytes(result, orders)?;
    let write_error = |source: std::io::Error| ProcurementError::ExportWrite {
        path: path.display().to_string(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(&bytes).map_err(write_error)?;
    tmp.flush().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;

    info!(path = ?path, sheets = 1 + orders.len() * 2, "procurement workbook written");
    Ok(())
}
