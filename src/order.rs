use anyhow::{Context, Result};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ORDER_COL: &str = "order";
const DISH_COL: &str = "dish";
const PORTIONS_COL: &str = "portions";

/// One dish of an order. Upstream may attach a price; it is carried along but
/// never rendered into procurement sheets.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderLine {
    pub dish: String,
    pub portions: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl OrderLine {
    pub fn new(dish: impl Into<String>, portions: i64) -> Self {
        Self {
            dish: dish.into(),
            portions,
            price: None,
        }
    }
}

/// A KP: labelled bundle of dishes with portion counts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Order {
    pub name: String,
    #[serde(alias = "lines")]
    pub items: Vec<OrderLine>,
}

impl Order {
    pub fn new(name: impl Into<String>, items: Vec<OrderLine>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

pub fn load_orders_json(path: &Path) -> Result<Vec<Order>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read order file {:?}", path))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse orders from {:?}", path))
}

/// Reads `order,dish,portions` rows. Rows of one order need not be adjacent;
/// orders keep the position of their first row, lines keep file order.
pub fn load_orders_csv(path: &Path) -> Result<Vec<Order>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open order CSV file at {:?}", path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(file);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", name))
    };
    let order_idx = column(ORDER_COL)?;
    let dish_idx = column(DISH_COL)?;
    let portions_idx = column(PORTIONS_COL)?;

    let mut orders: Vec<Order> = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("Failed to read record at row index {}", row_index))?;
        let order_name = record.get(order_idx).unwrap_or_default();
        let dish = record.get(dish_idx).unwrap_or_default();
        if order_name.is_empty() || dish.is_empty() {
            continue;
        }
        let raw_portions = record.get(portions_idx).unwrap_or_default();
        let portions: i64 = raw_portions
            .parse()
            .with_context(|| {
                format!("Invalid portion count '{}' at row index {}", raw_portions, row_index)
            })?;

        let line = OrderLine::new(dish, portions);
        match orders.iter_mut().find(|o| o.name == order_name) {
            Some(order) => order.items.push(line),
            None => orders.push(Order::new(order_name, vec![line])),
        }
    }

    if orders.is_empty() {
        return Err(anyhow::anyhow!("No orders loaded from {:?}", path));
    }
    Ok(orders)
}

/// Picks the loader by extension: `.csv` or JSON for anything else.
pub fn load_orders(path: &Path) -> Result<Vec<Order>> {
    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        load_orders_csv(path)
    } else {
        load_orders_json(path)
    }
}
