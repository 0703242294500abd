use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::catalog::{Catalog, Unit};
use crate::error::ProcurementError;
use crate::order::Order;
use crate::recipe_scaler::{add_quantity, scale, IngredientKey, ScaledRecipe};
use crate::search::recipe_matcher::{MatchOutcome, RecipeMatcher};
use crate::search::similarity::Similarity;

/// Shopping-list bucket for ingredients without a category in the catalog.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Share of one dish of one order in an ingredient total.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub order: String,
    pub dish: String,
    pub quantity: Decimal,
    pub unit: Unit,
}

/// One shopping-list row.
///
/// `name` and `category` come from the contributing recipe that is earliest in
/// catalog order, so they do not depend on the order of the order list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcurementLine {
    pub name: String,
    pub total: Decimal,
    pub unit: Unit,
    pub category: String,
    pub contributions: Vec<Contribution>,
    name_rank: usize,
    category_rank: Option<usize>,
}

/// Where a contribution comes from: catalog position of its recipe plus the
/// ingredient label and category that recipe gives it.
struct Source<'a> {
    rank: usize,
    name: &'a str,
    category: Option<&'a str>,
}

/// A dish line that resolved to a catalog recipe, scaled to its portions.
#[derive(Debug, Clone)]
pub struct ResolvedDish {
    pub order_index: usize,
    pub line_index: usize,
    pub requested: String,
    pub score: f64,
    pub exact: bool,
    pub scaled: ScaledRecipe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedDish {
    pub order: String,
    pub order_index: usize,
    pub line_index: usize,
    pub dish: String,
    pub portions: i64,
    /// Closest catalog name and its score, when the catalog is not empty.
    pub closest: Option<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationWarning {
    /// The same ingredient is measured in incompatible units across recipes,
    /// so it appears once per dimension on the shopping list.
    MixedDimensions { ingredient: String, units: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct ProcurementResult {
    pub lines: IndexMap<IngredientKey, ProcurementLine>,
    pub dishes: Vec<ResolvedDish>,
}

impl ProcurementResult {
    /// First line whose normalized name matches `ingredient`.
    pub fn line(&self, ingredient: &str) -> Option<&ProcurementLine> {
        let key = crate::catalog::ingredient_key(ingredient);
        self.lines.iter().find(|(k, _)| k.name == key).map(|(_, line)| line)
    }

    /// Lines grouped by category (uncategorized last), sorted by name within one.
    pub fn by_category(&self) -> Vec<(&str, Vec<&ProcurementLine>)> {
        let mut groups: BTreeMap<(bool, &str), Vec<(&IngredientKey, &ProcurementLine)>> =
            BTreeMap::new();
        for (key, line) in &self.lines {
            let category = line.category.as_str();
            groups
                .entry((category == UNCATEGORIZED, category))
                .or_default()
                .push((key, line));
        }
        groups
            .into_iter()
            .map(|((_, category), mut lines)| {
                lines.sort_by(|a, b| a.0.cmp(b.0));
                (category, lines.into_iter().map(|(_, line)| line).collect())
            })
            .collect()
    }

    pub fn dish(&self, order_index: usize, line_index: usize) -> Option<&ResolvedDish> {
        self.dishes
            .iter()
            .find(|d| d.order_index == order_index && d.line_index == line_index)
    }

    pub fn dishes_of(&self, order_index: usize) -> impl Iterator<Item = &ResolvedDish> {
        self.dishes.iter().filter(move |d| d.order_index == order_index)
    }
}

#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub result: ProcurementResult,
    pub unresolved: Vec<UnresolvedDish>,
    pub warnings: Vec<AggregationWarning>,
}

fn validate(orders: &[Order]) -> Result<(), ProcurementError> {
    if orders.is_empty() {
        return Err(ProcurementError::EmptyOrderSet);
    }
    for order in orders {
        if let Some(line) = order.items.iter().find(|line| line.portions <= 0) {
            return Err(ProcurementError::InvalidPortions {
                order: Some(order.name.clone()),
                dish: line.dish.clone(),
                portions: line.portions,
            });
        }
    }
    Ok(())
}

fn merge(
    lines: &mut IndexMap<IngredientKey, ProcurementLine>,
    key: IngredientKey,
    contribution: Contribution,
    source: Source<'_>,
) {
    match lines.get_mut(&key) {
        Some(line) => {
            let merged = add_quantity(
                line.total,
                &line.unit,
                contribution.quantity,
                &contribution.unit,
            );
            if let Some((total, unit)) = merged {
                line.total = total;
                line.unit = unit;
            }
            if source.rank < line.name_rank {
                line.name = source.name.to_string();
                line.name_rank = source.rank;
            }
            if let Some(category) = source.category {
                if !matches!(line.category_rank, Some(rank) if rank <= source.rank) {
                    line.category = category.to_string();
                    line.category_rank = Some(source.rank);
                }
            }
            line.contributions.push(contribution);
        }
        None => {
            lines.insert(
                key,
                ProcurementLine {
                    name: source.name.to_string(),
                    total: contribution.quantity,
                    unit: contribution.unit.clone(),
                    category: source.category.unwrap_or(UNCATEGORIZED).to_string(),
                    contributions: vec![contribution],
                    name_rank: source.rank,
                    category_rank: source.category.map(|_| source.rank),
                },
            );
        }
    }
}

fn mixed_dimension_warnings(
    lines: &IndexMap<IngredientKey, ProcurementLine>,
) -> Vec<AggregationWarning> {
    let mut by_name: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for (key, line) in lines {
        by_name
            .entry(key.name.as_str())
            .or_default()
            .insert(line.unit.label().to_string());
    }
    by_name
        .into_iter()
        .filter(|(_, units)| units.len() > 1)
        .map(|(ingredient, units)| AggregationWarning::MixedDimensions {
            ingredient: ingredient.to_string(),
            units: units.into_iter().collect(),
        })
        .collect()
}

/// Resolves, scales and merges every dish of every order.
///
/// The whole order set is validated before any work; unresolvable dishes are
/// collected and skipped. Totals depend only on the multiset of dishes, while
/// contributions keep order-list then line order.
pub fn aggregate<S: Similarity>(
    orders: &[Order],
    catalog: &Catalog,
    matcher: &RecipeMatcher<S>,
) -> Result<AggregationOutcome, ProcurementError> {
    validate(orders)?;

    let mut result = ProcurementResult::default();
    let mut unresolved = Vec::new();

    for (order_index, order) in orders.iter().enumerate() {
        for (line_index, item) in order.items.iter().enumerate() {
            let found = match matcher.lookup(&item.dish, catalog) {
                MatchOutcome::Found(found) => found,
                MatchOutcome::NotFound { best } => {
                    warn!(
                        order = %order.name,
                        dish = %item.dish,
                        "dish not found in recipe catalog"
                    );
                    unresolved.push(UnresolvedDish {
                        order: order.name.clone(),
                        order_index,
                        line_index,
                        dish: item.dish.clone(),
                        portions: item.portions,
                        closest: best.map(|(recipe, score)| (recipe.name.clone(), score)),
                    });
                    continue;
                }
            };

            let scaled = scale(found.recipe, item.portions).map_err(|e| match e {
                ProcurementError::InvalidPortions { dish, portions, .. } => {
                    ProcurementError::InvalidPortions {
                        order: Some(order.name.clone()),
                        dish,
                        portions,
                    }
                }
                other => other,
            })?;

            let rank = catalog.position(&found.recipe.key()).unwrap_or(usize::MAX);
            for (key, total) in &scaled.totals {
                let contribution = Contribution {
                    order: order.name.clone(),
                    dish: found.recipe.name.clone(),
                    quantity: total.quantity,
                    unit: total.unit.clone(),
                };
                // Ingredient category first, then the recipe's own category.
                let category = total.category.as_deref().or(found.recipe.category.as_deref());
                let source = Source {
                    rank,
                    name: &total.name,
                    category,
                };
                merge(&mut result.lines, key.clone(), contribution, source);
            }

            result.dishes.push(ResolvedDish {
                order_index,
                line_index,
                requested: item.dish.clone(),
                score: found.score,
                exact: found.exact,
                scaled,
            });
        }
    }

    let warnings = mixed_dimension_warnings(&result.lines);
    for warning in &warnings {
        warn!(?warning, "ingredient listed in incompatible units");
    }
    info!(
        orders = orders.len(),
        dishes = result.dishes.len(),
        unresolved = unresolved.len(),
        ingredients = result.lines.len(),
        "procurement aggregated"
    );

    Ok(AggregationOutcome {
        result,
        unresolved,
        warnings,
    })
}
