use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::catalog::{
    ingredient_key, Dimension, Recipe, RecipeIngredient, RecipeKind, RecipeStructure, Unit,
};
use crate::error::ProcurementError;

/// Aggregation key: normalized ingredient name plus the unit's dimension, so
/// kilograms and pieces of the same product are never added together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngredientKey {
    pub name: String,
    pub dimension: Dimension,
}

impl IngredientKey {
    pub fn of(name: &str, unit: &Unit) -> Self {
        Self {
            name: ingredient_key(name),
            dimension: unit.dimension(),
        }
    }
}

/// One techcard line at a concrete portion count.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledLine {
    pub name: String,
    pub unit_weight: Decimal,
    pub quantity: Decimal,
    pub unit: Unit,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaledComponent {
    pub name: String,
    pub count_per_portion: Decimal,
    /// `count_per_portion × portions`
    pub units: Decimal,
    pub lines: Vec<ScaledLine>,
}

/// Merged requirement of one ingredient within a dish.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledTotal {
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaledRecipe {
    pub recipe_name: String,
    pub kind: RecipeKind,
    pub portions: u64,
    /// Flat lines of a catering recipe; empty for box recipes.
    pub lines: Vec<ScaledLine>,
    /// Component breakdown of a box recipe; empty for catering recipes.
    pub components: Vec<ScaledComponent>,
    pub totals: IndexMap<IngredientKey, ScaledTotal>,
}

impl ScaledRecipe {
    pub fn total(&self, ingredient: &str) -> Option<&ScaledTotal> {
        let key = ingredient_key(ingredient);
        self.totals.iter().find(|(k, _)| k.name == key).map(|(_, total)| total)
    }
}

/// Adds `quantity` in `unit` to a running total in `total_unit`.
///
/// Equal units add directly; compatible units (g and kg) are both expressed in
/// the base unit first. Returns `None` for different dimensions.
pub fn add_quantity(
    total: Decimal,
    total_unit: &Unit,
    quantity: Decimal,
    unit: &Unit,
) -> Option<(Decimal, Unit)> {
    if total_unit == unit {
        return Some((total + quantity, unit.clone()));
    }
    let base = unit.base();
    let lhs = total_unit.convert(total, &base)?;
    let rhs = unit.convert(quantity, &base)?;
    Some((lhs + rhs, base))
}

fn accumulate(totals: &mut IndexMap<IngredientKey, ScaledTotal>, line: &ScaledLine) {
    let key = IngredientKey::of(&line.name, &line.unit);
    match totals.get_mut(&key) {
        Some(total) => {
            // Same key implies same dimension, so the conversion always succeeds.
            let merged = add_quantity(total.quantity, &total.unit, line.quantity, &line.unit);
            if let Some((quantity, unit)) = merged {
                total.quantity = quantity;
                total.unit = unit;
            }
            if total.category.is_none() {
                total.category = line.category.clone();
            }
        }
        None => {
            totals.insert(
                key,
                ScaledTotal {
                    name: line.name.trim().to_string(),
                    quantity: line.quantity,
                    unit: line.unit.clone(),
                    category: line.category.clone(),
                },
            );
        }
    }
}

fn scale_line(ingredient: &RecipeIngredient, multiplier: Decimal) -> ScaledLine {
    ScaledLine {
        name: ingredient.name.clone(),
        unit_weight: ingredient.unit_weight,
        quantity: ingredient.unit_weight * multiplier,
        unit: ingredient.unit.clone(),
        category: ingredient.category.clone(),
    }
}

/// Scales a recipe to `portions`.
///
/// Catering: `unit_weight × portions`. Box: `unit_weight × count_per_portion ×
/// portions` per component, then merged per ingredient across components.
pub fn scale(recipe: &Recipe, portions: i64) -> Result<ScaledRecipe, ProcurementError> {
    let portion_count = u64::try_from(portions)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ProcurementError::InvalidPortions {
            order: None,
            dish: recipe.name.clone(),
            portions,
        })?;
    let portions_dec = Decimal::from(portion_count);

    let mut scaled = ScaledRecipe {
        recipe_name: recipe.name.clone(),
        kind: recipe.kind(),
        portions: portion_count,
        lines: Vec::new(),
        components: Vec::new(),
        totals: IndexMap::new(),
    };

    match &recipe.structure {
        RecipeStructure::Catering { ingredients } => {
            for ingredient in ingredients {
                let line = scale_line(ingredient, portions_dec);
                accumulate(&mut scaled.totals, &line);
                scaled.lines.push(line);
            }
        }
        RecipeStructure::Box { components } => {
            for component in components {
                let units = component.count_per_portion * portions_dec;
                let lines: Vec<ScaledLine> = component
                    .ingredients
                    .iter()
                    .map(|ingredient| {
                        let mut line = scale_line(ingredient, component.count_per_portion);
                        line.quantity *= portions_dec;
                        line
                    })
                    .collect();
                for line in &lines {
                    accumulate(&mut scaled.totals, line);
                }
                scaled.components.push(ScaledComponent {
                    name: component.name.clone(),
                    count_per_portion: component.count_per_portion,
                    units,
                    lines,
                });
            }
        }
    }

    Ok(scaled)
}
