use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::normalize::normalize_name;

/// Unit of measure of an ingredient quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    #[default]
    Kilogram,
    Gram,
    Litre,
    Millilitre,
    Piece,
    Other(String),
}

/// Physical dimension of a unit; quantities only add up within one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Mass,
    Volume,
    Count,
    Other(String),
}

impl Unit {
    pub fn parse(raw: &str) -> Unit {
        let normalized = normalize_name(raw);
        match normalized.as_str() {
            "кг" | "kg" => Unit::Kilogram,
            "г" | "гр" | "g" | "gr" => Unit::Gram,
            "л" | "l" => Unit::Litre,
            "мл" | "ml" => Unit::Millilitre,
            "шт" | "pcs" | "pc" => Unit::Piece,
            _ => Unit::Other(normalized),
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Unit::Kilogram | Unit::Gram => Dimension::Mass,
            Unit::Litre | Unit::Millilitre => Dimension::Volume,
            Unit::Piece => Dimension::Count,
            Unit::Other(label) => Dimension::Other(normalize_name(label)),
        }
    }

    /// The unit totals are expressed in when a bucket mixes compatible units.
    pub fn base(&self) -> Unit {
        match self {
            Unit::Gram => Unit::Kilogram,
            Unit::Millilitre => Unit::Litre,
            other => other.clone(),
        }
    }

    /// Converts `quantity` from this unit into `target`, if both share a dimension.
    pub fn convert(&self, quantity: Decimal, target: &Unit) -> Option<Decimal> {
        if self == target {
            return Some(quantity);
        }
        let thousand = Decimal::from(1000);
        match (self, target) {
            (Unit::Gram, Unit::Kilogram) | (Unit::Millilitre, Unit::Litre) => {
                Some(quantity / thousand)
            }
            (Unit::Kilogram, Unit::Gram) | (Unit::Litre, Unit::Millilitre) => {
                Some(quantity * thousand)
            }
            _ if self.dimension() == target.dimension() => Some(quantity),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
            Unit::Litre => "l",
            Unit::Millilitre => "ml",
            Unit::Piece => "pcs",
            Unit::Other(label) => label,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Unit {
    fn from(raw: String) -> Self {
        Unit::parse(&raw)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.label().to_string()
    }
}

/// One ingredient line of a techcard: weight per single portion (catering)
/// or per single component unit (box).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecipeIngredient {
    pub name: String,
    pub unit_weight: Decimal,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RecipeIngredient {
    pub fn new(name: impl Into<String>, unit_weight: Decimal, unit: Unit) -> Self {
        Self {
            name: name.into(),
            unit_weight,
            unit,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A named part of a box recipe, served `count_per_portion` times per portion.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub count_per_portion: Decimal,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeKind {
    Catering,
    Box,
}

impl fmt::Display for RecipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeKind::Catering => f.write_str("catering"),
            RecipeKind::Box => f.write_str("box"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecipeStructure {
    /// Flat list, weights per portion.
    Catering { ingredients: Vec<RecipeIngredient> },
    /// Ingredients nested under components.
    Box { components: Vec<Component> },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub structure: RecipeStructure,
}

impl Recipe {
    pub fn catering(name: impl Into<String>, ingredients: Vec<RecipeIngredient>) -> Self {
        Self {
            name: name.into(),
            category: None,
            structure: RecipeStructure::Catering { ingredients },
        }
    }

    pub fn boxed(name: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            name: name.into(),
            category: None,
            structure: RecipeStructure::Box { components },
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn kind(&self) -> RecipeKind {
        match self.structure {
            RecipeStructure::Catering { .. } => RecipeKind::Catering,
            RecipeStructure::Box { .. } => RecipeKind::Box,
        }
    }

    /// Catalog identity of the recipe.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn ingredient_count(&self) -> usize {
        match &self.structure {
            RecipeStructure::Catering { ingredients } => ingredients.len(),
            RecipeStructure::Box { components } => {
                components.iter().map(|c| c.ingredients.len()).sum()
            }
        }
    }
}
