pub mod normalize;
pub mod recipe;
pub mod store;

pub use normalize::{ingredient_key, normalize_name};
pub use recipe::{
    Component, Dimension, Recipe, RecipeIngredient, RecipeKind, RecipeStructure, Unit,
};
pub use store::{Catalog, CatalogStore};
