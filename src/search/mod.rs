pub mod recipe_matcher;
pub mod similarity;

pub use recipe_matcher::{
    MatchOutcome, MatcherConfig, RecipeMatch, RecipeMatcher, DEFAULT_MATCH_THRESHOLD,
};
pub use similarity::{NormalizedLevenshtein, Similarity};
