use tracing::debug;

use crate::catalog::{normalize_name, Catalog, Recipe};
use crate::search::similarity::{NormalizedLevenshtein, Similarity};

/// Default acceptance threshold for approximate matches.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherConfig {
    pub threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecipeMatch<'a> {
    pub recipe: &'a Recipe,
    pub score: f64,
    pub exact: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum MatchOutcome<'a> {
    Found(RecipeMatch<'a>),
    /// `best` is the closest catalog entry that missed the threshold.
    NotFound { best: Option<(&'a Recipe, f64)> },
}

impl<'a> MatchOutcome<'a> {
    pub fn found(self) -> Option<RecipeMatch<'a>> {
        match self {
            MatchOutcome::Found(m) => Some(m),
            MatchOutcome::NotFound { .. } => None,
        }
    }
}

/// Resolves free-text dish names against a catalog snapshot.
///
/// Exact normalized match first, then the most similar catalog name if its ratio
/// reaches `config.threshold`. Equal scores prefer a candidate of the same
/// normalized length, then the earliest one in catalog order.
#[derive(Debug, Clone)]
pub struct RecipeMatcher<S = NormalizedLevenshtein> {
    config: MatcherConfig,
    similarity: S,
}

impl RecipeMatcher<NormalizedLevenshtein> {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            similarity: NormalizedLevenshtein,
        }
    }
}

impl<S: Similarity> RecipeMatcher<S> {
    pub fn with_similarity(config: MatcherConfig, similarity: S) -> Self {
        Self { config, similarity }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn resolve<'a>(&self, dish_name: &str, catalog: &'a Catalog) -> Option<RecipeMatch<'a>> {
        self.lookup(dish_name, catalog).found()
    }

    pub fn lookup<'a>(&self, dish_name: &str, catalog: &'a Catalog) -> MatchOutcome<'a> {
        let candidate = normalize_name(dish_name);
        if let Some(recipe) = catalog.get_by_key(&candidate) {
            return MatchOutcome::Found(RecipeMatch {
                recipe,
                score: 1.0,
                exact: true,
            });
        }

        let candidate_len = candidate.chars().count();
        let mut best: Option<(&Recipe, f64, bool)> = None;
        for recipe in catalog.recipes() {
            let key = recipe.key();
            let score = self.similarity.ratio(&candidate, &key);
            let same_length = key.chars().count() == candidate_len;
            let better = match best {
                None => true,
                Some((_, best_score, best_same_length)) => {
                    score > best_score || (score == best_score && same_length && !best_same_length)
                }
            };
            if better {
                best = Some((recipe, score, same_length));
            }
        }

        match best {
            Some((recipe, score, _)) if score >= self.config.threshold => {
                debug!(dish = dish_name, matched = %recipe.name, score, "approximate recipe match");
                MatchOutcome::Found(RecipeMatch {
                    recipe,
                    score,
                    exact: false,
                })
            }
            other => {
                debug!(dish = dish_name, best_score = other.map(|(_, s, _)| s), "no recipe match");
                MatchOutcome::NotFound {
                    best: other.map(|(recipe, score, _)| (recipe, score)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RecipeIngredient, Unit};
    use rust_decimal::Decimal;

    fn catalog() -> Catalog {
        Catalog::from_recipes([
            Recipe::catering(
                "Борщ",
                vec![RecipeIngredient::new("Буряк", Decimal::new(1, 1), Unit::Kilogram)],
            ),
            Recipe::catering("Вареники з картоплею", vec![]),
            Recipe::catering("Олів'є", vec![]),
        ])
    }

    #[test]
    fn test_exact_match_ignores_case_and_spacing() {
        let catalog = catalog();
        let matcher = RecipeMatcher::new(MatcherConfig::default());
        let found = matcher.resolve("  вареники  З картоплею", &catalog).unwrap();
        assert!(found.exact);
        assert_eq!(found.recipe.name, "Вареники з картоплею");
        assert_eq!(matcher.resolve("ОЛІВЄ", &catalog).unwrap().recipe.name, "Олів'є");
    }

    #[test]
    fn test_typo_within_threshold_resolves() {
        let catalog = catalog();
        let matcher = RecipeMatcher::new(MatcherConfig::default());
        let found = matcher.resolve("Бор щ", &catalog).unwrap();
        assert!(!found.exact);
        assert_eq!(found.recipe.name, "Борщ");
    }

    #[test]
    fn test_below_threshold_is_not_found_with_best_candidate() {
        let catalog = catalog();
        let matcher = RecipeMatcher::new(MatcherConfig { threshold: 0.95 });
        match matcher.lookup("Бор щ", &catalog) {
            MatchOutcome::NotFound { best: Some((recipe, score)) } => {
                assert_eq!(recipe.name, "Борщ");
                assert!(score < 0.95);
            }
            other => panic!("expected a near miss, got {:?}", other),
        }
        assert!(matcher.resolve("Піца", &catalog).is_none());
    }

    #[test]
    fn test_empty_catalog_never_matches() {
        let empty = Catalog::new();
        let outcome = RecipeMatcher::new(MatcherConfig::default()).lookup("Борщ", &empty);
        assert!(matches!(outcome, MatchOutcome::NotFound { best: None }));
    }

    #[test]
    fn test_tie_prefers_same_length_then_catalog_order() {
        let catalog = Catalog::from_recipes([
            Recipe::catering("abcde", vec![]),
            Recipe::catering("abcx", vec![]),
            Recipe::catering("abcy", vec![]),
        ]);
        let flat = |_: &str, _: &str| 0.9;
        let matcher = RecipeMatcher::with_similarity(MatcherConfig::default(), flat);

        // Every candidate scores the same; "abcz" has length 4 like "abcx" and "abcy".
        assert_eq!(matcher.resolve("abcz", &catalog).unwrap().recipe.name, "abcx");
        // No candidate has length 2, so the first in catalog order wins.
        assert_eq!(matcher.resolve("ab", &catalog).unwrap().recipe.name, "abcde");
    }

    #[test]
    fn test_exact_match_is_stable_across_catalog_sizes() {
        let mut recipes: Vec<Recipe> = (0..50)
            .map(|i| Recipe::catering(format!("Страва {}", i), vec![]))
            .collect();
        recipes.push(Recipe::catering("Борщ", vec![]));
        recipes.reverse();
        let big = Catalog::from_recipes(recipes);
        let matcher = RecipeMatcher::new(MatcherConfig::default());
        assert_eq!(matcher.resolve("Борщ", &big).unwrap().recipe.name, "Борщ");
        assert_eq!(matcher.resolve("Борщ", &catalog()).unwrap().recipe.name, "Борщ");
    }
}
