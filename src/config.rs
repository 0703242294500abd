use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::search::recipe_matcher::{MatcherConfig, DEFAULT_MATCH_THRESHOLD};

pub const CATALOG_PATH_ENV_VAR: &str = "PROCUREMENT_CATALOG_PATH";
pub const MATCH_THRESHOLD_ENV_VAR: &str = "PROCUREMENT_MATCH_THRESHOLD";
const DEFAULT_CATALOG_PATH: &str = "catalog.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub catalog_path: PathBuf,
    pub match_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

fn check_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(anyhow!("Match threshold must be between 0 and 1, got {}", threshold))
    }
}

impl Settings {
    /// Reads settings from the process environment (call `dotenv` first).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Settings::default();
        if let Some(path) = lookup(CATALOG_PATH_ENV_VAR).filter(|p| !p.trim().is_empty()) {
            settings.catalog_path = PathBuf::from(path.trim());
        }
        if let Some(raw) = lookup(MATCH_THRESHOLD_ENV_VAR) {
            let threshold: f64 = raw
                .trim()
                .parse()
                .with_context(|| {
                    format!("{} is not a number: '{}'", MATCH_THRESHOLD_ENV_VAR, raw)
                })?;
            settings.match_threshold = check_threshold(threshold)?;
        }
        Ok(settings)
    }

    /// Applies command-line overrides on top of the environment values.
    pub fn with_overrides(
        mut self,
        catalog_path: Option<PathBuf>,
        threshold: Option<f64>,
    ) -> Result<Self> {
        if let Some(path) = catalog_path {
            self.catalog_path = path;
        }
        if let Some(threshold) = threshold {
            self.match_threshold = check_threshold(threshold)?;
        }
        Ok(self)
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            threshold: self.match_threshold,
        }
    }
}
