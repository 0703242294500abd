use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

use crate::catalog::normalize::normalize_name;
use crate::catalog::recipe::Recipe;
use crate::error::ProcurementError;

/// Ordered recipe collection with a normalized-name index.
///
/// Catalog order is the order recipes were first inserted; replacing a recipe
/// keeps its position. The matcher relies on this order for tie-breaks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogFile", into = "CatalogFile")]
pub struct Catalog {
    version: u64,
    recipes: Vec<Recipe>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    version: u64,
    recipes: Vec<Recipe>,
}

impl From<CatalogFile> for Catalog {
    fn from(file: CatalogFile) -> Self {
        let mut catalog = Catalog {
            version: file.version,
            ..Catalog::default()
        };
        for recipe in file.recipes {
            catalog.upsert(recipe);
        }
        catalog
    }
}

impl From<Catalog> for CatalogFile {
    fn from(catalog: Catalog) -> Self {
        CatalogFile {
            version: catalog.version,
            recipes: catalog.recipes,
        }
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let mut catalog = Catalog::new();
        for recipe in recipes {
            catalog.upsert(recipe);
        }
        catalog
    }

    /// Inserts or replaces a recipe by normalized name. Returns the replaced one.
    pub fn upsert(&mut self, recipe: Recipe) -> Option<Recipe> {
        let key = recipe.key();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.recipes[position], recipe)),
            None => {
                self.index.insert(key, self.recipes.len());
                self.recipes.push(recipe);
                None
            }
        }
    }

    /// Lookup by name, modulo case, whitespace and punctuation.
    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.get_by_key(&normalize_name(name))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Recipe> {
        self.index.get(key).and_then(|&position| self.recipes.get(position))
    }

    /// Catalog-order position of the recipe with normalized name `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Shared, read-mostly catalog.
///
/// Readers take an `Arc` snapshot and keep it for the whole run; updates build a
/// complete new `Catalog` and swap it in, so a run never sees a half-applied import.
/// Updates are serialized by `writer`; the `current` lock is only held for the swap.
#[derive(Debug)]
pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
    writer: Mutex<()>,
    path: Option<PathBuf>,
}

impl CatalogStore {
    pub fn in_memory(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            writer: Mutex::new(()),
            path: None,
        }
    }

    /// Opens a JSON-backed store. A missing file starts an empty catalog.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProcurementError> {
        let path = path.into();
        let catalog = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                ProcurementError::CatalogStorage(format!("failed to read {:?}: {}", path, e))
            })?;
            serde_json::from_str::<Catalog>(&contents).map_err(|e| {
                ProcurementError::CatalogStorage(format!("failed to parse {:?}: {}", path, e))
            })?
        } else {
            debug!(path = ?path, "catalog file not found, starting empty");
            Catalog::new()
        };
        info!(path = ?path, recipes = catalog.len(), version = catalog.version(), "catalog loaded");
        Ok(Self {
            current: RwLock::new(Arc::new(catalog)),
            writer: Mutex::new(()),
            path: Some(path),
        })
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Builds the next catalog from the current one and publishes it.
    ///
    /// `apply` runs while no other update can start, so concurrent updates are
    /// applied one after another and none of them is lost. Readers are not
    /// blocked while `apply` runs or while the file is written.
    pub fn update<T, E>(
        &self,
        apply: impl FnOnce(&Catalog) -> Result<(Catalog, T), E>,
    ) -> Result<(u64, T), E>
    where
        E: From<ProcurementError>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();
        let (catalog, value) = apply(&base)?;
        let version = self.publish(catalog, base.version)?;
        Ok((version, value))
    }

    /// Persists `catalog` (when file-backed) and then publishes it as the new
    /// current snapshot. Returns the new version number.
    pub fn replace(&self, catalog: Catalog) -> Result<u64, ProcurementError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base_version = self.snapshot().version;
        self.publish(catalog, base_version)
    }

    fn publish(&self, mut catalog: Catalog, base_version: u64) -> Result<u64, ProcurementError> {
        catalog.version = base_version + 1;
        if let Some(path) = &self.path {
            write_catalog_file(path, &catalog)?;
        }
        let version = catalog.version;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(catalog);
        info!(version, "catalog snapshot replaced");
        Ok(version)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn write_catalog_file(path: &Path, catalog: &Catalog) -> Result<(), ProcurementError> {
    let storage_error = |what: &str, e: &dyn std::fmt::Display| {
        ProcurementError::CatalogStorage(format!("failed to {} {:?}: {}", what, path, e))
    };
    let serialized =
        serde_json::to_string_pretty(catalog).map_err(|e| storage_error("serialize", &e))?;

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| storage_error("create temp file for", &e))?;
    tmp.write_all(serialized.as_bytes())
        .map_err(|e| storage_error("write", &e))?;
    tmp.persist(path).map_err(|e| storage_error("persist", &e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::recipe::{RecipeIngredient, Unit};
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn borscht(weight: i64) -> Recipe {
        Recipe::catering(
            "Борщ",
            vec![RecipeIngredient::new("Буряк", Decimal::new(weight, 2), Unit::Kilogram)],
        )
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut catalog = Catalog::new();
        assert!(catalog.upsert(borscht(10)).is_none());
        catalog.upsert(Recipe::catering("Вареники", vec![]));
        let replaced = catalog.upsert(Recipe {
            name: " борщ ".to_string(),
            ..borscht(20)
        });

        assert_eq!(replaced, Some(borscht(10)));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.recipes()[0].name, " борщ ");
        assert_eq!(catalog.get("БОРЩ").map(|r| r.ingredient_count()), Some(1));
        assert_eq!(catalog.position("борщ"), Some(0));
        assert_eq!(catalog.position("вареники"), Some(1));
    }

    #[test]
    fn test_snapshot_survives_replace() -> anyhow::Result<()> {
        let store = CatalogStore::in_memory(Catalog::from_recipes([borscht(10)]));
        let before = store.snapshot();

        let dumplings = Recipe::catering("Вареники", vec![]);
        let next = Catalog::from_recipes([borscht(10), dumplings]);
        let version = store.replace(next)?;

        assert_eq!(version, 1);
        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
        Ok(())
    }

    #[test]
    fn test_file_store_round_trip() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("catalog.json");

        let store = CatalogStore::open(&path)?;
        assert!(store.snapshot().is_empty());
        store.replace(Catalog::from_recipes([borscht(10)]))?;

        let reopened = CatalogStore::open(&path)?;
        let snapshot = reopened.snapshot();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.get("борщ"), Some(&borscht(10)));
        Ok(())
    }

    #[test]
    fn test_concurrent_updates_all_land() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(CatalogStore::open(dir.path().join("catalog.json"))?);

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        store.update(|base| -> Result<(Catalog, ()), ProcurementError> {
                            let mut next = base.clone();
                            let name = format!("Страва {} {}", worker, n);
                            next.upsert(Recipe::catering(name, vec![]));
                            Ok((next, ()))
                        })?;
                    }
                    Ok::<_, ProcurementError>(())
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread panicked")?;
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 200);
        assert_eq!(snapshot.version(), 200);
        assert_eq!(CatalogStore::open(dir.path().join("catalog.json"))?.snapshot().len(), 200);
        Ok(())
    }

    #[test]
    fn test_readers_are_not_blocked_during_update() -> anyhow::Result<()> {
        let store = CatalogStore::in_memory(Catalog::from_recipes([borscht(10)]));
        let (version, seen) = store.update(|base| -> Result<_, ProcurementError> {
            // A reader inside the update still gets the previous snapshot.
            let during = store.snapshot();
            let mut next = base.clone();
            next.upsert(Recipe::catering("Вареники", vec![]));
            Ok((next, during.len()))
        })?;
        assert_eq!((version, seen), (1, 1));
        assert_eq!(store.snapshot().len(), 2);
        Ok(())
    }

    #[test]
    fn test_failed_update_publishes_nothing() {
        let store = CatalogStore::in_memory(Catalog::from_recipes([borscht(10)]));
        let result = store.update(|_| -> Result<(Catalog, ()), ProcurementError> {
            Err(ProcurementError::CatalogStorage("import failed".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().version(), 0);
    }

    #[test]
    fn test_open_rejects_corrupt_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json")?;

        let result = CatalogStore::open(&path);
        assert!(matches!(result, Err(ProcurementError::CatalogStorage(_))));
        Ok(())
    }
}
