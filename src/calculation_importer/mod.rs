//! Import of historical calculation workbooks into the recipe catalog.
//!
//! A sheet is read top to bottom by a small state machine. A lone name opens a
//! recipe section, a name with a count opens a component (which makes the recipe
//! a box recipe), and name/weight/unit rows are ingredients of whatever is open.
//! Malformed rows never abort the import; they turn into warnings.

pub mod row_shape;
pub mod sheet_loader;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Catalog, Component, Recipe, RecipeIngredient, RecipeStructure};
use crate::error::ProcurementError;

pub use row_shape::{classify_row, CellValue, RowShape};
pub use sheet_loader::{load_calculation_workbook, CalculationSheet};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SectionIssue {
    #[error("partial row skipped: {0}")]
    PartialRow(String),
    #[error("row outside of any recipe section skipped")]
    OrphanRow,
    #[error("component header after flat ingredient rows ignored")]
    ComponentAfterIngredients,
    #[error("component '{0}' has no ingredient rows")]
    EmptyComponent(String),
    #[error("recipe has no ingredient rows")]
    EmptySection,
    #[error("duplicate dish, replaces the one defined on sheet '{sheet}' row {row}")]
    DuplicateDish { sheet: String, row: usize },
}

/// A malformed-section finding, located by sheet, row and recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportWarning {
    pub sheet: String,
    pub row: usize,
    pub section: Option<String>,
    pub issue: SectionIssue,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}", self.sheet, self.row)?;
        if let Some(section) = &self.section {
            write!(f, " ({})", section)?;
        }
        write!(f, ": {}", self.issue)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// Base catalog with every imported recipe applied.
    pub catalog: Catalog,
    pub warnings: Vec<ImportWarning>,
    pub imported: usize,
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug)]
struct RecipeDraft {
    name: String,
    row: usize,
    ingredients: Vec<RecipeIngredient>,
    components: Vec<Component>,
}

impl RecipeDraft {
    fn new(name: String, row: usize) -> Self {
        Self {
            name,
            row,
            ingredients: Vec::new(),
            components: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum ParseState {
    SeekingHeader,
    InIngredients(RecipeDraft),
    InComponent(RecipeDraft),
}

#[derive(Debug)]
struct ParsedRecipe {
    recipe: Recipe,
    sheet: String,
    row: usize,
}

struct SectionParser<'w> {
    sheet: &'w str,
    state: ParseState,
    parsed: Vec<ParsedRecipe>,
    warnings: &'w mut Vec<ImportWarning>,
}

impl<'w> SectionParser<'w> {
    fn new(sheet: &'w str, warnings: &'w mut Vec<ImportWarning>) -> Self {
        Self {
            sheet,
            state: ParseState::SeekingHeader,
            parsed: Vec::new(),
            warnings,
        }
    }

    fn section_name(&self) -> Option<String> {
        match &self.state {
            ParseState::SeekingHeader => None,
            ParseState::InIngredients(draft) | ParseState::InComponent(draft) => {
                Some(draft.name.clone())
            }
        }
    }

    fn warn(&mut self, row: usize, section: Option<String>, issue: SectionIssue) {
        self.warnings.push(ImportWarning {
            sheet: self.sheet.to_string(),
            row,
            section,
            issue,
        });
    }

    fn feed(&mut self, row: usize, shape: RowShape) {
        let section = self.section_name();
        let state = std::mem::replace(&mut self.state, ParseState::SeekingHeader);
        self.state = match (state, shape) {
            (state, RowShape::Blank | RowShape::Summary) => state,
            (state, RowShape::DishHeader { name }) => {
                self.close(state);
                ParseState::InIngredients(RecipeDraft::new(name, row))
            }
            (
                ParseState::SeekingHeader,
                RowShape::ComponentHeader { .. } | RowShape::Ingredient { .. },
            ) => {
                self.warn(row, None, SectionIssue::OrphanRow);
                ParseState::SeekingHeader
            }
            (ParseState::InIngredients(draft), RowShape::ComponentHeader { .. })
                if !draft.ingredients.is_empty() =>
            {
                self.warn(row, section, SectionIssue::ComponentAfterIngredients);
                ParseState::InIngredients(draft)
            }
            (
                ParseState::InIngredients(mut draft) | ParseState::InComponent(mut draft),
                RowShape::ComponentHeader { name, count },
            ) => {
                draft.components.push(Component {
                    name,
                    count_per_portion: count,
                    ingredients: Vec::new(),
                });
                ParseState::InComponent(draft)
            }
            (
                ParseState::InIngredients(mut draft),
                RowShape::Ingredient {
                    name,
                    weight,
                    unit,
                    category,
                },
            ) => {
                draft.ingredients.push(RecipeIngredient {
                    name,
                    unit_weight: weight,
                    unit,
                    category,
                });
                ParseState::InIngredients(draft)
            }
            (
                ParseState::InComponent(mut draft),
                RowShape::Ingredient {
                    name,
                    weight,
                    unit,
                    category,
                },
            ) => {
                if let Some(component) = draft.components.last_mut() {
                    component.ingredients.push(RecipeIngredient {
                        name,
                        unit_weight: weight,
                        unit,
                        category,
                    });
                }
                ParseState::InComponent(draft)
            }
            (state, RowShape::Partial { reason }) => {
                self.warn(row, section, SectionIssue::PartialRow(reason));
                state
            }
        };
    }

    fn close(&mut self, state: ParseState) {
        let draft = match state {
            ParseState::SeekingHeader => return,
            ParseState::InIngredients(draft) | ParseState::InComponent(draft) => draft,
        };

        for component in draft.components.iter().filter(|c| c.ingredients.is_empty()) {
            self.warn(
                draft.row,
                Some(draft.name.clone()),
                SectionIssue::EmptyComponent(component.name.clone()),
            );
        }
        if draft.ingredients.is_empty() && draft.components.is_empty() {
            self.warn(draft.row, Some(draft.name.clone()), SectionIssue::EmptySection);
        }

        let structure = if draft.components.is_empty() {
            RecipeStructure::Catering {
                ingredients: draft.ingredients,
            }
        } else {
            RecipeStructure::Box {
                components: draft.components,
            }
        };
        self.parsed.push(ParsedRecipe {
            recipe: Recipe {
                name: draft.name,
                category: Some(self.sheet.trim().to_string()).filter(|s| !s.is_empty()),
                structure,
            },
            sheet: self.sheet.to_string(),
            row: draft.row,
        });
    }

    fn finish(mut self) -> Vec<ParsedRecipe> {
        let state = std::mem::replace(&mut self.state, ParseState::SeekingHeader);
        self.close(state);
        self.parsed
    }
}

fn parse_sheet(sheet: &CalculationSheet, warnings: &mut Vec<ImportWarning>) -> Vec<ParsedRecipe> {
    let mut parser = SectionParser::new(&sheet.name, warnings);
    for (offset, cells) in sheet.rows.iter().enumerate() {
        parser.feed(sheet.first_row + offset, classify_row(cells));
    }
    parser.finish()
}

/// Applies the recipes found in `sheets` on top of `base`.
///
/// Fails only when no sheet contains a single recipe section; everything else
/// is reported through `ImportOutcome::warnings`. Within one workbook the last
/// definition of a dish wins.
pub fn import_sheets(
    source_name: &str,
    sheets: &[CalculationSheet],
    base: &Catalog,
) -> Result<ImportOutcome, ProcurementError> {
    let mut warnings = Vec::new();
    let mut parsed = Vec::new();
    for sheet in sheets {
        parsed.extend(parse_sheet(sheet, &mut warnings));
    }

    if parsed.is_empty() {
        return Err(ProcurementError::UnreadableSource {
            source_name: source_name.to_string(),
            reason: if sheets.is_empty() {
                "workbook has no sheets".to_string()
            } else {
                "no recognizable recipe sections".to_string()
            },
        });
    }

    let mut catalog = base.clone();
    let mut seen: HashMap<String, (String, usize)> = HashMap::new();
    let (mut added, mut updated) = (0, 0);
    let imported = parsed.len();

    for ParsedRecipe { recipe, sheet, row } in parsed {
        let key = recipe.key();
        let previous = seen.insert(key.clone(), (sheet.clone(), row));
        if let Some((previous_sheet, previous_row)) = previous {
            warnings.push(ImportWarning {
                sheet,
                row,
                section: Some(recipe.name.clone()),
                issue: SectionIssue::DuplicateDish {
                    sheet: previous_sheet,
                    row: previous_row,
                },
            });
        } else if base.get_by_key(&key).is_some() {
            updated += 1;
        } else {
            added += 1;
        }
        catalog.upsert(recipe);
    }

    for warning in &warnings {
        warn!(source = source_name, "{}", warning);
    }
    info!(
        source = source_name,
        imported,
        added,
        updated,
        warnings = warnings.len(),
        "calculation workbook imported"
    );

    Ok(ImportOutcome {
        catalog,
        warnings,
        imported,
        added,
        updated,
    })
}

/// Loads a calculation workbook from disk and imports it on top of `base`.
pub fn import_workbook(path: &Path, base: &Catalog) -> Result<ImportOutcome, ProcurementError> {
    let sheets = load_calculation_workbook(path)?;
    import_sheets(&path.display().to_string(), &sheets, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RecipeKind, Unit};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn first_courses() -> CalculationSheet {
        CalculationSheet::new(
            "Перші страви",
            vec![
                vec![t("Борщ")],
                vec![t("Буряк"), n(0.1), t("кг"), t("Овочі")],
                vec![t("Капуста"), t("0,08"), t("кг"), t("Овочі")],
                vec![t("Разом"), n(0.18)],
                vec![],
                vec![t("Сендвіч-бокс")],
                vec![t("Сендвіч з куркою"), n(2.0)],
                vec![t("Хліб"), n(0.04), t("кг")],
                vec![t("Курка"), n(0.03), t("кг"), t("М'ясо")],
                vec![t("Тост"), n(1.0)],
                vec![t("Хліб"), n(0.025), t("кг")],
            ],
        )
    }

    #[test]
    fn test_import_detects_catering_and_box_sections() -> anyhow::Result<()> {
        let outcome = import_sheets("test", &[first_courses()], &Catalog::new())?;
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.added, 2);

        let borscht = outcome.catalog.get("борщ").unwrap();
        assert_eq!(borscht.kind(), RecipeKind::Catering);
        assert_eq!(borscht.category.as_deref(), Some("Перші страви"));
        match &borscht.structure {
            RecipeStructure::Catering { ingredients } => {
                assert_eq!(ingredients.len(), 2);
                assert_eq!(ingredients[0].unit_weight, dec("0.1"));
                assert_eq!(ingredients[1].unit_weight, dec("0.08"));
                assert_eq!(ingredients[1].unit, Unit::Kilogram);
                assert_eq!(ingredients[0].category.as_deref(), Some("Овочі"));
            }
            other => panic!("unexpected structure {:?}", other),
        }

        let sandwich = outcome.catalog.get("Сендвіч-бокс").unwrap();
        match &sandwich.structure {
            RecipeStructure::Box { components } => {
                assert_eq!(components.len(), 2);
                assert_eq!(components[0].count_per_portion, dec("2"));
                assert_eq!(components[0].ingredients.len(), 2);
                assert_eq!(components[1].ingredients[0].unit_weight, dec("0.025"));
            }
            other => panic!("unexpected structure {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_partial_and_orphan_rows_become_warnings() -> anyhow::Result<()> {
        let sheet = CalculationSheet::new(
            "Салати",
            vec![
                vec![t("Цибуля"), n(0.01), t("кг")],
                vec![t("Олів'є")],
                vec![t("Картопля"), t("багато"), t("кг")],
                vec![t("Горошок"), n(0.03), t("кг")],
            ],
        );
        let outcome = import_sheets("test", &[sheet], &Catalog::new())?;

        let issues: Vec<_> = outcome.warnings.iter().map(|w| (w.row, w.issue.clone())).collect();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0], (1, SectionIssue::OrphanRow));
        assert_eq!(outcome.warnings[1].row, 3);
        assert_eq!(outcome.warnings[1].section.as_deref(), Some("Олів'є"));
        assert!(matches!(outcome.warnings[1].issue, SectionIssue::PartialRow(_)));
        assert_eq!(outcome.catalog.get("олівє").unwrap().ingredient_count(), 1);
        Ok(())
    }

    #[test]
    fn test_duplicate_dish_last_write_wins() -> anyhow::Result<()> {
        let first = CalculationSheet::new(
            "A",
            vec![vec![t("Борщ")], vec![t("Буряк"), n(0.1), t("кг")]],
        );
        let second = CalculationSheet::new(
            "B",
            vec![vec![t("борщ ")], vec![t("Буряк"), n(0.2), t("кг")]],
        );
        let outcome = import_sheets("test", &[first, second], &Catalog::new())?;

        assert_eq!(outcome.catalog.len(), 1);
        assert_eq!(outcome.added, 1);
        let warning = &outcome.warnings[0];
        assert_eq!(warning.sheet, "B");
        assert_eq!(
            warning.issue,
            SectionIssue::DuplicateDish {
                sheet: "A".to_string(),
                row: 1
            }
        );
        match &outcome.catalog.get("борщ").unwrap().structure {
            RecipeStructure::Catering { ingredients } => {
                assert_eq!(ingredients[0].unit_weight, dec("0.2"))
            }
            other => panic!("unexpected structure {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_existing_recipes_count_as_updated() -> anyhow::Result<()> {
        let base = Catalog::from_recipes([
            Recipe::catering("Борщ", vec![]),
            Recipe::catering("Компот", vec![]),
        ]);
        let outcome = import_sheets("test", &[first_courses()], &base)?;
        assert_eq!((outcome.added, outcome.updated), (1, 1));
        assert_eq!(outcome.catalog.len(), 3);
        assert_eq!(outcome.catalog.recipes()[0].ingredient_count(), 2);
        assert_eq!(base.get("борщ").unwrap().ingredient_count(), 0);
        Ok(())
    }

    #[test]
    fn test_component_after_flat_ingredients_is_ignored() -> anyhow::Result<()> {
        let sheet = CalculationSheet::new(
            "Бокси",
            vec![
                vec![t("Ланч")],
                vec![t("Рис"), n(0.15), t("кг")],
                vec![t("Соус"), n(1.0)],
                vec![t("Вершки"), n(0.02), t("л")],
            ],
        );
        let outcome = import_sheets("test", &[sheet], &Catalog::new())?;
        assert_eq!(outcome.warnings[0].issue, SectionIssue::ComponentAfterIngredients);
        let lunch = outcome.catalog.get("ланч").unwrap();
        assert_eq!(lunch.kind(), RecipeKind::Catering);
        assert_eq!(lunch.ingredient_count(), 2);
        Ok(())
    }

    #[test]
    fn test_empty_sections_are_kept_with_warnings() -> anyhow::Result<()> {
        let sheet = CalculationSheet::new(
            "Напої",
            vec![vec![t("Вода")], vec![t("Чай")], vec![t("Пакетик"), n(1.0)]],
        );
        let outcome = import_sheets("test", &[sheet], &Catalog::new())?;
        assert_eq!(outcome.catalog.len(), 2);
        let issues: Vec<_> = outcome.warnings.iter().map(|w| w.issue.clone()).collect();
        assert_eq!(
            issues,
            vec![SectionIssue::EmptySection, SectionIssue::EmptyComponent("Пакетик".to_string())]
        );
        assert_eq!(outcome.catalog.get("чай").unwrap().kind(), RecipeKind::Box);
        Ok(())
    }

    #[test]
    fn test_workbook_without_sections_is_unreadable() {
        let sheet = CalculationSheet::new("Порожній", vec![vec![], vec![t("Разом"), n(0.0)]]);
        let result = import_sheets("empty.xlsx", &[sheet], &Catalog::new());
        assert!(matches!(result, Err(ProcurementError::UnreadableSource { .. })));
        assert!(matches!(
            import_sheets("none.xlsx", &[], &Catalog::new()),
            Err(ProcurementError::UnreadableSource { .. })
        ));
    }

    #[test]
    fn test_warning_display_names_location() {
        let warning = ImportWarning {
            sheet: "Салати".to_string(),
            row: 7,
            section: Some("Олів'є".to_string()),
            issue: SectionIssue::OrphanRow,
        };
        assert_eq!(
            warning.to_string(),
            "Салати row 7 (Олів'є): row outside of any recipe section skipped"
        );
    }
}
