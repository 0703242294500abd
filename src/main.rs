use anyhow::{Context, Result};
use std::sync::Arc;
use techcard_procurement::catalog::CatalogStore;
use techcard_procurement::cli::{parse_args, Command};
use techcard_procurement::config::Settings;
use techcard_procurement::pipeline::{import_calculation_file, load_order_file, run_procurement};
use techcard_procurement::search::{MatchOutcome, RecipeMatcher};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = parse_args();
    init_logging(cli.verbose);

    let settings = Settings::from_env()?.with_overrides(cli.catalog.clone(), cli.threshold)?;
    let store = Arc::new(
        CatalogStore::open(&settings.catalog_path)
            .with_context(|| format!("Failed to open recipe catalog {:?}", settings.catalog_path))?,
    );

    match cli.command {
        Command::Import { files } => {
            for file in files {
                println!("Importing calculation workbook {:?}...", file);
                let report = import_calculation_file(file, Arc::clone(&store)).await?;
                println!(
                    "  {} recipes imported ({} new, {} updated), catalog version {}",
                    report.imported, report.added, report.updated, report.catalog_version
                );
                for warning in &report.warnings {
                    println!("  warning: {}", warning);
                }
            }
        }
        Command::Procure { orders, output } => {
            let orders = load_order_file(orders).await?;
            println!("Loaded {} orders. Aggregating...", orders.len());
            let config = settings.matcher_config();
            let outcome =
                run_procurement(orders, Arc::clone(&store), config, output.clone()).await?;

            println!(
                "Procurement list written to {:?}: {} ingredients from {} dishes.",
                output,
                outcome.result.lines.len(),
                outcome.result.dishes.len()
            );
            for dish in &outcome.unresolved {
                match &dish.closest {
                    Some((name, score)) => println!(
                        "  NOT FOUND: '{}' in order '{}' (closest: '{}', {:.2})",
                        dish.dish, dish.order, name, score
                    ),
                    None => println!("  NOT FOUND: '{}' in order '{}'", dish.dish, dish.order),
                }
            }
            for warning in &outcome.warnings {
                println!("  warning: {:?}", warning);
            }
        }
        Command::Resolve { dishes } => {
            let catalog = store.snapshot();
            let matcher = RecipeMatcher::new(settings.matcher_config());
            for dish in dishes {
                match matcher.lookup(&dish, &catalog) {
                    MatchOutcome::Found(found) => println!(
                        "'{}' -> '{}' ({}, score {:.2})",
                        dish,
                        found.recipe.name,
                        if found.exact { "exact" } else { "approximate" },
                        found.score
                    ),
                    MatchOutcome::NotFound { best: Some((recipe, score)) } => {
                        println!(
                            "'{}' -> not found (closest: '{}', {:.2})",
                            dish, recipe.name, score
                        )
                    }
                    MatchOutcome::NotFound { best: None } => println!("'{}' -> not found", dish),
                }
            }
        }
        Command::Catalog => {
            let catalog = store.snapshot();
            println!("Catalog version {}, {} recipes:", catalog.version(), catalog.len());
            for recipe in catalog.recipes() {
                println!(
                    "  {} [{}] {}, {} ingredient lines",
                    recipe.name,
                    recipe.kind(),
                    recipe.category.as_deref().unwrap_or("-"),
                    recipe.ingredient_count()
                );
            }
        }
    }

    Ok(())
}
