use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Recipe catalog and procurement lists for catering orders",
    long_about = None
)]
pub struct Cli {
    /// Recipe catalog file (overrides PROCUREMENT_CATALOG_PATH)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Fuzzy match threshold in [0, 1] (overrides PROCUREMENT_MATCH_THRESHOLD)
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import calculation workbooks into the recipe catalog
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Build the procurement workbook for a set of orders (JSON or CSV)
    Procure {
        orders: PathBuf,
        #[arg(short, long, default_value = "procurement.xlsx")]
        output: PathBuf,
    },
    /// Show which catalog recipe each dish name resolves to
    Resolve {
        #[arg(required = true)]
        dishes: Vec<String>,
    },
    /// List catalog recipes
    Catalog,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
