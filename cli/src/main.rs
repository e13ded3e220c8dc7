mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::{
    cmd_ingredient_add, cmd_ingredient_list, cmd_list_add, cmd_list_check,
    cmd_list_clear_checked, cmd_list_export, cmd_list_remove, cmd_list_share, cmd_list_show,
    cmd_list_sync, cmd_plan_clear, cmd_plan_set, cmd_plan_show, cmd_recipe_add_ingredient,
    cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list,
    cmd_recipe_remove_ingredient, cmd_recipe_show,
};
use crate::config::Config;
use basket_core::service::BasketService;

const DEFAULT_LOG_FILTER: &str = "basket=info,basket_core=info";

#[derive(Parser)]
#[command(
    name = "basket",
    version,
    about = "Plan the week's meals, get the grocery list",
    long_about = "Plan the week's meals, get the grocery list.\n\n\
        `basket list sync` turns the meals planned at home into a shopping list \
        and keeps it current as plans change. Checked and hand-added items are \
        never touched."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the ingredient catalog
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Plan meals for the week
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Work with the week's grocery list
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient to the catalog
    Add {
        /// Ingredient name
        name: String,
        /// Emoji to show next to the ingredient
        #[arg(long)]
        emoji: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search ingredients
    List {
        /// Search query to filter ingredients
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a new recipe
    Create {
        /// Recipe title
        title: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an ingredient line to a recipe (the ingredient is created if new)
    AddIngredient {
        /// Recipe title
        recipe: String,
        /// Ingredient name
        ingredient: String,
        /// Quantity (e.g. "2", "0.5")
        #[arg(short, long)]
        qty: Option<String>,
        /// Unit code: g, kg, oz, lb, ml, l, tsp, tbsp, cup, pc (others kept as written)
        #[arg(short, long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient from a recipe
    RemoveIngredient {
        /// Recipe title
        recipe: String,
        /// Ingredient name to remove
        ingredient: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe (meals planned with it keep their slot)
    Delete {
        /// Recipe title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe's ingredients
    Show {
        /// Recipe title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Path to the .cook file
        file: PathBuf,
        /// Title override (defaults to metadata title or filename)
        #[arg(long)]
        title: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Plan a meal at home (with a recipe) or outside
    Set {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Meal: breakfast, lunch, dinner, snack
        meal: String,
        /// Recipe to cook at home
        #[arg(long, conflicts_with = "outside")]
        recipe: Option<String>,
        /// Where you're eating out
        #[arg(long)]
        outside: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a planned meal
    Clear {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Meal: breakfast, lunch, dinner, snack
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the week's meal plan
    Show {
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Show the week's grocery list
    Show {
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Sort order: aisle, az, recent
        #[arg(short, long, default_value = "aisle")]
        sort: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bring the list in line with the week's meal plan
    Sync {
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item by hand
    Add {
        /// Item text
        text: String,
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Quantity
        #[arg(short, long)]
        qty: Option<String>,
        /// Unit code
        #[arg(short, long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an item as bought
    Check {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an item as not bought
    Uncheck {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove all checked items
    ClearChecked {
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the list as shareable text
    Share {
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the list as CSV
    Export {
        /// Destination file
        #[arg(long, value_name = "PATH")]
        csv: PathBuf,
        /// Any date in the week, or this/last/next (default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = BasketService::new(&config.db_path)?;

    match cli.command {
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add { name, emoji, json } => {
                cmd_ingredient_add(&svc, &name, emoji.as_deref(), json)
            }
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&svc, search.as_deref(), json)
            }
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Create { title, json } => cmd_recipe_create(&svc, &title, json),
            RecipeCommands::AddIngredient {
                recipe,
                ingredient,
                qty,
                unit,
                json,
            } => cmd_recipe_add_ingredient(
                &svc,
                &recipe,
                &ingredient,
                qty.as_deref(),
                unit.as_deref(),
                json,
            ),
            RecipeCommands::RemoveIngredient {
                recipe,
                ingredient,
                json,
            } => cmd_recipe_remove_ingredient(&svc, &recipe, &ingredient, json),
            RecipeCommands::Delete { recipe, json } => cmd_recipe_delete(&svc, &recipe, json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&svc, &recipe, json),
            RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
            RecipeCommands::Import { file, title, json } => {
                cmd_recipe_import(&svc, &file, title, json)
            }
        },
        Commands::Plan { command } => match command {
            PlanCommands::Set {
                date,
                meal,
                recipe,
                outside,
                json,
            } => cmd_plan_set(
                &svc,
                &date,
                &meal,
                recipe.as_deref(),
                outside.as_deref(),
                json,
            ),
            PlanCommands::Clear { date, meal, json } => cmd_plan_clear(&svc, &date, &meal, json),
            PlanCommands::Show { week, json } => cmd_plan_show(&svc, week.as_deref(), json),
        },
        Commands::List { command } => match command {
            ListCommands::Show { week, sort, json } => {
                cmd_list_show(&svc, week.as_deref(), &sort, json)
            }
            ListCommands::Sync {
                week,
                dry_run,
                json,
            } => cmd_list_sync(&svc, week.as_deref(), dry_run, json),
            ListCommands::Add {
                text,
                week,
                qty,
                unit,
                json,
            } => cmd_list_add(
                &svc,
                week.as_deref(),
                &text,
                qty.as_deref(),
                unit.as_deref(),
                json,
            ),
            ListCommands::Check { id, json } => cmd_list_check(&svc, id, true, json),
            ListCommands::Uncheck { id, json } => cmd_list_check(&svc, id, false, json),
            ListCommands::Remove { id, json } => cmd_list_remove(&svc, id, json),
            ListCommands::ClearChecked { week, json } => {
                cmd_list_clear_checked(&svc, week.as_deref(), json)
            }
            ListCommands::Share { week, json } => cmd_list_share(&svc, week.as_deref(), json),
            ListCommands::Export { csv, week, json } => {
                cmd_list_export(&svc, week.as_deref(), &csv, json)
            }
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(svc, port, &bind, api_key).await
        }
    }
}
