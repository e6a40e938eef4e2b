mod commands;
mod config;
mod gemini;
mod server;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    MacroInput, cmd_ai_recipe, cmd_ai_suggest, cmd_check, cmd_goals_set, cmd_goals_show,
    cmd_grocery_add, cmd_grocery_delete, cmd_grocery_export, cmd_grocery_list, cmd_grocery_toggle,
    cmd_history, cmd_log, cmd_meal_add, cmd_meal_delete, cmd_meal_edit, cmd_meal_list,
    cmd_meal_show, cmd_plan_add, cmd_plan_clear, cmd_plan_remove, cmd_plan_show, cmd_summary,
    cmd_unlog,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use nutritrack_core::service::NutritionService;

#[derive(Parser)]
#[command(
    name = "nutritrack",
    version,
    about = "Meals, daily macros, weekly plans and grocery lists"
)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn setup_logging(&self) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the meal library
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Log servings of a meal for today
    Log {
        /// Meal ID, ID prefix, or exact name
        meal: String,
        /// Number of servings eaten
        #[arg(short, long, default_value = "1")]
        servings: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a log entry by ID
    Unlog {
        /// Entry ID or ID prefix
        entry: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals against goals for a day (defaults to today)
    #[command(alias = "today")]
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily totals for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or set daily macro goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommands,
    },
    /// Manage the weekly meal plan
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Show and manage the grocery list
    Grocery {
        #[command(subcommand)]
        command: GroceryCommands,
    },
    /// AI meal suggestions and recipes (requires GEMINI_API_KEY)
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
    /// Report plan and log entries that point at deleted meals
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
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
enum MealCommands {
    /// Add a meal to the library
    Add {
        /// Meal name
        name: String,
        /// Servings the recipe makes
        #[arg(short, long, default_value = "1")]
        servings: u32,
        #[command(flatten)]
        macros: MacroInput,
        /// Ingredient as "name:quantity[:unit]" (repeatable)
        #[arg(short, long = "ingredient", value_name = "INGREDIENT")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a meal, replacing only the given fields
    Edit {
        /// Meal ID, ID prefix, or exact name
        meal: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New servings count
        #[arg(short, long)]
        servings: Option<u32>,
        #[command(flatten)]
        macros: MacroInput,
        /// Ingredient to append as "name:quantity[:unit]" (repeatable)
        #[arg(short, long = "ingredient", value_name = "INGREDIENT")]
        ingredients: Vec<String>,
        /// Drop existing ingredients before appending
        #[arg(long)]
        clear_ingredients: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal (plan and log entries are kept)
    Delete {
        /// Meal ID, ID prefix, or exact name
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all meals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a meal with its ingredients
    Show {
        /// Meal ID, ID prefix, or exact name
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalsCommands {
    /// Show current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set goals (unspecified values are kept)
    Set {
        /// Daily calories (kcal)
        #[arg(long)]
        calories: Option<f64>,
        /// Daily protein (g)
        #[arg(long)]
        protein: Option<f64>,
        /// Daily carbs (g)
        #[arg(long)]
        carbs: Option<f64>,
        /// Daily fat (g)
        #[arg(long)]
        fat: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Add servings of a meal to the plan (accumulates)
    Add {
        /// Meal ID, ID prefix, or exact name
        meal: String,
        /// Servings to add
        #[arg(short, long, default_value = "1")]
        servings: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a meal from the plan
    Remove {
        /// Meal ID, ID prefix, or exact name
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the plan
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every meal from the plan
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GroceryCommands {
    /// Show the aggregated list plus manual items
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a manual item
    Add {
        /// Item text
        text: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a manual item's completed flag
    Toggle {
        /// Item ID or ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a manual item
    Delete {
        /// Item ID or ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the aggregated list as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output as JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Suggest high-protein meals for a goal (bulking or cutting)
    Suggest {
        /// Goal tag
        goal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a recipe from the ingredients on hand
    Recipe {
        /// Free-text ingredient list
        ingredients: String,
        /// Save the recipe as a new meal
        #[arg(long)]
        save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.setup_logging();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = NutritionService::open(&config.db_path)?;

    match cli.command {
        Commands::Meal { command } => match command {
            MealCommands::Add {
                name,
                servings,
                macros,
                ingredients,
                json,
            } => cmd_meal_add(&mut svc, &name, servings, &macros, &ingredients, json),
            MealCommands::Edit {
                meal,
                name,
                servings,
                macros,
                ingredients,
                clear_ingredients,
                json,
            } => cmd_meal_edit(
                &mut svc,
                &meal,
                name,
                servings,
                &macros,
                &ingredients,
                clear_ingredients,
                json,
            ),
            MealCommands::Delete { meal, json } => cmd_meal_delete(&mut svc, &meal, json),
            MealCommands::List { json } => cmd_meal_list(&svc, json),
            MealCommands::Show { meal, json } => cmd_meal_show(&svc, &meal, json),
        },
        Commands::Log {
            meal,
            servings,
            json,
        } => cmd_log(&mut svc, &meal, servings, json),
        Commands::Unlog { entry, json } => cmd_unlog(&mut svc, &entry, json),
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Goals { command } => match command {
            GoalsCommands::Show { json } => cmd_goals_show(&svc, json),
            GoalsCommands::Set {
                calories,
                protein,
                carbs,
                fat,
                json,
            } => cmd_goals_set(&mut svc, calories, protein, carbs, fat, json),
        },
        Commands::Plan { command } => match command {
            PlanCommands::Add {
                meal,
                servings,
                json,
            } => cmd_plan_add(&mut svc, &meal, servings, json),
            PlanCommands::Remove { meal, json } => cmd_plan_remove(&mut svc, &meal, json),
            PlanCommands::Show { json } => cmd_plan_show(&svc, json),
            PlanCommands::Clear { json } => cmd_plan_clear(&mut svc, json),
        },
        Commands::Grocery { command } => match command {
            GroceryCommands::List { json } => cmd_grocery_list(&svc, json),
            GroceryCommands::Add { text, json } => cmd_grocery_add(&mut svc, &text, json),
            GroceryCommands::Toggle { id, json } => cmd_grocery_toggle(&mut svc, &id, json),
            GroceryCommands::Delete { id, json } => cmd_grocery_delete(&mut svc, &id, json),
            GroceryCommands::Export { output, json } => {
                cmd_grocery_export(&svc, output.as_deref(), json)
            }
        },
        Commands::Ai { command } => match command {
            AiCommands::Suggest { goal, json } => cmd_ai_suggest(&config, &goal, json).await,
            AiCommands::Recipe {
                ingredients,
                save,
                json,
            } => cmd_ai_recipe(&mut svc, &config, &ingredients, save, json).await,
        },
        Commands::Check { json } => cmd_check(&svc, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _) = config.load_or_create_api_key()?;
                Some(key)
            };
            let gemini = config
                .gemini_api_key
                .clone()
                .map(|key| GeminiClient::new(key, config.model.clone()))
                .transpose()?;
            server::start_server(svc, gemini, port, &bind, api_key).await
        }
    }
}
