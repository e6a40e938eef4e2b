use anyhow::{Context, Result, bail};

use nutritrack_core::ai::{Generated, GeneratedRecipe, GenerationRequest, GoalTag, MealSuggestion};

use crate::config::Config;
use crate::gemini::GeminiClient;

use super::helpers::{Service, print_json};

fn gemini_client(config: &Config) -> Result<GeminiClient> {
    let Some(key) = config.gemini_api_key.clone() else {
        bail!("GEMINI_API_KEY is not set. Export it to use AI features");
    };
    GeminiClient::new(key, config.model.clone())
}

pub(crate) async fn cmd_ai_suggest(config: &Config, goal: &str, json: bool) -> Result<()> {
    let goal: GoalTag = goal.parse()?;
    let client = gemini_client(config)?;
    let request = GenerationRequest::suggestions(goal);
    let Generated::Suggestions(suggestions) = client.generate(&request).await? else {
        bail!("Unexpected response kind for suggestions");
    };

    if json {
        return print_json(&suggestions);
    }
    print_suggestions(goal, &suggestions);
    Ok(())
}

fn print_suggestions(goal: GoalTag, suggestions: &[MealSuggestion]) {
    println!("=== Meal ideas for {goal} ===\n");
    for (i, s) in suggestions.iter().enumerate() {
        let n = i + 1;
        let name = &s.meal_name;
        println!("  {n}. {name} ({:.0} kcal, {:.0}g protein)", s.calories, s.protein);
        let desc = &s.description;
        println!("     {desc}");
    }
}

pub(crate) async fn cmd_ai_recipe(
    svc: &mut Service,
    config: &Config,
    ingredients: &str,
    save: bool,
    json: bool,
) -> Result<()> {
    let request = GenerationRequest::recipe(ingredients)?;
    let client = gemini_client(config)?;
    let Generated::Recipe(recipe) = client.generate(&request).await? else {
        bail!("Unexpected response kind for recipe");
    };

    let saved = if save {
        Some(
            svc.save_generated_recipe(&recipe)
                .context("Failed to save recipe as a meal")?,
        )
    } else {
        None
    };

    if json {
        return print_json(&serde_json::json!({ "recipe": recipe, "savedMeal": saved }));
    }
    print_recipe(&recipe);
    if let Some(meal) = saved {
        let id = &meal.id;
        println!("\nSaved as meal [{id}]. Set its macros with `nutritrack meal edit {id}`.");
    }
    Ok(())
}

fn print_recipe(recipe: &GeneratedRecipe) {
    let name = &recipe.meal_name;
    println!("=== {name} ===");
    let desc = &recipe.description;
    println!("{desc}\n");
    println!("  Ingredients:");
    for line in &recipe.ingredients {
        println!("    - {line}");
    }
    println!("\n  Instructions:");
    for (i, step) in recipe.instructions.iter().enumerate() {
        let n = i + 1;
        println!("    {n}. {step}");
    }
}
