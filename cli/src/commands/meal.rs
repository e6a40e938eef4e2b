use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutritrack_core::models::{Meal, NewIngredient, NewMeal, validate_new_meal};

use super::helpers::{
    Service, format_quantity, not_found, parse_ingredient_arg, print_json, resolve_meal, short_id,
    truncate,
};

/// Per-serving macro flags shared by `meal add` and `meal edit`.
#[derive(clap::Args)]
pub(crate) struct MacroInput {
    /// Calories per serving (kcal)
    #[arg(long)]
    pub calories: Option<f64>,
    /// Protein per serving (g)
    #[arg(long)]
    pub protein: Option<f64>,
    /// Carbs per serving (g)
    #[arg(long)]
    pub carbs: Option<f64>,
    /// Fat per serving (g)
    #[arg(long)]
    pub fat: Option<f64>,
}

pub(crate) fn cmd_meal_add(
    svc: &mut Service,
    name: &str,
    servings: u32,
    macros: &MacroInput,
    ingredients: &[String],
    json: bool,
) -> Result<()> {
    let data = NewMeal {
        name: name.trim().to_string(),
        servings,
        ingredients: ingredients
            .iter()
            .map(|s| parse_ingredient_arg(s))
            .collect::<Result<_>>()?,
        calories_per_serving: macros.calories.unwrap_or(0.0),
        protein_per_serving: macros.protein.unwrap_or(0.0),
        carbs_per_serving: macros.carbs.unwrap_or(0.0),
        fat_per_serving: macros.fat.unwrap_or(0.0),
    };
    validate_new_meal(&data)?;
    let meal = svc.add_meal(data)?;

    if json {
        return print_json(&meal);
    }
    let id = &meal.id;
    let name = &meal.name;
    let cal = meal.calories_per_serving;
    println!("Added meal '{name}' ({cal:.0} kcal/serving) [{id}]");
    Ok(())
}

/// Replace only the fields that were given. `--ingredient` values are appended
/// to the existing list, or to an empty one with `--clear-ingredients`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_meal_edit(
    svc: &mut Service,
    query: &str,
    name: Option<String>,
    servings: Option<u32>,
    macros: &MacroInput,
    ingredients: &[String],
    clear_ingredients: bool,
    json: bool,
) -> Result<()> {
    let Some(meal) = resolve_meal(svc, query)? else {
        not_found(&format!("Meal '{query}' not found"), json);
    };

    let added = ingredients
        .iter()
        .map(|s| parse_ingredient_arg(s))
        .collect::<Result<Vec<_>>>()?;

    // Validate the edited fields before touching the store
    let draft = NewMeal {
        name: name.unwrap_or_else(|| meal.name.clone()).trim().to_string(),
        servings: servings.unwrap_or(meal.servings),
        ingredients: added.clone(),
        calories_per_serving: macros.calories.unwrap_or(meal.calories_per_serving),
        protein_per_serving: macros.protein.unwrap_or(meal.protein_per_serving),
        carbs_per_serving: macros.carbs.unwrap_or(meal.carbs_per_serving),
        fat_per_serving: macros.fat.unwrap_or(meal.fat_per_serving),
    };
    validate_new_meal(&draft)?;

    let mut ingredients = if clear_ingredients {
        Vec::new()
    } else {
        meal.ingredients
    };
    ingredients.extend(added.into_iter().map(NewIngredient::into_ingredient));
    let updated = Meal {
        id: meal.id,
        name: draft.name,
        servings: draft.servings,
        ingredients,
        calories_per_serving: draft.calories_per_serving,
        protein_per_serving: draft.protein_per_serving,
        carbs_per_serving: draft.carbs_per_serving,
        fat_per_serving: draft.fat_per_serving,
    };

    if !svc.update_meal(updated.clone())? {
        not_found(&format!("Meal '{query}' not found"), json);
    }
    if json {
        return print_json(&updated);
    }
    let name = &updated.name;
    println!("Updated meal '{name}'");
    Ok(())
}

pub(crate) fn cmd_meal_delete(svc: &mut Service, query: &str, json: bool) -> Result<()> {
    let Some(meal) = resolve_meal(svc, query)? else {
        not_found(&format!("Meal '{query}' not found"), json);
    };
    if !svc.delete_meal(&meal.id)? {
        not_found(&format!("Meal '{query}' not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": meal.id }));
    } else {
        let name = &meal.name;
        println!("Deleted meal '{name}'");
    }
    Ok(())
}

pub(crate) fn cmd_meal_list(svc: &Service, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    let meals = svc.meals()?;
    if json {
        return print_json(&meals);
    }
    if meals.is_empty() {
        println!("No meals yet. Add one with `nutritrack meal add`.");
        return Ok(());
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: short_id(&m.id),
            name: truncate(&m.name, 35),
            calories: format!("{:.0}", m.calories_per_serving),
            protein: format!("{:.0}g", m.protein_per_serving),
            carbs: format!("{:.0}g", m.carbs_per_serving),
            fat: format!("{:.0}g", m.fat_per_serving),
            ingredients: m.ingredients.len(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_meal_show(svc: &Service, query: &str, json: bool) -> Result<()> {
    let Some(meal) = resolve_meal(svc, query)? else {
        not_found(&format!("Meal '{query}' not found"), json);
    };
    if json {
        return print_json(&meal);
    }

    let name = &meal.name;
    let id = &meal.id;
    println!("=== {name} ===");
    println!("  id: {id}");
    println!("  makes {} serving(s)", meal.servings);
    println!(
        "  per serving: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        meal.calories_per_serving,
        meal.protein_per_serving,
        meal.carbs_per_serving,
        meal.fat_per_serving
    );
    if meal.ingredients.is_empty() {
        println!("  (no ingredients)");
    } else {
        println!("\n  Ingredients:");
        for i in &meal.ingredients {
            let qty = format_quantity(i.quantity);
            let unit = if i.unit.is_empty() {
                String::new()
            } else {
                format!(" {}", i.unit)
            };
            println!("    - {qty}{unit} {}", i.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_macros() -> MacroInput {
        MacroInput {
            calories: None,
            protein: None,
            carbs: None,
            fat: None,
        }
    }

    fn ingredient_names(svc: &Service, id: &str) -> Vec<String> {
        svc.get_meal(id)
            .unwrap()
            .unwrap()
            .ingredients
            .into_iter()
            .map(|i| i.name)
            .collect()
    }

    fn add_oats(svc: &mut Service) -> String {
        let macros = MacroInput {
            calories: Some(350.0),
            ..no_macros()
        };
        cmd_meal_add(svc, "Oats", 1, &macros, &["oats:50:g".to_string()], true).unwrap();
        svc.meals().unwrap()[0].id.clone()
    }

    #[test]
    fn test_edit_appends_ingredients() {
        let mut svc = Service::new_in_memory().unwrap();
        let id = add_oats(&mut svc);

        let added = ["milk:200:ml".to_string(), "honey:1:tbsp".to_string()];
        cmd_meal_edit(&mut svc, &id, None, None, &no_macros(), &added, false, true).unwrap();
        assert_eq!(ingredient_names(&svc, &id), vec!["oats", "milk", "honey"]);
    }

    #[test]
    fn test_edit_clear_then_append() {
        let mut svc = Service::new_in_memory().unwrap();
        let id = add_oats(&mut svc);

        let rice = ["rice:1:cup".to_string()];
        cmd_meal_edit(&mut svc, &id, None, None, &no_macros(), &rice, true, true).unwrap();
        assert_eq!(ingredient_names(&svc, &id), vec!["rice"]);

        let egg = ["egg:2".to_string()];
        cmd_meal_edit(&mut svc, &id, None, None, &no_macros(), &egg, false, true).unwrap();
        assert_eq!(ingredient_names(&svc, &id), vec!["rice", "egg"]);
    }

    #[test]
    fn test_edit_clear_alone_empties_list() {
        let mut svc = Service::new_in_memory().unwrap();
        let id = add_oats(&mut svc);

        cmd_meal_edit(&mut svc, &id, None, None, &no_macros(), &[], true, true).unwrap();
        assert!(ingredient_names(&svc, &id).is_empty());
    }

    #[test]
    fn test_edit_keeps_unspecified_fields() {
        let mut svc = Service::new_in_memory().unwrap();
        let id = add_oats(&mut svc);
        let before = svc.get_meal(&id).unwrap().unwrap();

        let macros = MacroInput {
            protein: Some(12.0),
            ..no_macros()
        };
        let name = Some("Porridge".to_string());
        cmd_meal_edit(&mut svc, "oats", name, None, &macros, &[], false, true).unwrap();

        let after = svc.get_meal(&id).unwrap().unwrap();
        assert_eq!(after.name, "Porridge");
        assert!((after.calories_per_serving - 350.0).abs() < f64::EPSILON);
        assert!((after.protein_per_serving - 12.0).abs() < f64::EPSILON);
        assert_eq!(after.ingredients, before.ingredients);
    }

    #[test]
    fn test_edit_rejects_bad_ingredient_without_saving() {
        let mut svc = Service::new_in_memory().unwrap();
        let id = add_oats(&mut svc);

        let bad = ["milk:lots".to_string()];
        assert!(cmd_meal_edit(&mut svc, &id, None, None, &no_macros(), &bad, true, true).is_err());
        assert_eq!(ingredient_names(&svc, &id), vec!["oats"]);
    }
}
