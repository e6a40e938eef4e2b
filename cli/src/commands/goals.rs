use anyhow::{Result, bail};

use nutritrack_core::models::{Goals, validate_goals};

use super::helpers::{Service, print_json};

pub(crate) fn cmd_goals_show(svc: &Service, json: bool) -> Result<()> {
    let goals = svc.goals()?;
    if json {
        return print_json(&goals);
    }
    print_goals(&goals);
    Ok(())
}

/// Update the given fields, keeping the rest.
pub(crate) fn cmd_goals_set(
    svc: &mut Service,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    json: bool,
) -> Result<()> {
    if calories.is_none() && protein.is_none() && carbs.is_none() && fat.is_none() {
        bail!("Nothing to update. Provide at least one of --calories, --protein, --carbs, or --fat");
    }
    let current = svc.goals()?;
    let goals = Goals {
        calories: calories.unwrap_or(current.calories),
        protein: protein.unwrap_or(current.protein),
        carbs: carbs.unwrap_or(current.carbs),
        fat: fat.unwrap_or(current.fat),
    };
    validate_goals(&goals)?;
    let goals = svc.set_goals(goals)?;

    if json {
        return print_json(&goals);
    }
    println!("Goals updated");
    print_goals(&goals);
    Ok(())
}

fn print_goals(goals: &Goals) {
    println!("  Calories: {:.0} kcal", goals.calories);
    println!("  Protein:  {:.0}g", goals.protein);
    println!("  Carbs:    {:.0}g", goals.carbs);
    println!("  Fat:      {:.0}g", goals.fat);
}
