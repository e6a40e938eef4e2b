use anyhow::Result;

use nutritrack_core::models::validate_servings;

use super::helpers::{Service, not_found, print_json, resolve_id, resolve_meal};

pub(crate) fn cmd_log(svc: &mut Service, meal: &str, servings: f64, json: bool) -> Result<()> {
    validate_servings(servings)?;
    let Some(target) = resolve_meal(svc, meal)? else {
        not_found(&format!("Meal '{meal}' not found"), json);
    };
    let Some(entry) = svc.add_entry_to_log(&target.id, servings)? else {
        not_found(&format!("Meal '{meal}' not found"), json);
    };

    if json {
        return print_json(&entry);
    }
    let name = &entry.meal_name;
    let cal = entry.calories;
    let p = entry.protein;
    let c = entry.carbs;
    let f = entry.fat;
    println!("Logged {servings} x {name}: {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g");
    Ok(())
}

pub(crate) fn cmd_unlog(svc: &mut Service, entry: &str, json: bool) -> Result<()> {
    let log = svc.daily_log()?;
    let Some(entry_id) = resolve_id(log.iter().map(|e| e.id.as_str()), entry)? else {
        not_found(&format!("Entry {entry} not found"), json);
    };
    if !svc.remove_entry_from_log(&entry_id)? {
        not_found(&format!("Entry {entry} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": entry_id }));
    } else {
        println!("Deleted entry {entry_id}");
    }
    Ok(())
}
