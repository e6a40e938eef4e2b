use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutritrack_core::models::validate_servings;

use super::helpers::{
    Service, format_quantity, not_found, print_json, resolve_id, resolve_meal, short_id,
};

pub(crate) fn cmd_plan_add(svc: &mut Service, meal: &str, servings: f64, json: bool) -> Result<()> {
    validate_servings(servings)?;
    let Some(target) = resolve_meal(svc, meal)? else {
        not_found(&format!("Meal '{meal}' not found"), json);
    };
    let total = svc.add_meal_to_plan(&target.id, servings)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "mealId": target.id, "servings": total })
        );
    } else {
        let name = &target.name;
        let total = format_quantity(total);
        println!("Planned {name}: {total} serving(s) this week");
    }
    Ok(())
}

/// Accepts a meal name or id. Plan entries for deleted meals can still be
/// removed by id.
pub(crate) fn cmd_plan_remove(svc: &mut Service, meal: &str, json: bool) -> Result<()> {
    let meal_id = match resolve_meal(svc, meal)? {
        Some(m) => Some(m.id),
        None => {
            let plan = svc.weekly_plan()?;
            resolve_id(plan.iter().map(|(id, _)| id), meal)?
        }
    };
    let Some(meal_id) = meal_id else {
        not_found(&format!("Meal '{meal}' is not in the plan"), json);
    };
    if !svc.remove_meal_from_plan(&meal_id)? {
        not_found(&format!("Meal '{meal}' is not in the plan"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "removed": meal_id }));
    } else {
        println!("Removed {meal} from the plan");
    }
    Ok(())
}

pub(crate) fn cmd_plan_show(svc: &Service, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Meal")]
        name: String,
        #[tabled(rename = "Servings")]
        servings: String,
    }

    let planned = svc.planned_meals()?;
    if json {
        return print_json(&planned);
    }
    if planned.is_empty() {
        println!("The weekly plan is empty");
        return Ok(());
    }

    let rows: Vec<PlanRow> = planned
        .iter()
        .map(|p| PlanRow {
            id: short_id(&p.meal_id),
            name: p
                .meal_name
                .clone()
                .unwrap_or_else(|| "(deleted meal)".to_string()),
            servings: format_quantity(p.servings),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_plan_clear(svc: &mut Service, json: bool) -> Result<()> {
    let cleared = svc.clear_plan()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Cleared the weekly plan");
    } else {
        println!("The weekly plan is already empty");
    }
    Ok(())
}
