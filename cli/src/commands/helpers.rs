use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;

use nutritrack_core::db::Database;
use nutritrack_core::models::{Meal, NewIngredient};
use nutritrack_core::service::NutritionService;

pub(crate) type Service = NutritionService<Database>;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `--ingredient` values written as `name:quantity[:unit]`,
/// e.g. `rice:1:cup` or `eggs:3`.
pub(crate) fn parse_ingredient_arg(s: &str) -> Result<NewIngredient> {
    let mut parts = s.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let Some(quantity) = parts.next() else {
        bail!("Invalid ingredient '{s}'. Use 'name:quantity[:unit]' (e.g. 'rice:1:cup')");
    };
    if name.is_empty() {
        bail!("Invalid ingredient '{s}': name must not be empty");
    }
    let quantity: f64 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in ingredient '{s}'"))?;
    let unit = parts.next().unwrap_or_default().trim().to_string();
    Ok(NewIngredient {
        name: name.to_string(),
        quantity,
        unit,
    })
}

/// Resolve a full id or a unique id prefix (at least 4 characters) as shown
/// in tables.
pub(crate) fn resolve_id<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    query: &str,
) -> Result<Option<String>> {
    let query = query.trim();
    let mut prefixed = Vec::new();
    for id in ids {
        if id == query {
            return Ok(Some(id.to_string()));
        }
        if query.len() >= 4 && id.starts_with(query) {
            prefixed.push(id);
        }
    }
    match prefixed.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).to_string())),
        _ => bail!("Id prefix '{query}' is ambiguous"),
    }
}

/// Shortened id for table display.
pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Find a meal by id (or id prefix), then by case-insensitive name.
pub(crate) fn resolve_meal(svc: &Service, query: &str) -> Result<Option<Meal>> {
    let meals = svc.meals()?;
    if let Some(id) = resolve_id(meals.iter().map(|m| m.id.as_str()), query)? {
        return Ok(meals.into_iter().find(|m| m.id == id));
    }
    let wanted = query.trim().to_lowercase();
    let mut matches = meals
        .into_iter()
        .filter(|m| m.name.trim().to_lowercase() == wanted);
    let first = matches.next();
    if first.is_some() && matches.next().is_some() {
        bail!("Several meals are named '{query}'. Use the meal id instead");
    }
    Ok(first)
}

/// Print a not-found message and exit 2.
pub(crate) fn not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

/// Whole numbers without decimals, everything else with up to two.
pub(crate) fn format_quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{:.0}", no_neg_zero(q))
    } else {
        let s = format!("{q:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
