//! Grocery list aggregation across the weekly plan.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use tracing::warn;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::models::{GroceryItem, Meal, WeeklyPlan};

/// Identity under which ingredient quantities are merged.
///
/// Name and unit stay separate fields so no pair of inputs can collide by
/// concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey {
    pub name: String,
    pub unit: String,
}

/// Trim and lowercase both parts. Units are opaque; `g` and `kg` stay apart.
#[must_use]
pub fn aggregation_key(name: &str, unit: &str) -> AggregationKey {
    AggregationKey {
        name: name.trim().to_lowercase(),
        unit: unit.trim().to_lowercase(),
    }
}

/// Merge `quantity × planned servings` for every ingredient of every planned
/// meal. Plan entries whose meal no longer exists are skipped. The first
/// contributor to a key decides the displayed name and unit.
#[must_use]
pub fn aggregate(plan: &WeeklyPlan, meals: &[Meal]) -> Vec<GroceryItem> {
    let mut by_id: HashMap<&str, &Meal> = HashMap::with_capacity(meals.len());
    for meal in meals {
        by_id.entry(meal.id.as_str()).or_insert(meal);
    }

    let mut buckets: HashMap<AggregationKey, GroceryItem> = HashMap::new();
    for (meal_id, servings) in plan.iter() {
        let Some(meal) = by_id.get(meal_id) else {
            warn!(meal_id, "planned meal no longer exists, skipping");
            continue;
        };
        for ingredient in &meal.ingredients {
            let amount = ingredient.quantity * servings;
            buckets
                .entry(aggregation_key(&ingredient.name, &ingredient.unit))
                .and_modify(|item| item.quantity += amount)
                .or_insert_with(|| GroceryItem {
                    name: ingredient.name.clone(),
                    quantity: amount,
                    unit: ingredient.unit.clone(),
                });
        }
    }

    let mut items: Vec<GroceryItem> = buckets.into_values().collect();
    items.sort_by(compare_items);
    items
}

/// Primary collation weight: canonical decomposition with combining marks
/// dropped, then lowercased, so `Édamame` files under `e`.
fn collation_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Letters first, then accents, then case, then unit.
fn compare_items(a: &GroceryItem, b: &GroceryItem) -> Ordering {
    collation_key(&a.name)
        .cmp(&collation_key(&b.name))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.unit.cmp(&b.unit))
}

/// Write the list as `name,quantity,unit` CSV with a header row.
pub fn write_csv<W: Write>(items: &[GroceryItem], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for item in items {
        csv.serialize(item)
            .with_context(|| format!("Failed to write grocery item '{}'", item.name))?;
    }
    csv.flush().context("Failed to flush grocery CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;

    fn ingredient(name: &str, quantity: f64, unit: &str) -> Ingredient {
        Ingredient {
            id: format!("i-{name}-{unit}"),
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        }
    }

    fn meal(id: &str, ingredients: Vec<Ingredient>) -> Meal {
        Meal {
            id: id.to_string(),
            name: format!("Meal {id}"),
            servings: 1,
            ingredients,
            calories_per_serving: 400.0,
            protein_per_serving: 30.0,
            carbs_per_serving: 40.0,
            fat_per_serving: 10.0,
        }
    }

    fn plan(entries: &[(&str, f64)]) -> WeeklyPlan {
        entries.iter().map(|(id, s)| ((*id).to_string(), *s)).collect()
    }

    fn find<'a>(items: &'a [GroceryItem], name: &str, unit: &str) -> Option<&'a GroceryItem> {
        let key = aggregation_key(name, unit);
        items
            .iter()
            .find(|item| aggregation_key(&item.name, &item.unit) == key)
    }

    #[test]
    fn test_aggregation_key_normalizes() {
        assert_eq!(aggregation_key("Tomato", "G"), aggregation_key(" tomato ", "g"));
        assert_ne!(aggregation_key("Tomato", "g"), aggregation_key("Tomato", "kg"));
    }

    #[test]
    fn test_aggregation_key_fields_do_not_collide() {
        assert_ne!(aggregation_key("a b", "c"), aggregation_key("a", "b c"));
    }

    #[test]
    fn test_single_meal_scaled_by_servings() {
        let meals = vec![meal("X", vec![ingredient("Rice", 1.0, "cup")])];
        let items = aggregate(&plan(&[("X", 2.0)]), &meals);
        assert_eq!(
            items,
            vec![GroceryItem {
                name: "Rice".to_string(),
                quantity: 2.0,
                unit: "cup".to_string(),
            }]
        );
    }

    #[test]
    fn test_merges_by_normalized_name_and_unit() {
        let meals = vec![
            meal("a", vec![ingredient("Tomato", 100.0, "G")]),
            meal("b", vec![ingredient(" tomato ", 50.0, "g")]),
        ];
        let items = aggregate(&plan(&[("a", 1.0), ("b", 2.0)]), &meals);
        assert_eq!(items.len(), 1);
        assert!((items[0].quantity - 200.0).abs() < 0.001);
        // "a" sorts first in the plan, so its casing wins
        assert_eq!(items[0].name, "Tomato");
        assert_eq!(items[0].unit, "G");
    }

    #[test]
    fn test_different_units_stay_separate() {
        let meals = vec![meal(
            "a",
            vec![ingredient("Tomato", 100.0, "g"), ingredient("Tomato", 1.0, "kg")],
        )];
        let items = aggregate(&plan(&[("a", 1.0)]), &meals);
        assert_eq!(items.len(), 2);
        assert!(find(&items, "tomato", "g").is_some());
        assert!(find(&items, "tomato", "kg").is_some());
    }

    #[test]
    fn test_sorted_case_insensitively() {
        let meals = vec![meal(
            "a",
            vec![
                ingredient("banana", 1.0, ""),
                ingredient("Apple", 2.0, ""),
                ingredient("carrot", 3.0, ""),
            ],
        )];
        let items = aggregate(&plan(&[("a", 1.0)]), &meals);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "banana", "carrot"]);
    }

    #[test]
    fn test_sorted_ignoring_accents() {
        let meals = vec![meal(
            "a",
            vec![
                ingredient("Zucchini", 1.0, ""),
                ingredient("Édamame", 200.0, "g"),
                ingredient("eggs", 6.0, ""),
            ],
        )];
        let items = aggregate(&plan(&[("a", 1.0)]), &meals);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Édamame", "eggs", "Zucchini"]);
    }

    #[test]
    fn test_accent_breaks_ties_after_letters() {
        let meals = vec![meal(
            "a",
            vec![ingredient("Pâté", 1.0, ""), ingredient("pate", 1.0, "")],
        )];
        let items = aggregate(&plan(&[("a", 1.0)]), &meals);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["pate", "Pâté"]);
    }

    #[test]
    fn test_skips_missing_meals() {
        let meals = vec![meal("a", vec![ingredient("Oats", 50.0, "g")])];
        let items = aggregate(&plan(&[("a", 1.0), ("gone", 4.0)]), &meals);
        assert_eq!(items.len(), 1);
        assert!((items[0].quantity - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_plan() {
        let meals = vec![meal("a", vec![ingredient("Oats", 50.0, "g")])];
        assert!(aggregate(&WeeklyPlan::new(), &meals).is_empty());
    }

    #[test]
    fn test_zero_servings_keeps_zero_line() {
        let meals = vec![meal("a", vec![ingredient("Oats", 50.0, "g")])];
        let items = aggregate(&plan(&[("a", 0.0)]), &meals);
        assert_eq!(items.len(), 1);
        assert!(items[0].quantity.abs() < f64::EPSILON);
    }

    #[test]
    fn test_quantities_ignore_ingredient_order() {
        let forward = vec![meal(
            "a",
            vec![ingredient("Rice", 1.0, "cup"), ingredient("Beans", 2.0, "can")],
        )];
        let backward = vec![meal(
            "a",
            vec![ingredient("Beans", 2.0, "can"), ingredient("Rice", 1.0, "cup")],
        )];
        let p = plan(&[("a", 3.0)]);
        assert_eq!(aggregate(&p, &forward), aggregate(&p, &backward));
    }

    #[test]
    fn test_idempotent_and_inputs_untouched() {
        let meals = vec![meal("a", vec![ingredient("Rice", 1.0, "cup")])];
        let p = plan(&[("a", 2.0)]);
        let before = (p.clone(), meals.clone());
        let first = aggregate(&p, &meals);
        let second = aggregate(&p, &meals);
        assert_eq!(first, second);
        assert_eq!((p, meals), before);
    }

    #[test]
    fn test_disjoint_plans_combine_by_key() {
        let meals = vec![
            meal("a", vec![ingredient("Rice", 1.0, "cup"), ingredient("Egg", 2.0, "")]),
            meal("b", vec![ingredient("rice", 0.5, "Cup"), ingredient("Milk", 200.0, "ml")]),
        ];
        let left = aggregate(&plan(&[("a", 2.0)]), &meals);
        let right = aggregate(&plan(&[("b", 4.0)]), &meals);
        let merged = aggregate(&plan(&[("a", 2.0), ("b", 4.0)]), &meals);

        let mut combined: HashMap<AggregationKey, f64> = HashMap::new();
        for item in left.iter().chain(right.iter()) {
            *combined
                .entry(aggregation_key(&item.name, &item.unit))
                .or_insert(0.0) += item.quantity;
        }
        assert_eq!(combined.len(), merged.len());
        for item in &merged {
            let expected = combined[&aggregation_key(&item.name, &item.unit)];
            assert!((item.quantity - expected).abs() < 0.001);
        }
        assert!((find(&merged, "rice", "cup").unwrap().quantity - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_write_csv() {
        let items = vec![
            GroceryItem {
                name: "Rice".to_string(),
                quantity: 2.0,
                unit: "cup".to_string(),
            },
            GroceryItem {
                name: "Salt, sea".to_string(),
                quantity: 1.0,
                unit: String::new(),
            },
        ];
        let mut out = Vec::new();
        write_csv(&items, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "name,quantity,unit\nRice,2.0,cup\n\"Salt, sea\",1.0,\n");
    }
}
