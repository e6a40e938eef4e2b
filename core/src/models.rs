use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh opaque identity for a stored record.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    // Schema fields only; nothing populates them yet.
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
}

impl NewIngredient {
    /// Assign an identity and zeroed macro fields.
    #[must_use]
    pub fn into_ingredient(self) -> Ingredient {
        Ingredient {
            id: new_id(),
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub name: String,
    /// Batch size the ingredient list was written for. Informational only.
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    pub calories_per_serving: f64,
    pub protein_per_serving: f64,
    pub carbs_per_serving: f64,
    pub fat_per_serving: f64,
}

/// Everything a meal carries except its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeal {
    pub name: String,
    #[serde(default = "default_meal_servings")]
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<NewIngredient>,
    #[serde(default)]
    pub calories_per_serving: f64,
    #[serde(default)]
    pub protein_per_serving: f64,
    #[serde(default)]
    pub carbs_per_serving: f64,
    #[serde(default)]
    pub fat_per_serving: f64,
}

fn default_meal_servings() -> u32 {
    1
}

impl NewMeal {
    #[must_use]
    pub fn into_meal(self, id: String) -> Meal {
        Meal {
            id,
            name: self.name,
            servings: self.servings,
            ingredients: self
                .ingredients
                .into_iter()
                .map(NewIngredient::into_ingredient)
                .collect(),
            calories_per_serving: self.calories_per_serving,
            protein_per_serving: self.protein_per_serving,
            carbs_per_serving: self.carbs_per_serving,
            fat_per_serving: self.fat_per_serving,
        }
    }

    /// Replace every field of `existing` except its id. Incoming ingredients
    /// take over the ids of existing ingredients with the same normalised
    /// name, each id used at most once; unmatched ones get fresh ids.
    #[must_use]
    pub fn into_replacement_of(self, existing: &Meal) -> Meal {
        let mut unclaimed: Vec<(String, &str)> = existing
            .ingredients
            .iter()
            .map(|i| (i.name.trim().to_lowercase(), i.id.as_str()))
            .collect();
        let mut meal = self.into_meal(existing.id.clone());
        for ingredient in &mut meal.ingredients {
            let name = ingredient.name.trim().to_lowercase();
            if let Some(pos) = unclaimed.iter().position(|(n, _)| *n == name) {
                ingredient.id = unclaimed.remove(pos).1.to_string();
            }
        }
        meal
    }
}

/// A frozen record of eating some servings of a meal.
///
/// Name and macros are copied from the meal at log time and never recomputed,
/// so later edits or deletion of the meal leave the entry untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLogEntry {
    pub id: String,
    pub meal_id: String,
    pub meal_name: String,
    pub servings: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// RFC 3339 with the local offset; the leading `YYYY-MM-DD` is the log day.
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            calories: 2500.0,
            protein: 180.0,
            carbs: 250.0,
            fat: 80.0,
        }
    }
}

/// Planned servings per meal id for the coming week.
///
/// Keys are kept sorted so every walk over the plan visits meals in the same
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyPlan(BTreeMap<String, f64>);

impl WeeklyPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add servings for a meal, accumulating onto any existing count.
    /// Returns the new planned total.
    pub fn add(&mut self, meal_id: &str, servings: f64) -> f64 {
        let total = self.0.entry(meal_id.to_string()).or_insert(0.0);
        *total += servings;
        *total
    }

    pub fn remove(&mut self, meal_id: &str) -> bool {
        self.0.remove(meal_id).is_some()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn get(&self, meal_id: &str) -> Option<f64> {
        self.0.get(meal_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(id, servings)| (id.as_str(), *servings))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for WeeklyPlan {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut plan = Self::new();
        for (meal_id, servings) in iter {
            plan.add(&meal_id, servings);
        }
        plan
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualGroceryItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

/// One merged line of the generated grocery list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroceryList {
    pub generated: Vec<GroceryItem>,
    pub manual: Vec<ManualGroceryItem>,
}

/// A plan entry joined with the meal it points at, if that meal still exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMeal {
    pub meal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_name: Option<String>,
    pub servings: f64,
}

// --- Derived views ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotals {
    pub count: usize,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl DailyTotals {
    pub fn add_entry(&mut self, entry: &DailyLogEntry) {
        self.count += 1;
        self.calories += entry.calories;
        self.protein += entry.protein;
        self.carbs += entry.carbs;
        self.fat += entry.fat;
    }
}

impl std::ops::Add for DailyTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            count: self.count + rhs.count,
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroProgress {
    pub value: f64,
    pub goal: f64,
    /// Share of the goal reached, capped at 100. Zero when the goal is zero.
    pub percent: f64,
    pub remaining: f64,
    pub over: bool,
}

impl MacroProgress {
    #[must_use]
    pub fn new(value: f64, goal: f64) -> Self {
        let percent = if goal > 0.0 {
            (value / goal * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            value,
            goal,
            percent,
            remaining: goal - value,
            over: value > goal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub calories: MacroProgress,
    pub protein: MacroProgress,
    pub carbs: MacroProgress,
    pub fat: MacroProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub entries: Vec<DailyLogEntry>,
    pub totals: DailyTotals,
    pub goals: Goals,
    pub progress: GoalProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotals {
    pub date: String,
    #[serde(flatten)]
    pub totals: DailyTotals,
}

/// References left behind by deleting meals that are still planned or logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Plan keys whose meal no longer exists.
    pub dangling_plan_entries: Vec<String>,
    /// Ids of log entries whose source meal no longer exists.
    pub orphaned_log_entries: Vec<String>,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dangling_plan_entries.is_empty() && self.orphaned_log_entries.is_empty()
    }
}

// --- Validation (applied by callers before invoking the service) ---

pub fn validate_non_negative(label: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{label} must be a non-negative number");
    }
    Ok(())
}

pub fn validate_servings(servings: f64) -> Result<()> {
    if !servings.is_finite() || servings <= 0.0 {
        bail!("Servings must be greater than 0");
    }
    Ok(())
}

pub fn validate_new_meal(meal: &NewMeal) -> Result<()> {
    if meal.name.trim().is_empty() {
        bail!("Meal name must not be empty");
    }
    if meal.servings == 0 {
        bail!("Meal servings must be at least 1");
    }
    validate_non_negative("caloriesPerServing", meal.calories_per_serving)?;
    validate_non_negative("proteinPerServing", meal.protein_per_serving)?;
    validate_non_negative("carbsPerServing", meal.carbs_per_serving)?;
    validate_non_negative("fatPerServing", meal.fat_per_serving)?;
    for ingredient in &meal.ingredients {
        if ingredient.name.trim().is_empty() {
            bail!("Ingredient name must not be empty");
        }
        validate_non_negative(
            &format!("Quantity of '{}'", ingredient.name),
            ingredient.quantity,
        )?;
    }
    Ok(())
}

pub fn validate_goals(goals: &Goals) -> Result<()> {
    validate_non_negative("Calorie goal", goals.calories)?;
    validate_non_negative("Protein goal", goals.protein)?;
    validate_non_negative("Carbs goal", goals.carbs)?;
    validate_non_negative("Fat goal", goals.fat)?;
    Ok(())
}
