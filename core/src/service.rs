use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use tracing::debug;

use crate::ai::GeneratedRecipe;
use crate::db::Database;
use crate::grocery;
use crate::models::{
    DailyLogEntry, DailySummary, DailyTotals, DayTotals, Goals, GroceryItem, GroceryList,
    IntegrityReport, ManualGroceryItem, Meal, NewMeal, PlannedMeal, WeeklyPlan, new_id,
};
use crate::store::{self, DAILY_LOG, GOALS, KeyValueStore, MANUAL_LIST, MEALS, WEEKLY_PLAN};
use crate::totals;

/// Every operation on the tracker's state.
///
/// Each call reads the keys it needs, applies its change and writes back
/// before returning. References to missing meals or entries are silent
/// no-ops reported through the return value, never errors; the only errors
/// come from the backing store.
pub struct NutritionService<S = Database> {
    store: S,
}

impl NutritionService<Database> {
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::with_store(Database::open(db_path)?))
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::with_store(Database::open_in_memory()?))
    }
}

impl<S: KeyValueStore> NutritionService<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Meals ---

    pub fn meals(&self) -> Result<Vec<Meal>> {
        store::load(&self.store, &MEALS)
    }

    pub fn get_meal(&self, id: &str) -> Result<Option<Meal>> {
        Ok(self.meals()?.into_iter().find(|m| m.id == id))
    }

    pub fn add_meal(&mut self, data: NewMeal) -> Result<Meal> {
        let mut meals = self.meals()?;
        let meal = data.into_meal(new_id());
        meals.push(meal.clone());
        store::save(&mut self.store, &MEALS, &meals)?;
        debug!(id = %meal.id, name = %meal.name, "added meal");
        Ok(meal)
    }

    /// Replace the meal with the same id. Returns false if there is none.
    pub fn update_meal(&mut self, meal: Meal) -> Result<bool> {
        let mut meals = self.meals()?;
        let Some(slot) = meals.iter_mut().find(|m| m.id == meal.id) else {
            return Ok(false);
        };
        debug!(id = %meal.id, "updated meal");
        *slot = meal;
        store::save(&mut self.store, &MEALS, &meals)?;
        Ok(true)
    }

    /// Log entries and plan entries that point at the meal are left in place.
    pub fn delete_meal(&mut self, id: &str) -> Result<bool> {
        let mut meals = self.meals()?;
        let before = meals.len();
        meals.retain(|m| m.id != id);
        if meals.len() == before {
            return Ok(false);
        }
        store::save(&mut self.store, &MEALS, &meals)?;
        debug!(id, "deleted meal");
        Ok(true)
    }

    // --- Daily log ---

    pub fn daily_log(&self) -> Result<Vec<DailyLogEntry>> {
        store::load(&self.store, &DAILY_LOG)
    }

    pub fn add_entry_to_log(
        &mut self,
        meal_id: &str,
        servings: f64,
    ) -> Result<Option<DailyLogEntry>> {
        self.add_entry_to_log_at(meal_id, servings, Local::now())
    }

    /// Snapshot the meal's name and macros scaled by `servings` into a new
    /// entry stamped `at`. Returns `None` without touching the log if the
    /// meal does not exist.
    pub fn add_entry_to_log_at(
        &mut self,
        meal_id: &str,
        servings: f64,
        at: DateTime<Local>,
    ) -> Result<Option<DailyLogEntry>> {
        let Some(meal) = self.get_meal(meal_id)? else {
            debug!(meal_id, "log target meal not found");
            return Ok(None);
        };
        let entry = DailyLogEntry {
            id: new_id(),
            meal_id: meal.id,
            meal_name: meal.name,
            servings,
            calories: meal.calories_per_serving * servings,
            protein: meal.protein_per_serving * servings,
            carbs: meal.carbs_per_serving * servings,
            fat: meal.fat_per_serving * servings,
            timestamp: at.to_rfc3339(),
        };
        let mut log = self.daily_log()?;
        log.push(entry.clone());
        store::save(&mut self.store, &DAILY_LOG, &log)?;
        debug!(id = %entry.id, meal_id, servings, "logged meal");
        Ok(Some(entry))
    }

    pub fn remove_entry_from_log(&mut self, entry_id: &str) -> Result<bool> {
        let mut log = self.daily_log()?;
        let before = log.len();
        log.retain(|e| e.id != entry_id);
        if log.len() == before {
            return Ok(false);
        }
        store::save(&mut self.store, &DAILY_LOG, &log)?;
        debug!(entry_id, "removed log entry");
        Ok(true)
    }

    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<DailyLogEntry>> {
        let log = self.daily_log()?;
        Ok(totals::entries_for_date(&log, date)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn daily_totals(&self, date: NaiveDate) -> Result<DailyTotals> {
        Ok(totals::daily_totals(&self.daily_log()?, date))
    }

    pub fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary> {
        let entries = self.entries_for_date(date)?;
        let mut day_totals = DailyTotals::default();
        for entry in &entries {
            day_totals.add_entry(entry);
        }
        let goals = self.goals()?;
        Ok(DailySummary {
            date: totals::date_key(date),
            entries,
            totals: day_totals,
            goals,
            progress: totals::progress(&day_totals, &goals),
        })
    }

    pub fn history(&self, today: NaiveDate, days: u32) -> Result<Vec<DayTotals>> {
        Ok(totals::history(&self.daily_log()?, today, days))
    }

    // --- Goals ---

    pub fn goals(&self) -> Result<Goals> {
        store::load(&self.store, &GOALS)
    }

    pub fn set_goals(&mut self, goals: Goals) -> Result<Goals> {
        store::save(&mut self.store, &GOALS, &goals)?;
        debug!(?goals, "updated goals");
        Ok(goals)
    }

    // --- Weekly plan ---

    pub fn weekly_plan(&self) -> Result<WeeklyPlan> {
        store::load(&self.store, &WEEKLY_PLAN)
    }

    /// Plan entries joined with meal names, in plan order.
    pub fn planned_meals(&self) -> Result<Vec<PlannedMeal>> {
        let plan = self.weekly_plan()?;
        let meals = self.meals()?;
        Ok(plan
            .iter()
            .map(|(meal_id, servings)| PlannedMeal {
                meal_id: meal_id.to_string(),
                meal_name: meals
                    .iter()
                    .find(|m| m.id == meal_id)
                    .map(|m| m.name.clone()),
                servings,
            })
            .collect())
    }

    /// Accumulates onto any servings already planned. The meal id is not
    /// checked; unknown meals are skipped when the list is built.
    /// Returns the new planned total.
    pub fn add_meal_to_plan(&mut self, meal_id: &str, servings: f64) -> Result<f64> {
        let mut plan = self.weekly_plan()?;
        let total = plan.add(meal_id, servings);
        store::save(&mut self.store, &WEEKLY_PLAN, &plan)?;
        debug!(meal_id, servings, total, "planned meal");
        Ok(total)
    }

    pub fn remove_meal_from_plan(&mut self, meal_id: &str) -> Result<bool> {
        let mut plan = self.weekly_plan()?;
        if !plan.remove(meal_id) {
            return Ok(false);
        }
        store::save(&mut self.store, &WEEKLY_PLAN, &plan)?;
        debug!(meal_id, "unplanned meal");
        Ok(true)
    }

    pub fn clear_plan(&mut self) -> Result<bool> {
        let mut plan = self.weekly_plan()?;
        if plan.is_empty() {
            return Ok(false);
        }
        plan.clear();
        store::save(&mut self.store, &WEEKLY_PLAN, &plan)?;
        debug!("cleared plan");
        Ok(true)
    }

    // --- Grocery list ---

    pub fn generated_grocery_items(&self) -> Result<Vec<GroceryItem>> {
        Ok(grocery::aggregate(&self.weekly_plan()?, &self.meals()?))
    }

    pub fn grocery_list(&self) -> Result<GroceryList> {
        Ok(GroceryList {
            generated: self.generated_grocery_items()?,
            manual: self.manual_items()?,
        })
    }

    pub fn manual_items(&self) -> Result<Vec<ManualGroceryItem>> {
        store::load(&self.store, &MANUAL_LIST)
    }

    /// Blank text is ignored and yields `None`.
    pub fn add_manual_item(&mut self, text: &str) -> Result<Option<ManualGroceryItem>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let item = ManualGroceryItem {
            id: new_id(),
            text: text.to_string(),
            completed: false,
        };
        let mut items = self.manual_items()?;
        items.push(item.clone());
        store::save(&mut self.store, &MANUAL_LIST, &items)?;
        debug!(id = %item.id, "added manual grocery item");
        Ok(Some(item))
    }

    /// Flip `completed`, returning the updated item.
    pub fn toggle_manual_item(&mut self, id: &str) -> Result<Option<ManualGroceryItem>> {
        let mut items = self.manual_items()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        item.completed = !item.completed;
        let updated = item.clone();
        store::save(&mut self.store, &MANUAL_LIST, &items)?;
        debug!(id, completed = updated.completed, "toggled manual grocery item");
        Ok(Some(updated))
    }

    pub fn delete_manual_item(&mut self, id: &str) -> Result<bool> {
        let mut items = self.manual_items()?;
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            return Ok(false);
        }
        store::save(&mut self.store, &MANUAL_LIST, &items)?;
        debug!(id, "deleted manual grocery item");
        Ok(true)
    }

    // --- Generated recipes ---

    pub fn save_generated_recipe(&mut self, recipe: &GeneratedRecipe) -> Result<Meal> {
        self.add_meal(recipe.to_new_meal())
    }

    // --- Integrity ---

    /// Report plan and log references to meals that no longer exist.
    /// Nothing is repaired.
    pub fn integrity_report(&self) -> Result<IntegrityReport> {
        let meals = self.meals()?;
        let known: HashSet<&str> = meals.iter().map(|m| m.id.as_str()).collect();
        let plan = self.weekly_plan()?;
        let log = self.daily_log()?;
        Ok(IntegrityReport {
            dangling_plan_entries: plan
                .iter()
                .filter(|(meal_id, _)| !known.contains(meal_id))
                .map(|(meal_id, _)| meal_id.to_string())
                .collect(),
            orphaned_log_entries: log
                .iter()
                .filter(|e| !known.contains(e.meal_id.as_str()))
                .map(|e| e.id.clone())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewIngredient;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn sample_meal() -> NewMeal {
        NewMeal {
            name: "Chicken Bowl".to_string(),
            servings: 2,
            ingredients: vec![
                NewIngredient {
                    name: "Rice".to_string(),
                    quantity: 1.0,
                    unit: "cup".to_string(),
                },
                NewIngredient {
                    name: "Chicken".to_string(),
                    quantity: 200.0,
                    unit: "g".to_string(),
                },
            ],
            calories_per_serving: 400.0,
            protein_per_serving: 40.0,
            carbs_per_serving: 45.0,
            fat_per_serving: 8.0,
        }
    }

    fn memory_service() -> NutritionService<MemoryStore> {
        NutritionService::with_store(MemoryStore::new())
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_and_get_meal() {
        let mut svc = NutritionService::new_in_memory().unwrap();
        let meal = svc.add_meal(sample_meal()).unwrap();
        assert_eq!(meal.name, "Chicken Bowl");
        assert_eq!(meal.ingredients.len(), 2);
        assert_eq!(svc.get_meal(&meal.id).unwrap(), Some(meal.clone()));
        assert_eq!(svc.meals().unwrap().len(), 1);
    }

    #[test]
    fn test_add_meal_assigns_unique_ids() {
        let mut svc = memory_service();
        let a = svc.add_meal(sample_meal()).unwrap();
        let b = svc.add_meal(sample_meal()).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_update_meal_replaces() {
        let mut svc = memory_service();
        let mut meal = svc.add_meal(sample_meal()).unwrap();
        meal.name = "Beef Bowl".to_string();
        meal.ingredients.clear();
        assert!(svc.update_meal(meal.clone()).unwrap());
        assert_eq!(svc.get_meal(&meal.id).unwrap(), Some(meal));
    }

    #[test]
    fn test_update_missing_meal_is_noop() {
        let mut svc = memory_service();
        svc.add_meal(sample_meal()).unwrap();
        let before = svc.meals().unwrap();
        let ghost = sample_meal().into_meal("ghost".to_string());
        assert!(!svc.update_meal(ghost).unwrap());
        assert_eq!(svc.meals().unwrap(), before);
    }

    #[test]
    fn test_log_snapshots_macros() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        let entry = svc
            .add_entry_to_log_at(&meal.id, 1.5, noon(2024, 6, 15))
            .unwrap()
            .unwrap();
        assert!((entry.calories - 600.0).abs() < 0.01);
        assert!((entry.protein - 60.0).abs() < 0.01);
        assert_eq!(entry.meal_name, "Chicken Bowl");
        assert!(entry.timestamp.starts_with("2024-06-15T12:00:00"));

        // Editing the meal afterwards leaves the entry frozen
        let mut edited = meal.clone();
        edited.calories_per_serving = 500.0;
        edited.name = "Renamed".to_string();
        svc.update_meal(edited).unwrap();
        let log = svc.daily_log().unwrap();
        assert!((log[0].calories - 600.0).abs() < 0.01);
        assert_eq!(log[0].meal_name, "Chicken Bowl");
    }

    #[test]
    fn test_log_unknown_meal_is_noop() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        svc.add_entry_to_log(&meal.id, 1.0).unwrap();
        let before = svc.daily_log().unwrap();
        assert!(svc.add_entry_to_log("unknown", 2.0).unwrap().is_none());
        assert_eq!(svc.daily_log().unwrap(), before);
    }

    #[test]
    fn test_remove_log_entry() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        let entry = svc.add_entry_to_log(&meal.id, 1.0).unwrap().unwrap();
        assert!(svc.remove_entry_from_log(&entry.id).unwrap());
        assert!(svc.daily_log().unwrap().is_empty());
        assert!(!svc.remove_entry_from_log(&entry.id).unwrap());
    }

    #[test]
    fn test_daily_summary_buckets_by_day() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        svc.add_entry_to_log_at(&meal.id, 1.0, noon(2024, 6, 14)).unwrap();
        svc.add_entry_to_log_at(&meal.id, 2.0, noon(2024, 6, 15)).unwrap();
        svc.add_entry_to_log_at(&meal.id, 0.5, noon(2024, 6, 15)).unwrap();

        let summary = svc.daily_summary(day(2024, 6, 15)).unwrap();
        assert_eq!(summary.date, "2024-06-15");
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.totals.count, 2);
        assert!((summary.totals.calories - 1000.0).abs() < 0.01);
        assert!((summary.progress.calories.percent - 40.0).abs() < 0.01);
        assert_eq!(summary.totals, svc.daily_totals(day(2024, 6, 15)).unwrap());

        let history = svc.history(day(2024, 6, 15), 2).unwrap();
        assert_eq!(history[1].date, "2024-06-14");
        assert!((history[1].totals.calories - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_goals_default_and_update() {
        let mut svc = memory_service();
        assert_eq!(svc.goals().unwrap(), Goals::default());
        let goals = Goals {
            calories: 2000.0,
            protein: 150.0,
            carbs: 180.0,
            fat: 60.0,
        };
        svc.set_goals(goals).unwrap();
        assert_eq!(svc.goals().unwrap(), goals);
    }

    #[test]
    fn test_plan_accumulates() {
        let mut svc = memory_service();
        assert!((svc.add_meal_to_plan("M1", 2.0).unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((svc.add_meal_to_plan("M1", 3.0).unwrap() - 5.0).abs() < f64::EPSILON);
        assert_eq!(svc.weekly_plan().unwrap().get("M1"), Some(5.0));
    }

    #[test]
    fn test_remove_and_clear_plan() {
        let mut svc = memory_service();
        svc.add_meal_to_plan("M1", 2.0).unwrap();
        svc.add_meal_to_plan("M2", 1.0).unwrap();
        assert!(svc.remove_meal_from_plan("M1").unwrap());
        assert!(!svc.remove_meal_from_plan("M1").unwrap());
        assert!(svc.clear_plan().unwrap());
        assert!(svc.weekly_plan().unwrap().is_empty());
        assert!(!svc.clear_plan().unwrap());
    }

    #[test]
    fn test_grocery_list_from_plan() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        svc.add_meal_to_plan(&meal.id, 2.0).unwrap();
        let list = svc.grocery_list().unwrap();
        assert_eq!(list.generated.len(), 2);
        assert_eq!(list.generated[0].name, "Chicken");
        assert!((list.generated[0].quantity - 400.0).abs() < 0.01);
        assert_eq!(list.generated[1].name, "Rice");
        assert!((list.generated[1].quantity - 2.0).abs() < 0.01);
        assert!(list.manual.is_empty());

        let planned = svc.planned_meals().unwrap();
        assert_eq!(planned[0].meal_name.as_deref(), Some("Chicken Bowl"));
    }

    #[test]
    fn test_delete_meal_leaves_references() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        let entry = svc.add_entry_to_log(&meal.id, 1.0).unwrap().unwrap();
        svc.add_meal_to_plan(&meal.id, 2.0).unwrap();

        assert!(svc.delete_meal(&meal.id).unwrap());
        assert!(!svc.delete_meal(&meal.id).unwrap());

        assert_eq!(svc.daily_log().unwrap(), vec![entry.clone()]);
        assert_eq!(svc.weekly_plan().unwrap().get(&meal.id), Some(2.0));
        assert!(svc.generated_grocery_items().unwrap().is_empty());

        let planned = svc.planned_meals().unwrap();
        assert!(planned[0].meal_name.is_none());

        let report = svc.integrity_report().unwrap();
        assert_eq!(report.dangling_plan_entries, vec![meal.id.clone()]);
        assert_eq!(report.orphaned_log_entries, vec![entry.id]);
        // Reporting repairs nothing
        assert_eq!(svc.weekly_plan().unwrap().len(), 1);
    }

    #[test]
    fn test_integrity_report_clean() {
        let mut svc = memory_service();
        let meal = svc.add_meal(sample_meal()).unwrap();
        svc.add_meal_to_plan(&meal.id, 1.0).unwrap();
        svc.add_entry_to_log(&meal.id, 1.0).unwrap();
        assert!(svc.integrity_report().unwrap().is_clean());
    }

    #[test]
    fn test_manual_items() {
        let mut svc = memory_service();
        assert!(svc.add_manual_item("   ").unwrap().is_none());
        let item = svc.add_manual_item("  paper towels ").unwrap().unwrap();
        assert_eq!(item.text, "paper towels");
        assert!(!item.completed);

        let toggled = svc.toggle_manual_item(&item.id).unwrap().unwrap();
        assert!(toggled.completed);
        let toggled = svc.toggle_manual_item(&item.id).unwrap().unwrap();
        assert!(!toggled.completed);
        assert!(svc.toggle_manual_item("missing").unwrap().is_none());

        assert!(svc.delete_manual_item(&item.id).unwrap());
        assert!(!svc.delete_manual_item(&item.id).unwrap());
        assert!(svc.manual_items().unwrap().is_empty());
    }

    #[test]
    fn test_save_generated_recipe() {
        let mut svc = memory_service();
        let recipe = GeneratedRecipe {
            meal_name: "Egg Fried Rice".to_string(),
            description: "Quick.".to_string(),
            ingredients: vec!["2 cups cooked rice".to_string(), "3 eggs".to_string()],
            instructions: vec!["Fry.".to_string()],
        };
        let meal = svc.save_generated_recipe(&recipe).unwrap();
        assert_eq!(meal.servings, 1);
        assert_eq!(meal.ingredients[0].unit, "cups");
        assert_eq!(meal.ingredients[0].name, "cooked rice");
        assert_eq!(meal.ingredients[1].name, "eggs");
        assert_eq!(svc.meals().unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nutritrack.db");
        let meal_id = {
            let mut svc = NutritionService::open(&path).unwrap();
            let meal = svc.add_meal(sample_meal()).unwrap();
            svc.add_meal_to_plan(&meal.id, 1.0).unwrap();
            meal.id
        };
        let svc = NutritionService::open(&path).unwrap();
        assert!(svc.get_meal(&meal_id).unwrap().is_some());
        assert_eq!(svc.weekly_plan().unwrap().get(&meal_id), Some(1.0));
    }
}
